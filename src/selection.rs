//! Choice among ambiguous P3P solutions.
//!
//! P3P is inherently ambiguous with three markers. The tracker assumes the
//! head stays close to level and keeps the candidate with the smallest
//! absolute pitch. This is a heuristic: a strongly pitched head can lose to
//! a flatter mirror solution.

use crate::pose_estimation::PoseCandidate;

/// Index of the candidate with the smallest `|pitch|`
///
/// Ties keep the lowest index. Candidates with a non-finite pitch are
/// skipped. Returns `None` when nothing qualifies.
#[must_use]
pub fn select_best(candidates: &[PoseCandidate]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let pitch = candidate.angles.pitch.abs();
        if !pitch.is_finite() {
            continue;
        }
        match best {
            Some((_, best_pitch)) if pitch >= best_pitch => {}
            _ => best = Some((index, pitch)),
        }
    }
    best.map(|(index, _)| index)
}
