//! Assignment of detected points to marker roles.
//!
//! Assumes a roughly upright subject: the top marker is the one highest in
//! the image (smallest Y), and of the remaining two the one further right
//! (larger X) is the right marker.

use crate::{
    constants::MARKER_COUNT,
    model::MarkerRole,
    Error, Result,
};
use nalgebra::Point2;

/// Detected image points aligned with the model order `[right, left, top]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    points: [Point2<f64>; MARKER_COUNT],
}

impl Correspondence {
    /// Wrap points that are already in model order
    #[must_use]
    pub fn new(points: [Point2<f64>; MARKER_COUNT]) -> Self {
        Self { points }
    }

    /// Wrap an ordered slice of exactly three points
    ///
    /// # Errors
    ///
    /// Returns an error if the slice does not hold exactly three points.
    pub fn from_slice(points: &[Point2<f64>]) -> Result<Self> {
        let points: [Point2<f64>; MARKER_COUNT] = points.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Expected {MARKER_COUNT} correspondences, got {}",
                points.len()
            ))
        })?;
        Ok(Self { points })
    }

    /// Points in model order
    #[must_use]
    pub fn points(&self) -> &[Point2<f64>; MARKER_COUNT] {
        &self.points
    }

    /// The image point assigned to one marker role
    #[must_use]
    pub fn point(&self, role: MarkerRole) -> Point2<f64> {
        self.points[role as usize]
    }
}

/// Indices into the detected points for each role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleIndices {
    /// Index of the right marker
    pub right: usize,
    /// Index of the left marker
    pub left: usize,
    /// Index of the top marker
    pub top: usize,
}

/// Decide which detected point plays which role
///
/// Ties keep the first point encountered.
#[must_use]
pub fn assign_roles(points: &[Point2<f64>; MARKER_COUNT]) -> RoleIndices {
    let mut top = 0;
    for (i, point) in points.iter().enumerate().skip(1) {
        if point.y < points[top].y {
            top = i;
        }
    }

    let mut remaining = (0..MARKER_COUNT).filter(|&i| i != top);
    // Two indices always remain after removing the top one
    let first = remaining.next().unwrap_or(0);
    let second = remaining.next().unwrap_or(0);

    let (right, left) = if points[second].x > points[first].x {
        (second, first)
    } else {
        (first, second)
    };

    RoleIndices { right, left, top }
}

/// Order three detected points as `[right, left, top]`
#[must_use]
pub fn resolve(points: &[Point2<f64>; MARKER_COUNT]) -> (Correspondence, RoleIndices) {
    let roles = assign_roles(points);
    let correspondence = Correspondence::new([points[roles.right], points[roles.left], points[roles.top]]);
    (correspondence, roles)
}
