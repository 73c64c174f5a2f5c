//! Detected points to selected pose, without any I/O.

use crate::{
    correspondence::{resolve, Correspondence, RoleIndices},
    extraction::first_markers,
    pose_estimation::{PoseCandidate, PoseEstimator},
    pose_store::Pose,
    selection::select_best,
};
use nalgebra::Point2;

/// Everything one cycle worked out from its detections
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// Detections ordered `[right, left, top]`
    pub correspondence: Correspondence,
    /// Which detection became which marker
    pub roles: RoleIndices,
    /// Every pose consistent with the detections
    pub candidates: Vec<PoseCandidate>,
    /// Index of the selected candidate
    pub best: Option<usize>,
}

impl Estimate {
    /// The selected candidate
    #[must_use]
    pub fn best_candidate(&self) -> Option<&PoseCandidate> {
        self.best.and_then(|index| self.candidates.get(index))
    }

    /// The selected pose, ready to publish
    #[must_use]
    pub fn pose(&self) -> Option<Pose> {
        self.best_candidate().map(Pose::from)
    }

    /// Detection assigned to the top marker
    #[must_use]
    pub fn top_point(&self) -> Point2<f64> {
        self.correspondence.point(crate::model::MarkerRole::Top)
    }
}

/// Resolve, solve and select
///
/// Returns `None` when fewer than three points were detected. Extra points
/// beyond the first three are ignored.
#[must_use]
pub fn estimate(points: &[Point2<f64>], estimator: &PoseEstimator) -> Option<Estimate> {
    let markers = first_markers(points)?;
    let (correspondence, roles) = resolve(&markers);
    let candidates = estimator.estimate(&correspondence);
    let best = select_best(&candidates);

    if let Some(index) = best {
        let angles = candidates[index].angles;
        log::debug!(
            "Selected candidate {index}/{}: pitch {:.2} yaw {:.2} roll {:.2}",
            candidates.len(),
            angles.pitch,
            angles.yaw,
            angles.roll
        );
    }

    Some(Estimate {
        correspondence,
        roles,
        candidates,
        best,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        camera::{CameraInfo, CameraIntrinsics},
        model::MarkerModel,
        pose_estimation::EulerAngles,
    };
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn estimator() -> PoseEstimator {
        PoseEstimator::new(
            MarkerModel::default(),
            CameraIntrinsics::from_info(&CameraInfo::from_fov(640, 480, 60, 56.0)),
        )
    }

    #[test]
    fn test_too_few_points() {
        let estimator = estimator();
        let points = [Point2::new(10.0, 10.0), Point2::new(20.0, 20.0)];
        assert!(estimate(&points, &estimator).is_none());
        assert!(estimate(&[], &estimator).is_none());
    }

    #[test]
    fn test_shuffled_detections_recover_level_pose() {
        let estimator = estimator();
        let truth = EulerAngles {
            pitch: 0.0,
            yaw: 15.0,
            roll: -5.0,
        };
        let translation = Vector3::new(2.0, 1.0, 55.0);
        let [right, left, top] = estimator.project(&truth.to_rotation(), &translation);

        // Extractors report points in arbitrary order, possibly with extras
        let detections = [left, top, right, Point2::new(1.0, 1.0)];
        let estimate = estimate(&detections, &estimator).unwrap();
        assert_eq!(estimate.roles, RoleIndices { right: 2, left: 0, top: 1 });
        assert_eq!(estimate.top_point(), top);

        let pose = estimate.pose().unwrap();
        assert_relative_eq!(pose.pitch, 0.0, epsilon = 1e-3);
        assert_relative_eq!(pose.yaw, 15.0, epsilon = 1e-3);
        assert_relative_eq!(pose.roll, -5.0, epsilon = 1e-3);
        assert_relative_eq!(pose.x, 2.0, epsilon = 1e-4);
        assert_relative_eq!(pose.y, 1.0, epsilon = 1e-4);
        assert_relative_eq!(pose.z, 55.0, epsilon = 1e-3);
    }

    #[test]
    fn test_degenerate_detections_have_no_pose() {
        let estimator = estimator();
        let points = [Point2::new(100.0, 100.0); 3];
        let estimate = estimate(&points, &estimator).unwrap();
        assert!(estimate.candidates.is_empty());
        assert_eq!(estimate.best, None);
        assert_eq!(estimate.pose(), None);
    }
}
