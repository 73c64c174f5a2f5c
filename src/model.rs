//! Three-marker cap model.

use crate::{
    config::ModelConfig,
    constants::{MARKER_COUNT, MILLIMETRES_PER_MODEL_UNIT},
};
use nalgebra::Point3;

/// Role of a marker on the cap, in model order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRole {
    /// Right side marker
    Right = 0,
    /// Left side marker
    Left = 1,
    /// Top marker, the model origin
    Top = 2,
}

/// Model points in the order `[right, left, top]`, in centimetres
///
/// The top marker sits at the origin. Model Y grows downwards like image Y,
/// and the side markers sit behind the top marker along -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerModel {
    points: [Point3<f64>; MARKER_COUNT],
}

impl MarkerModel {
    /// Build the model from millimetre offsets
    #[must_use]
    pub fn from_offsets(offsets: &ModelConfig) -> Self {
        let x = offsets.cap_x / MILLIMETRES_PER_MODEL_UNIT;
        let y = offsets.cap_y / MILLIMETRES_PER_MODEL_UNIT;
        let z = offsets.cap_z / MILLIMETRES_PER_MODEL_UNIT;

        Self {
            points: [
                Point3::new(x, z, -y),
                Point3::new(-x, z, -y),
                Point3::new(0.0, 0.0, 0.0),
            ],
        }
    }

    /// All model points
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>; MARKER_COUNT] {
        &self.points
    }

    /// The point for one marker role
    #[must_use]
    pub fn point(&self, role: MarkerRole) -> Point3<f64> {
        self.points[role as usize]
    }
}

impl Default for MarkerModel {
    fn default() -> Self {
        Self::from_offsets(&ModelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_from_default_offsets() {
        let model = MarkerModel::default();
        assert_eq!(model.point(MarkerRole::Right), Point3::new(4.0, 10.0, -6.0));
        assert_eq!(model.point(MarkerRole::Left), Point3::new(-4.0, 10.0, -6.0));
        assert_eq!(model.point(MarkerRole::Top), Point3::origin());
    }

    #[test]
    fn test_model_is_symmetric() {
        let model = MarkerModel::from_offsets(&ModelConfig {
            cap_x: 35.0,
            cap_y: 25.0,
            cap_z: 80.0,
        });
        let right = model.point(MarkerRole::Right);
        let left = model.point(MarkerRole::Left);
        assert_eq!(right.x, -left.x);
        assert_eq!(right.y, left.y);
        assert_eq!(right.z, left.z);
        assert_eq!(right.x, 3.5);
    }
}
