//! Pose estimation from three marker correspondences.
//!
//! A P3P solve yields up to four candidate poses. Each candidate carries the
//! rotation and translation that map model coordinates into the camera
//! frame, plus Euler angles decomposed the way OpenCV's `RQDecomp3x3` does.

use crate::{
    camera::CameraIntrinsics,
    constants::{
        GEOMETRY_EPSILON, MARKER_COUNT, P3P_DENOMINATOR_EPSILON, P3P_DUPLICATE_TOLERANCE, P3P_IMAGINARY_TOLERANCE,
        P3P_MIRROR_TOLERANCE, P3P_SIDE_TOLERANCE,
    },
    correspondence::Correspondence,
    model::MarkerModel,
    utils::polynomial::near_real_roots,
};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};

/// Euler angles in degrees
///
/// Composed as `R = Rz(roll) * Ry(yaw) * Rx(pitch)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    /// Rotation about the camera X axis
    pub pitch: f64,
    /// Rotation about the camera Y axis
    pub yaw: f64,
    /// Rotation about the camera Z axis
    pub roll: f64,
}

impl EulerAngles {
    /// Decompose a rotation with a sequence of Givens rotations
    ///
    /// Zeroes `R[2][1]`, then `R[2][0]`, then `R[1][0]`, reading each angle
    /// off its Givens factor. For a proper rotation the remaining upper
    /// triangular factor is the identity, so no sign fix-up is needed.
    #[must_use]
    pub fn from_rotation(rotation: &Rotation3<f64>) -> Self {
        let r = rotation.matrix();

        let (c, s) = givens(r[(2, 2)], r[(2, 1)]);
        let qx = Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c);
        let m = r * qx;

        let (c, s) = givens(m[(2, 2)], -m[(2, 0)]);
        let qy = Matrix3::new(c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c);
        let m = m * qy;

        let (c, s) = givens(m[(1, 1)], m[(1, 0)]);
        let qz = Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0);

        Self {
            pitch: signed_angle(qx[(1, 1)], qx[(1, 2)]),
            yaw: signed_angle(qy[(0, 0)], qy[(2, 0)]),
            roll: signed_angle(qz[(0, 0)], qz[(0, 1)]),
        }
    }

    /// Rebuild the rotation these angles describe
    #[must_use]
    pub fn to_rotation(&self) -> Rotation3<f64> {
        Rotation3::from_euler_angles(self.pitch.to_radians(), self.yaw.to_radians(), self.roll.to_radians())
    }
}

/// Normalised cosine and sine of a Givens rotation
fn givens(c: f64, s: f64) -> (f64, f64) {
    let z = 1.0 / (c * c + s * s + f64::EPSILON).sqrt();
    (c * z, s * z)
}

/// Angle in degrees from its cosine, signed by `sign_source`
fn signed_angle(cosine: f64, sign_source: f64) -> f64 {
    let angle = cosine.clamp(-1.0, 1.0).acos().to_degrees();
    if sign_source >= 0.0 {
        angle
    } else {
        -angle
    }
}

/// One pose consistent with the observed markers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseCandidate {
    /// Model-to-camera rotation
    pub rotation: Rotation3<f64>,
    /// Model origin in the camera frame, centimetres
    pub translation: Vector3<f64>,
    /// Euler decomposition of `rotation`
    pub angles: EulerAngles,
}

impl PoseCandidate {
    /// Build a candidate, decomposing the rotation
    #[must_use]
    pub fn new(rotation: Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
            angles: EulerAngles::from_rotation(&rotation),
        }
    }

    /// Map a model point into the camera frame
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.rotation * point + self.translation
    }
}

/// P3P estimator bound to a cap model and camera intrinsics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimator {
    model: MarkerModel,
    intrinsics: CameraIntrinsics,
}

impl PoseEstimator {
    /// Create an estimator for one model and camera
    #[must_use]
    pub fn new(model: MarkerModel, intrinsics: CameraIntrinsics) -> Self {
        Self { model, intrinsics }
    }

    /// The cap model
    #[must_use]
    pub fn model(&self) -> &MarkerModel {
        &self.model
    }

    /// The camera intrinsics
    #[must_use]
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// All poses consistent with the correspondence
    ///
    /// Pixels are undistorted before solving. Returns an empty list when the
    /// geometry admits no solution.
    #[must_use]
    pub fn estimate(&self, correspondence: &Correspondence) -> Vec<PoseCandidate> {
        let pixels = *correspondence.points();
        let bearings = pixels.map(|pixel| {
            let normalized = self.intrinsics.normalize(&pixel);
            Vector3::new(normalized.x, normalized.y, 1.0).normalize()
        });

        let candidates: Vec<PoseCandidate> = solve_p3p(self.model.points(), &bearings)
            .into_iter()
            .map(|(rotation, translation)| PoseCandidate::new(rotation, translation))
            .collect();

        log::trace!("P3P produced {} candidate(s)", candidates.len());
        candidates
    }

    /// Project the model into pixels under a pose, in model order
    #[must_use]
    pub fn project(&self, rotation: &Rotation3<f64>, translation: &Vector3<f64>) -> [Point2<f64>; MARKER_COUNT] {
        let points = *self.model.points();
        points.map(|point| {
            let camera = rotation * point + translation;
            self.intrinsics
                .denormalize(&Point2::new(camera.x / camera.z, camera.y / camera.z))
        })
    }
}

/// Solve the perspective-three-point problem
///
/// `bearings` are unit rays towards each model point, in the same order.
/// Returns every solution that places all points in front of the camera
/// and reproduces the model's side lengths.
#[must_use]
pub fn solve_p3p(
    model: &[Point3<f64>; MARKER_COUNT],
    bearings: &[Vector3<f64>; MARKER_COUNT],
) -> Vec<(Rotation3<f64>, Vector3<f64>)> {
    let a = (model[1] - model[2]).norm();
    let b = (model[0] - model[2]).norm();
    let c = (model[0] - model[1]).norm();
    if !(a > GEOMETRY_EPSILON && b > GEOMETRY_EPSILON && c > GEOMETRY_EPSILON) {
        return Vec::new();
    }
    if bearings.iter().any(|f| !f.iter().all(|v| v.is_finite())) {
        return Vec::new();
    }

    let cos_alpha = bearings[1].dot(&bearings[2]);
    let cos_beta = bearings[0].dot(&bearings[2]);
    let cos_gamma = bearings[0].dot(&bearings[1]);

    let (a2, b2, c2) = (a * a, b * b, c * c);
    let d = (b2 - a2) / c2;
    let e = b2 / c2;

    // Distances along the rays are x, u*x and v*x with v = n(u) / den(u)
    let n = [1.0 - d, 2.0 * d * cos_gamma, -(1.0 + d)];
    let den = [2.0 * cos_beta, -2.0 * cos_alpha];
    let e_poly = [1.0 - e, 2.0 * e * cos_gamma, -e];

    let n_sq = poly_mul(&n, &n);
    let n_den = poly_mul(&n, &den);
    let den_sq = poly_mul(&den, &den);
    let e_den_sq = poly_mul(&e_poly, &den_sq);

    let mut quartic = [0.0; 5];
    for (i, coefficient) in quartic.iter_mut().enumerate() {
        *coefficient = n_sq[i] - 2.0 * cos_beta * n_den[i] + e_den_sq[i];
    }

    let mut solutions: Vec<(Rotation3<f64>, Vector3<f64>)> = Vec::new();
    for u in near_real_roots(&quartic, P3P_IMAGINARY_TOLERANCE) {
        let k = 1.0 + u * u - 2.0 * u * cos_gamma;
        if k <= GEOMETRY_EPSILON {
            continue;
        }

        // A mirror-symmetric view zeroes both n(u) and den(u); v then
        // follows from the b side alone and both of its roots may hold
        let den_u = den[0] + den[1] * u;
        let ratios = if den_u.abs() >= P3P_DENOMINATOR_EPSILON {
            vec![(n[0] + n[1] * u + n[2] * u * u) / den_u]
        } else {
            near_real_roots(&[1.0 - e * k, -2.0 * cos_beta, 1.0], P3P_IMAGINARY_TOLERANCE)
        };

        let x = (c2 / k).sqrt();
        let fits: Vec<(f64, [Vector3<f64>; MARKER_COUNT])> = ratios
            .into_iter()
            .filter_map(|v| {
                let camera = [bearings[0] * x, bearings[1] * (u * x), bearings[2] * (v * x)];
                side_error(model, &camera)
                    .filter(|error| *error <= P3P_SIDE_TOLERANCE)
                    .map(|error| (error, camera))
            })
            .collect();

        // Away from exact symmetry only one root of the b side fits the a side
        let best_error = fits.iter().map(|(error, _)| *error).fold(f64::INFINITY, f64::min);
        for (error, camera) in fits {
            if error > (2.0 * best_error).max(P3P_MIRROR_TOLERANCE) {
                continue;
            }
            if let Some(pose) = pose_from_points(model, &camera) {
                if !solutions.iter().any(|known| is_same_pose(known, &pose)) {
                    solutions.push(pose);
                }
            }
        }
    }

    solutions
}

/// Two solutions from neighbouring roots of a split double root
fn is_same_pose(a: &(Rotation3<f64>, Vector3<f64>), b: &(Rotation3<f64>, Vector3<f64>)) -> bool {
    let scale = a.1.norm().max(1.0);
    (a.1 - b.1).norm() <= P3P_DUPLICATE_TOLERANCE * scale && a.0.angle_to(&b.0) <= P3P_DUPLICATE_TOLERANCE
}

/// Product of two polynomials in ascending order, truncated to degree 4
fn poly_mul(a: &[f64], b: &[f64]) -> [f64; 5] {
    let mut out = [0.0; 5];
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            if i + j < out.len() {
                out[i + j] += ai * bj;
            }
        }
    }
    out
}

/// Largest relative side length error, or `None` if a point is not in front of the camera
fn side_error(model: &[Point3<f64>; MARKER_COUNT], camera: &[Vector3<f64>; MARKER_COUNT]) -> Option<f64> {
    if camera.iter().any(|p| !p.iter().all(|v| v.is_finite()) || p.z <= 0.0) {
        return None;
    }

    let error = [(0, 1), (0, 2), (1, 2)]
        .iter()
        .map(|&(i, j)| {
            let expected = (model[i] - model[j]).norm();
            let actual = (camera[i] - camera[j]).norm();
            (actual - expected).abs() / expected
        })
        .fold(0.0, f64::max);
    Some(error)
}

/// Rigid transform taking the model points onto camera-frame points (Kabsch)
fn pose_from_points(
    model: &[Point3<f64>; MARKER_COUNT],
    camera: &[Vector3<f64>; MARKER_COUNT],
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    let count = MARKER_COUNT as f64;
    let model_centroid = model.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / count;
    let camera_centroid = camera.iter().fold(Vector3::zeros(), |acc, p| acc + p) / count;

    let mut h = Matrix3::zeros();
    for (m, c) in model.iter().zip(camera) {
        h += (c - camera_centroid) * (m.coords - model_centroid).transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.column_mut(2).neg_mut();
        r = u_fixed * v_t;
    }

    let translation = camera_centroid - r * model_centroid;
    Some((Rotation3::from_matrix_unchecked(r), translation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraInfo;
    use approx::assert_relative_eq;

    fn estimator() -> PoseEstimator {
        PoseEstimator::new(
            MarkerModel::default(),
            CameraIntrinsics::from_info(&CameraInfo::from_fov(640, 480, 60, 60.0)),
        )
    }

    #[test]
    fn test_euler_angle_conversion() {
        let identity = EulerAngles::from_rotation(&Rotation3::identity());
        assert!(identity.pitch.abs() < 1e-6);
        assert!(identity.yaw.abs() < 1e-6);
        assert!(identity.roll.abs() < 1e-6);

        let angles = EulerAngles {
            pitch: 10.0,
            yaw: 20.0,
            roll: 30.0,
        };
        let decomposed = EulerAngles::from_rotation(&angles.to_rotation());
        assert_relative_eq!(decomposed.pitch, 10.0, epsilon = 1e-6);
        assert_relative_eq!(decomposed.yaw, 20.0, epsilon = 1e-6);
        assert_relative_eq!(decomposed.roll, 30.0, epsilon = 1e-6);
    }

    #[test]
    fn test_euler_handles_large_angles() {
        let angles = EulerAngles {
            pitch: 170.0,
            yaw: -30.0,
            roll: -120.0,
        };
        let decomposed = EulerAngles::from_rotation(&angles.to_rotation());
        assert_relative_eq!(decomposed.pitch, 170.0, epsilon = 1e-6);
        assert_relative_eq!(decomposed.yaw, -30.0, epsilon = 1e-6);
        assert_relative_eq!(decomposed.roll, -120.0, epsilon = 1e-6);
    }

    #[test]
    fn test_recovers_frontal_pose() {
        let estimator = estimator();
        let rotation = Rotation3::identity();
        let translation = Vector3::new(0.0, 0.0, 50.0);
        let pixels = estimator.project(&rotation, &translation);

        let candidates = estimator.estimate(&Correspondence::new(pixels));
        assert!(!candidates.is_empty());
        assert!(candidates.len() <= 4);

        let best = candidates
            .iter()
            .min_by(|a, b| {
                (a.translation - translation)
                    .norm()
                    .total_cmp(&(b.translation - translation).norm())
            })
            .unwrap();
        assert_relative_eq!(best.translation, translation, epsilon = 1e-4);
        assert!(best.angles.pitch.abs() < 1e-3);
        assert!(best.angles.yaw.abs() < 1e-3);
        assert!(best.angles.roll.abs() < 1e-3);
    }

    #[test]
    fn test_recovers_mirror_symmetric_views() {
        let estimator = estimator();
        let cases = [
            (0.0, 0.0, 0.0),
            (5.0, 0.0, 0.0),
            (-8.0, 0.0, 0.0),
            (0.0, 0.0, 10.0),
            (6.0, 0.0, -12.0),
            (0.0, 1e-4, 0.0),
            (0.0, 0.01, 0.0),
            (3.0, -0.1, 2.0),
        ];

        for (pitch, yaw, roll) in cases {
            let angles = EulerAngles { pitch, yaw, roll };
            let translation = Vector3::new(0.0, 0.0, 55.0);
            let pixels = estimator.project(&angles.to_rotation(), &translation);

            let candidates = estimator.estimate(&Correspondence::new(pixels));
            assert!(!candidates.is_empty(), "no candidates for {angles:?}");
            assert!(candidates.len() <= 4);

            let recovered = candidates.iter().any(|candidate| {
                (candidate.angles.pitch - pitch).abs() < 1e-3
                    && (candidate.angles.yaw - yaw).abs() < 1e-3
                    && (candidate.angles.roll - roll).abs() < 1e-3
                    && (candidate.translation - translation).norm() < 1e-3
            });
            assert!(recovered, "{angles:?} not among {candidates:?}");
        }
    }

    #[test]
    fn test_split_roots_do_not_duplicate_candidates() {
        let estimator = estimator();
        let pixels = estimator.project(&Rotation3::identity(), &Vector3::new(0.0, 0.0, 50.0));
        let candidates = estimator.estimate(&Correspondence::new(pixels));

        for (i, a) in candidates.iter().enumerate() {
            for b in &candidates[i + 1..] {
                let distinct =
                    (a.translation - b.translation).norm() > 1e-4 || a.rotation.angle_to(&b.rotation) > 1e-6;
                assert!(distinct, "duplicate candidate {a:?}");
            }
        }
    }

    #[test]
    fn test_candidates_reproject() {
        let estimator = estimator();
        let angles = EulerAngles {
            pitch: -12.0,
            yaw: 25.0,
            roll: 4.0,
        };
        let pixels = estimator.project(&angles.to_rotation(), &Vector3::new(3.0, -2.0, 60.0));

        for candidate in estimator.estimate(&Correspondence::new(pixels)) {
            let reprojected = estimator.project(&candidate.rotation, &candidate.translation);
            for (a, b) in reprojected.iter().zip(&pixels) {
                assert!((a - b).norm() < 1e-3, "{a} vs {b}");
            }
            for point in estimator.model().points() {
                assert!(candidate.transform_point(point).z > 0.0);
            }
        }
    }

    #[test]
    fn test_degenerate_model_yields_nothing() {
        let model = [Point3::origin(), Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let bearings = [Vector3::z(), Vector3::new(0.1, 0.0, 1.0).normalize(), Vector3::new(0.0, 0.1, 1.0).normalize()];
        assert!(solve_p3p(&model, &bearings).is_empty());
    }

    #[test]
    fn test_coincident_pixels_yield_nothing() {
        let estimator = estimator();
        let pixel = Point2::new(320.0, 240.0);
        assert!(estimator.estimate(&Correspondence::new([pixel; 3])).is_empty());
    }

    #[test]
    fn test_non_finite_pixels_yield_nothing() {
        let estimator = estimator();
        let points = [Point2::new(f64::NAN, 10.0), Point2::new(100.0, 100.0), Point2::new(200.0, 50.0)];
        assert!(estimator.estimate(&Correspondence::new(points)).is_empty());
    }
}
