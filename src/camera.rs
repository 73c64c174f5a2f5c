//! Camera source contract and camera intrinsics.
//!
//! The tracker does not talk to camera hardware itself. A [`CameraSource`]
//! implementation owns the device and hands out frames; the tracker only
//! needs the reported optics to build [`CameraIntrinsics`].

use crate::{
    constants::{DISTORTION_COEFFICIENT_COUNT, EPSILON, UNDISTORT_ITERATIONS},
    Result,
};
use nalgebra::{Matrix3, Point2};

/// Capture settings passed to [`CameraSource::open`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Device selection identifier
    pub device: String,
    /// Requested frame width in pixels
    pub width: u32,
    /// Requested frame height in pixels
    pub height: u32,
    /// Requested frames per second
    pub fps: u32,
}

/// Optics and format reported by a camera once it is open
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInfo {
    /// Actual frame width in pixels
    pub width: u32,
    /// Actual frame height in pixels
    pub height: u32,
    /// Actual frames per second
    pub fps: u32,
    /// Horizontal focal length in pixels
    pub focal_length_x: f64,
    /// Vertical focal length in pixels
    pub focal_length_y: f64,
    /// Principal point x in pixels
    pub principal_point_x: f64,
    /// Principal point y in pixels
    pub principal_point_y: f64,
    /// Second order radial distortion term
    pub radial_distortion_second_order: f64,
    /// Fourth order radial distortion term
    pub radial_distortion_fourth_order: f64,
    /// Sixth order radial distortion term
    pub radial_distortion_sixth_order: f64,
}

impl CameraInfo {
    /// Distortion-free pinhole optics derived from a horizontal field of view
    #[must_use]
    pub fn from_fov(width: u32, height: u32, fps: u32, horizontal_fov_degrees: f64) -> Self {
        let half_width = f64::from(width) / 2.0;
        let focal = half_width / (horizontal_fov_degrees.to_radians() / 2.0).tan();
        Self {
            width,
            height,
            fps,
            focal_length_x: focal,
            focal_length_y: focal,
            principal_point_x: half_width,
            principal_point_y: f64::from(height) / 2.0,
            radial_distortion_second_order: 0.0,
            radial_distortion_fourth_order: 0.0,
            radial_distortion_sixth_order: 0.0,
        }
    }
}

/// One raw frame borrowed from a camera source
///
/// The pixel buffer is only valid until the next poll, which the borrow on
/// the camera enforces.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Interleaved channels per pixel
    pub channels: usize,
    /// Bytes per channel sample, 1 or 2
    pub bytes_per_channel: usize,
    /// Bytes between the starts of consecutive rows
    pub stride: usize,
    /// Raw pixel bytes
    pub data: &'a [u8],
}

/// A camera device the tracker can open and poll
pub trait CameraSource: Send {
    /// Open the device with the requested settings and report its optics
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened; the tracker retries
    /// on its next cycle.
    fn open(&mut self, request: &CaptureRequest) -> Result<CameraInfo>;

    /// Poll for a frame without blocking
    ///
    /// Returns `Ok(None)` when no new frame arrived since the last poll.
    ///
    /// # Errors
    ///
    /// Returns an error if the device failed while reading.
    fn poll_frame(&mut self) -> Result<Option<Frame<'_>>>;

    /// Whether the device is currently open
    fn is_open(&self) -> bool;

    /// Stop capturing and release the device
    fn stop(&mut self);
}

/// Lens distortion coefficients in OpenCV layout `k1 k2 p1 p2 k3 k4 k5 k6`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistortionCoefficients(pub [f64; DISTORTION_COEFFICIENT_COUNT]);

impl DistortionCoefficients {
    /// Populate the three radial terms a camera reports
    ///
    /// They land at indices 1, 5 and 7; everything else stays zero.
    #[must_use]
    pub fn from_radial(second_order: f64, fourth_order: f64, sixth_order: f64) -> Self {
        let mut coefficients = [0.0; DISTORTION_COEFFICIENT_COUNT];
        coefficients[1] = second_order;
        coefficients[5] = fourth_order;
        coefficients[7] = sixth_order;
        Self(coefficients)
    }

    /// True when every coefficient is zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&k| k == 0.0)
    }

    /// Apply the distortion model to a normalised image point
    #[must_use]
    pub fn distort(&self, point: Point2<f64>) -> Point2<f64> {
        let [k1, k2, p1, p2, k3, k4, k5, k6] = self.0;
        let (x, y) = (point.x, point.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = (1.0 + k1 * r2 + k2 * r4 + k3 * r6) / (1.0 + k4 * r2 + k5 * r4 + k6 * r6);
        let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        Point2::new(x * radial + dx, y * radial + dy)
    }

    /// Invert the distortion model by fixed-point iteration
    #[must_use]
    pub fn undistort(&self, distorted: Point2<f64>) -> Point2<f64> {
        if self.is_zero() {
            return distorted;
        }

        let [k1, k2, p1, p2, k3, k4, k5, k6] = self.0;
        let (x0, y0) = (distorted.x, distorted.y);
        let (mut x, mut y) = (x0, y0);
        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            let numerator = 1.0 + k4 * r2 + k5 * r4 + k6 * r6;
            let denominator = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;
            if denominator.abs() < EPSILON {
                break;
            }
            let inverse_radial = numerator / denominator;
            let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
            let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
            x = (x0 - dx) * inverse_radial;
            y = (y0 - dy) * inverse_radial;
        }
        Point2::new(x, y)
    }
}

/// Pinhole intrinsics plus distortion, rebuilt every time the camera opens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    /// Horizontal focal length in pixels
    pub fx: f64,
    /// Vertical focal length in pixels
    pub fy: f64,
    /// Principal point x in pixels
    pub cx: f64,
    /// Principal point y in pixels
    pub cy: f64,
    /// Lens distortion
    pub distortion: DistortionCoefficients,
}

impl CameraIntrinsics {
    /// Build intrinsics from what an opened camera reports
    #[must_use]
    pub fn from_info(info: &CameraInfo) -> Self {
        Self {
            fx: info.focal_length_x,
            fy: info.focal_length_y,
            cx: info.principal_point_x,
            cy: info.principal_point_y,
            distortion: DistortionCoefficients::from_radial(
                info.radial_distortion_second_order,
                info.radial_distortion_fourth_order,
                info.radial_distortion_sixth_order,
            ),
        }
    }

    /// The 3x3 camera matrix `K`
    #[must_use]
    pub fn camera_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Map a pixel to undistorted normalised image coordinates
    #[must_use]
    pub fn normalize(&self, pixel: &Point2<f64>) -> Point2<f64> {
        let distorted = Point2::new((pixel.x - self.cx) / self.fx, (pixel.y - self.cy) / self.fy);
        self.distortion.undistort(distorted)
    }

    /// Map normalised image coordinates to a (distorted) pixel
    #[must_use]
    pub fn denormalize(&self, normalized: &Point2<f64>) -> Point2<f64> {
        let distorted = self.distortion.distort(*normalized);
        Point2::new(distorted.x * self.fx + self.cx, distorted.y * self.fy + self.cy)
    }
}
