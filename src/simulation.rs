//! Synthetic camera and blob extractor for running the tracker without
//! hardware.
//!
//! [`SimulatedCamera`] renders the three cap markers as bright discs on a
//! dark 8-bit frame while the head follows a slow scripted motion.
//! [`BlobExtractor`] finds the discs again by thresholding.

use crate::{
    camera::{CameraInfo, CameraIntrinsics, CameraSource, CaptureRequest, Frame},
    extraction::PointExtractor,
    image_view::ImageView,
    model::MarkerModel,
    pose_estimation::{EulerAngles, PoseEstimator},
    preview::Preview,
    utils::safe_cast::{checked_index, f64_to_i64_round, u32_to_usize},
    Error, Result,
};
use nalgebra::{Point2, Vector3};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Background grey level of rendered frames
const BACKGROUND: u8 = 16;

/// Marker disc brightness
const MARKER: u8 = 250;

/// Marker disc radius in pixels
const MARKER_RADIUS: i64 = 3;

/// Scripted head motion: slow sinusoids around a frontal pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadMotion {
    /// Peak yaw in degrees
    pub yaw_amplitude: f64,
    /// Peak pitch in degrees
    pub pitch_amplitude: f64,
    /// Peak roll in degrees
    pub roll_amplitude: f64,
    /// Distance of the cap from the camera in centimetres
    pub distance: f64,
}

impl Default for HeadMotion {
    fn default() -> Self {
        Self {
            yaw_amplitude: 25.0,
            pitch_amplitude: 6.0,
            roll_amplitude: 5.0,
            distance: 60.0,
        }
    }
}

impl HeadMotion {
    /// Pose at `t` seconds after the camera opened
    #[must_use]
    pub fn pose_at(&self, t: f64) -> (EulerAngles, Vector3<f64>) {
        let angles = EulerAngles {
            pitch: self.pitch_amplitude * (0.7 * t).sin(),
            yaw: self.yaw_amplitude * (1.1 * t).sin(),
            roll: self.roll_amplitude * (0.4 * t).sin(),
        };
        let translation = Vector3::new(3.0 * (0.3 * t).sin(), 0.0, self.distance);
        (angles, translation)
    }
}

/// A camera that renders the cap model under [`HeadMotion`]
#[derive(Debug)]
pub struct SimulatedCamera {
    model: MarkerModel,
    motion: HeadMotion,
    horizontal_fov: f64,
    failing_opens: u32,
    state: Option<OpenCamera>,
}

#[derive(Debug)]
struct OpenCamera {
    info: CameraInfo,
    estimator: PoseEstimator,
    width: usize,
    height: usize,
    stride: usize,
    frame_interval: Duration,
    opened_at: Instant,
    last_frame: Option<Instant>,
    buffer: Vec<u8>,
}

impl SimulatedCamera {
    /// A camera looking at `model` through a lens with the given horizontal field of view
    #[must_use]
    pub fn new(model: MarkerModel, motion: HeadMotion, horizontal_fov: f64) -> Self {
        Self {
            model,
            motion,
            horizontal_fov,
            failing_opens: 0,
            state: None,
        }
    }

    /// Make the next `count` open attempts fail, as an unplugged device would
    #[must_use]
    pub fn with_failing_opens(mut self, count: u32) -> Self {
        self.failing_opens = count;
        self
    }

    /// Optics reported once open
    #[must_use]
    pub fn info(&self) -> Option<CameraInfo> {
        self.state.as_ref().map(|state| state.info)
    }
}

impl CameraSource for SimulatedCamera {
    fn open(&mut self, request: &CaptureRequest) -> Result<CameraInfo> {
        if self.failing_opens > 0 {
            self.failing_opens -= 1;
            return Err(Error::Camera(format!("Device {} is not available", request.device)));
        }
        if request.fps == 0 {
            return Err(Error::Camera("Frame rate must be greater than 0".to_string()));
        }

        let info = CameraInfo::from_fov(request.width, request.height, request.fps, self.horizontal_fov);
        let width = u32_to_usize(request.width)?;
        let height = u32_to_usize(request.height)?;
        // Rows padded to four bytes like most capture drivers
        let stride = width.div_ceil(4) * 4;

        log::info!("Simulated camera {} open at {width}x{height}@{}", request.device, request.fps);
        self.state = Some(OpenCamera {
            info,
            estimator: PoseEstimator::new(self.model, CameraIntrinsics::from_info(&info)),
            width,
            height,
            stride,
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(request.fps)),
            opened_at: Instant::now(),
            last_frame: None,
            buffer: vec![BACKGROUND; stride * height],
        });
        Ok(info)
    }

    fn poll_frame(&mut self) -> Result<Option<Frame<'_>>> {
        let motion = self.motion;
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| Error::Camera("Camera is not open".to_string()))?;

        let now = Instant::now();
        if let Some(last) = state.last_frame {
            if now.duration_since(last) < state.frame_interval {
                return Ok(None);
            }
        }
        state.last_frame = Some(now);

        let (angles, translation) = motion.pose_at(now.duration_since(state.opened_at).as_secs_f64());
        state.render(&angles, &translation);

        Ok(Some(Frame {
            width: state.width,
            height: state.height,
            channels: 1,
            bytes_per_channel: 1,
            stride: state.stride,
            data: &state.buffer,
        }))
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }

    fn stop(&mut self) {
        if self.state.take().is_some() {
            log::info!("Simulated camera stopped");
        }
    }
}

impl OpenCamera {
    fn render(&mut self, angles: &EulerAngles, translation: &Vector3<f64>) {
        self.buffer.fill(BACKGROUND);
        for marker in self.estimator.project(&angles.to_rotation(), translation) {
            let (Some(cx), Some(cy)) = (f64_to_i64_round(marker.x), f64_to_i64_round(marker.y)) else {
                continue;
            };
            for dy in -MARKER_RADIUS..=MARKER_RADIUS {
                for dx in -MARKER_RADIUS..=MARKER_RADIUS {
                    if dx * dx + dy * dy > MARKER_RADIUS * MARKER_RADIUS {
                        continue;
                    }
                    let (Some(x), Some(y)) = (
                        checked_index(cx.saturating_add(dx), self.width),
                        checked_index(cy.saturating_add(dy), self.height),
                    ) else {
                        continue;
                    };
                    self.buffer[y * self.stride + x] = MARKER;
                }
            }
        }
    }
}

/// Thresholded connected-component centroids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobExtractor {
    /// Minimum 8-bit brightness of a marker pixel
    pub threshold: u8,
    /// Components smaller than this are treated as noise
    pub min_pixels: usize,
}

impl Default for BlobExtractor {
    fn default() -> Self {
        Self {
            threshold: 128,
            min_pixels: 3,
        }
    }
}

/// Colour of the centroid markers drawn by [`BlobExtractor`]
const BLOB_COLOR: [u8; 3] = [0, 255, 0];

impl PointExtractor for BlobExtractor {
    #[allow(clippy::cast_precision_loss)]
    fn extract(&mut self, image: &ImageView<'_>, preview: Option<&mut Preview>) -> Vec<Point2<f64>> {
        let (height, width, _) = image.dim();
        let mut visited = vec![false; width * height];
        let mut queue = VecDeque::new();
        let mut points = Vec::new();

        for start_y in 0..height {
            for start_x in 0..width {
                if visited[start_y * width + start_x] || image.sample_u8(start_y, start_x, 0) < self.threshold {
                    continue;
                }

                visited[start_y * width + start_x] = true;
                queue.push_back((start_x, start_y));
                let (mut sum_x, mut sum_y, mut count) = (0.0, 0.0, 0usize);

                while let Some((x, y)) = queue.pop_front() {
                    sum_x += x as f64;
                    sum_y += y as f64;
                    count += 1;

                    let neighbours = [
                        (x.wrapping_sub(1), y),
                        (x + 1, y),
                        (x, y.wrapping_sub(1)),
                        (x, y + 1),
                    ];
                    for (nx, ny) in neighbours {
                        if nx >= width || ny >= height || visited[ny * width + nx] {
                            continue;
                        }
                        if image.sample_u8(ny, nx, 0) >= self.threshold {
                            visited[ny * width + nx] = true;
                            queue.push_back((nx, ny));
                        }
                    }
                }

                if count >= self.min_pixels {
                    points.push(Point2::new(sum_x / count as f64, sum_y / count as f64));
                }
            }
        }

        if let Some(preview) = preview {
            for point in &points {
                if let (Some(x), Some(y)) = (f64_to_i64_round(point.x), f64_to_i64_round(point.y)) {
                    preview.set_pixel(x, y, BLOB_COLOR);
                }
            }
        }

        points
    }
}
