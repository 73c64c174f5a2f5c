//! Real-time head pose tracking from three bright markers on a cap.
//!
//! A dedicated thread reads camera frames, finds the markers, matches them
//! to a known three-point model and solves the perspective-three-point
//! problem. P3P yields up to four poses; the one closest to a level head is
//! published for consumers on other threads.
//!
//! The pipeline per frame:
//! 1. A [`camera::CameraSource`] delivers a raw frame
//! 2. A [`extraction::PointExtractor`] finds marker centroids
//! 3. [`correspondence::resolve`] orders them as right, left, top
//! 4. [`pose_estimation::PoseEstimator`] solves P3P
//! 5. [`selection::select_best`] keeps the candidate with the smallest pitch
//! 6. The pose lands in a [`pose_store::PoseStore`]
//!
//! # Examples
//!
//! ## Tracking a simulated cap
//!
//! ```no_run
//! use head_pose_tracker::{
//!     config::Config,
//!     model::MarkerModel,
//!     simulation::{BlobExtractor, HeadMotion, SimulatedCamera},
//!     tracker::{CaptureLoop, Tracker},
//!     Axis,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let camera = SimulatedCamera::new(MarkerModel::from_offsets(&config.model), HeadMotion::default(), 60.0);
//! let capture_loop = CaptureLoop::new(&config, Box::new(camera), Box::new(BlobExtractor::default()))?;
//! let mut tracker = Tracker::spawn(capture_loop)?;
//!
//! let mut pose = [0.0; 6];
//! std::thread::sleep(std::time::Duration::from_millis(200));
//! if tracker.read_pose(&mut pose) {
//!     println!("Yaw: {:.2}°, Pitch: {:.2}°", pose[Axis::Yaw as usize], pose[Axis::Pitch as usize]);
//! }
//!
//! tracker.stop()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Solving a single frame
//!
//! ```
//! use head_pose_tracker::{
//!     camera::{CameraInfo, CameraIntrinsics},
//!     model::MarkerModel,
//!     pipeline,
//!     pose_estimation::{EulerAngles, PoseEstimator},
//! };
//! use nalgebra::Vector3;
//!
//! let intrinsics = CameraIntrinsics::from_info(&CameraInfo::from_fov(640, 480, 60, 60.0));
//! let estimator = PoseEstimator::new(MarkerModel::default(), intrinsics);
//!
//! let level = EulerAngles { pitch: 0.0, yaw: 10.0, roll: 0.0 };
//! let points = estimator.project(&level.to_rotation(), &Vector3::new(0.0, 0.0, 50.0));
//!
//! let estimate = pipeline::estimate(&points, &estimator).unwrap();
//! let pose = estimate.pose().unwrap();
//! assert!((pose.yaw - 10.0).abs() < 1e-3);
//! ```

/// Camera source contract and intrinsics
pub mod camera;

/// Configuration management
pub mod config;

/// Constants used throughout the tracker
pub mod constants;

/// Assignment of detections to marker roles
pub mod correspondence;

/// Error types and result handling
pub mod error;

/// Point extractor contract
pub mod extraction;

/// Frame rate meter
pub mod fps;

/// Typed views over raw frames
pub mod image_view;

/// Three-marker cap model
pub mod model;

/// Detections to selected pose
pub mod pipeline;

/// P3P solver and Euler decomposition
pub mod pose_estimation;

/// Latest-pose hand-off between threads
pub mod pose_store;

/// Annotated preview frames
pub mod preview;

/// Choice among ambiguous P3P solutions
pub mod selection;

/// Synthetic camera and extractor
pub mod simulation;

/// Capture loop and tracker thread
pub mod tracker;

/// Numeric helpers
pub mod utils;

pub use error::{Error, Result};
pub use pose_store::{Axis, Pose};
pub use tracker::{CaptureLoop, CycleOutcome, Tracker, TrackerState, TrackerStats};
