//! Capture and processing loop.
//!
//! [`CaptureLoop`] runs one synchronous cycle at a time: make sure the
//! camera is open, poll a frame, extract markers, resolve, solve, select and
//! publish. [`Tracker`] moves a loop onto its own thread and exposes the
//! latest pose to any other thread.
//!
//! Locks are always taken in the order camera, working state, pose store.
//! None of them is held across the pacing sleep.

use crate::{
    camera::{CameraIntrinsics, CameraSource, CaptureRequest},
    config::{Config, Pacing, TrackerConfig},
    constants::POSE_CHANNELS,
    extraction::PointExtractor,
    fps::FpsMeter,
    image_view::ImageView,
    model::MarkerModel,
    pipeline::{self, Estimate},
    pose_estimation::PoseEstimator,
    pose_store::{Pose, PoseStore},
    preview::{Preview, PreviewSink, CROSS_COLOR},
    Error, Result,
};
use log::{debug, info, trace, warn};
use nalgebra::Point2;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Name of the tracker thread
pub const THREAD_NAME: &str = "pt-tracker";

/// Lifecycle of the processing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrackerState {
    /// Waiting for the camera to open for the first time
    Idle = 0,
    /// Camera opened at least once, processing frames
    Running = 1,
    /// Interrupt seen, finishing up
    Stopping = 2,
    /// Camera stopped and the loop returned
    Stopped = 3,
}

impl TrackerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// What a single cycle did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// The camera is closed and could not be opened, or failed while reading
    CameraUnavailable,
    /// The camera had no new frame
    NoNewFrame,
    /// The frame layout could not be viewed as an image
    InvalidFrame,
    /// Fewer than three markers were found
    NoDetection {
        /// Number of points the extractor returned
        found: usize,
    },
    /// Markers were found but no pose fits them
    NoSolution,
    /// A new pose was published
    Published(Pose),
}

/// Counters and rates since the loop was created
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackerStats {
    /// Completed cycles
    pub cycles: u64,
    /// Frames processed
    pub frames: u64,
    /// Cycles that found no new frame, including cycles without an open camera
    pub skipped_frames: u64,
    /// Failed camera open attempts
    pub open_failures: u64,
    /// Failed frame polls
    pub read_failures: u64,
    /// Frames whose layout could not be viewed
    pub invalid_frames: u64,
    /// Frames with fewer than three markers
    pub missed_detections: u64,
    /// Frames whose markers admitted no pose
    pub failed_solves: u64,
    /// Poses published
    pub published: u64,
    /// Processed frames per second over the last full second
    pub effective_fps: f64,
    /// Skipped cycles per second over the last full second
    pub skipped_fps: f64,
}

/// Everything guarded by the camera lock
struct CameraState {
    camera: Box<dyn CameraSource>,
    request: CaptureRequest,
    intrinsics: Option<CameraIntrinsics>,
    model: MarkerModel,
    settings: TrackerConfig,
    preview_enabled: bool,
}

/// Last cycle's detections and solutions
#[derive(Default)]
struct WorkingState {
    points: Vec<Point2<f64>>,
    estimate: Option<Estimate>,
}

/// State shared between the loop thread and its owner
struct Shared {
    camera: Mutex<CameraState>,
    working: Mutex<WorkingState>,
    pose_store: PoseStore,
    stats: Mutex<TrackerStats>,
    state: AtomicU8,
    interrupt: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> TrackerState {
        TrackerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: TrackerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn apply_config(&self, config: &Config) -> Result<()> {
        config.validate()?;

        let mut camera_state = lock(&self.camera);
        let request = config.capture_request();
        if request != camera_state.request {
            camera_state.request = request;
            if camera_state.camera.is_open() {
                info!("Capture settings changed, reopening camera");
                camera_state.camera.stop();
                camera_state.intrinsics = None;
            }
        }
        camera_state.model = MarkerModel::from_offsets(&config.model);
        camera_state.settings = config.tracker;
        camera_state.preview_enabled = config.preview.enabled;
        Ok(())
    }
}

/// How long to sleep after a cycle that took `elapsed`
#[must_use]
pub fn pause_after(settings: &TrackerConfig, elapsed: Duration) -> Duration {
    let period = settings.cycle_period();
    match settings.pacing {
        Pacing::FixedDelay => period,
        Pacing::DriftCorrected => period.saturating_sub(elapsed),
    }
}

/// The processing loop, runnable one cycle at a time
pub struct CaptureLoop {
    shared: Arc<Shared>,
    extractor: Box<dyn PointExtractor>,
    preview_sink: Option<Box<dyn PreviewSink>>,
    fps: FpsMeter,
    settings: TrackerConfig,
    open_failure_streak: u64,
}

impl CaptureLoop {
    /// Create a loop over a camera and an extractor
    ///
    /// The camera is not opened until the first cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &Config, camera: Box<dyn CameraSource>, extractor: Box<dyn PointExtractor>) -> Result<Self> {
        config.validate()?;

        let camera_state = CameraState {
            camera,
            request: config.capture_request(),
            intrinsics: None,
            model: MarkerModel::from_offsets(&config.model),
            settings: config.tracker,
            preview_enabled: config.preview.enabled,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                camera: Mutex::new(camera_state),
                working: Mutex::new(WorkingState::default()),
                pose_store: PoseStore::new(),
                stats: Mutex::new(TrackerStats::default()),
                state: AtomicU8::new(TrackerState::Idle as u8),
                interrupt: AtomicBool::new(false),
            }),
            extractor,
            preview_sink: None,
            fps: FpsMeter::new(Instant::now()),
            settings: config.tracker,
            open_failure_streak: 0,
        })
    }

    /// Attach a sink that receives annotated previews while it is visible
    #[must_use]
    pub fn with_preview_sink(mut self, sink: Box<dyn PreviewSink>) -> Self {
        self.preview_sink = Some(sink);
        self
    }

    /// Run until interrupted, then stop the camera
    pub fn run(&mut self) {
        info!("Tracker loop started");

        while !self.shared.interrupt.load(Ordering::Acquire) {
            let started = Instant::now();
            let outcome = self.run_cycle();
            let elapsed = started.elapsed();
            trace!("Cycle took {elapsed:?}: {outcome:?}");

            let pause = pause_after(&self.settings, elapsed);
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }

        self.shared.set_state(TrackerState::Stopping);
        lock(&self.shared.camera).camera.stop();
        self.shared.set_state(TrackerState::Stopped);
        info!("Tracker loop stopped");
    }

    /// Run a single cycle without pacing
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.process_next_frame();

        let mut stats = lock(&self.shared.stats);
        stats.cycles += 1;
        match outcome {
            CycleOutcome::CameraUnavailable | CycleOutcome::NoNewFrame => {
                stats.skipped_frames += 1;
                self.fps.record_skip();
            }
            CycleOutcome::InvalidFrame => {
                stats.frames += 1;
                stats.invalid_frames += 1;
            }
            CycleOutcome::NoDetection { .. } => {
                stats.frames += 1;
                stats.missed_detections += 1;
            }
            CycleOutcome::NoSolution => {
                stats.frames += 1;
                stats.failed_solves += 1;
            }
            CycleOutcome::Published(_) => {
                stats.frames += 1;
                stats.published += 1;
            }
        }
        if self.fps.update(Instant::now()) {
            stats.effective_fps = self.fps.effective_fps();
            stats.skipped_fps = self.fps.skipped_fps();
            debug!("FPS: {:.1}/{:.1}", stats.effective_fps, stats.skipped_fps);
        }

        outcome
    }

    fn process_next_frame(&mut self) -> CycleOutcome {
        let mut guard = lock(&self.shared.camera);
        let camera_state = &mut *guard;
        self.settings = camera_state.settings;

        if !camera_state.camera.is_open() {
            match camera_state.camera.open(&camera_state.request) {
                Ok(info) => {
                    camera_state.intrinsics = Some(CameraIntrinsics::from_info(&info));
                    info!(
                        "Camera {} open at {}x{}@{}",
                        camera_state.request.device, info.width, info.height, info.fps
                    );
                    if self.open_failure_streak > 0 {
                        debug!("Camera opened after {} failed attempt(s)", self.open_failure_streak);
                        self.open_failure_streak = 0;
                    }
                    if self.shared.state() == TrackerState::Idle {
                        self.shared.set_state(TrackerState::Running);
                    }
                }
                Err(e) => {
                    if self.open_failure_streak == 0 {
                        warn!("Failed to open camera {}: {e}", camera_state.request.device);
                    } else {
                        debug!("Camera open attempt {} failed: {e}", self.open_failure_streak + 1);
                    }
                    self.open_failure_streak += 1;
                    lock(&self.shared.stats).open_failures += 1;
                    return CycleOutcome::CameraUnavailable;
                }
            }
        }

        let Some(intrinsics) = camera_state.intrinsics else {
            return CycleOutcome::CameraUnavailable;
        };
        let estimator = PoseEstimator::new(camera_state.model, intrinsics);
        let preview_enabled = camera_state.preview_enabled;

        let frame = match camera_state.camera.poll_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return CycleOutcome::NoNewFrame,
            Err(e) => {
                warn!("Camera read failed, reopening: {e}");
                camera_state.camera.stop();
                camera_state.intrinsics = None;
                lock(&self.shared.stats).read_failures += 1;
                return CycleOutcome::CameraUnavailable;
            }
        };
        self.fps.record_frame();

        let image = match ImageView::from_frame(&frame) {
            Ok(image) => image,
            Err(e) => {
                warn!("Dropping frame: {e}");
                return CycleOutcome::InvalidFrame;
            }
        };

        let mut preview = match &self.preview_sink {
            Some(sink) if preview_enabled && sink.is_visible() => Some(Preview::from_image(&image)),
            _ => None,
        };
        let points = self.extractor.extract(&image, preview.as_mut());
        drop(image);
        drop(guard);

        let (outcome, top) = self.solve(points, &estimator);

        if let (Some(mut preview), Some(sink)) = (preview, self.preview_sink.as_mut()) {
            preview.draw_info(self.fps.effective_fps(), self.fps.skipped_fps());
            if let Some(top) = top {
                preview.draw_cross(&top, CROSS_COLOR);
            }
            sink.present(&preview);
        }

        outcome
    }

    /// Resolve, solve, select and publish under the working lock
    fn solve(&self, points: Vec<Point2<f64>>, estimator: &PoseEstimator) -> (CycleOutcome, Option<Point2<f64>>) {
        let mut guard = lock(&self.shared.working);
        let working = &mut *guard;
        working.points = points;
        working.estimate = pipeline::estimate(&working.points, estimator);

        let Some(estimate) = &working.estimate else {
            trace!("Found {} of 3 markers", working.points.len());
            return (
                CycleOutcome::NoDetection {
                    found: working.points.len(),
                },
                None,
            );
        };

        let top = Some(estimate.top_point());
        match estimate.pose() {
            Some(pose) => {
                self.shared.pose_store.publish(pose);
                (CycleOutcome::Published(pose), top)
            }
            None => {
                debug!("No pose fits the detected markers");
                (CycleOutcome::NoSolution, top)
            }
        }
    }

    /// Latest pose store
    #[must_use]
    pub fn pose_store(&self) -> &PoseStore {
        &self.shared.pose_store
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.shared.state()
    }

    /// Counters and rates so far
    #[must_use]
    pub fn stats(&self) -> TrackerStats {
        *lock(&self.shared.stats)
    }

    /// Apply a new configuration, effective from the next cycle
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid; nothing changes then.
    pub fn apply_config(&self, config: &Config) -> Result<()> {
        self.shared.apply_config(config)
    }

    /// Ask [`CaptureLoop::run`] to return after the current cycle
    pub fn request_stop(&self) {
        self.shared.interrupt.store(true, Ordering::Release);
    }

    /// Whether the camera is currently open
    #[must_use]
    pub fn is_camera_open(&self) -> bool {
        lock(&self.shared.camera).camera.is_open()
    }

    /// Detections and solutions from the last processed frame
    #[must_use]
    pub fn last_estimate(&self) -> Option<Estimate> {
        lock(&self.shared.working).estimate.clone()
    }

    /// Raw detections from the last processed frame
    #[must_use]
    pub fn last_points(&self) -> Vec<Point2<f64>> {
        lock(&self.shared.working).points.clone()
    }
}

/// A [`CaptureLoop`] running on its own thread
pub struct Tracker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Tracker {
    /// Start the loop on a thread named [`THREAD_NAME`]
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(mut capture_loop: CaptureLoop) -> Result<Self> {
        let shared = Arc::clone(&capture_loop.shared);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || capture_loop.run())?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Copy the latest pose into `out` in [`crate::Axis`] order
    ///
    /// Returns `false` and leaves `out` untouched until a pose has been
    /// published.
    pub fn read_pose(&self, out: &mut [f64; POSE_CHANNELS]) -> bool {
        self.shared.pose_store.read_into(out)
    }

    /// Latest pose, if one was ever published
    #[must_use]
    pub fn latest(&self) -> Option<Pose> {
        self.shared.pose_store.latest()
    }

    /// Whether a pose was ever published
    #[must_use]
    pub fn has_succeeded(&self) -> bool {
        self.shared.pose_store.has_succeeded()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.shared.state()
    }

    /// Counters and rates so far
    #[must_use]
    pub fn stats(&self) -> TrackerStats {
        *lock(&self.shared.stats)
    }

    /// Apply a new configuration, effective from the next cycle
    ///
    /// A changed capture request stops the camera so the loop reopens it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid; nothing changes then.
    pub fn apply_config(&self, config: &Config) -> Result<()> {
        self.shared.apply_config(config)
    }

    /// Detections and solutions from the last processed frame
    #[must_use]
    pub fn last_estimate(&self) -> Option<Estimate> {
        lock(&self.shared.working).estimate.clone()
    }

    /// Interrupt the loop and wait for the thread to finish
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker thread panicked.
    pub fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.shared.interrupt.store(true, Ordering::Release);
        handle
            .join()
            .map_err(|_| Error::Tracker("Tracker thread panicked".to_string()))
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_ignores_work_time() {
        let settings = TrackerConfig::default();
        assert_eq!(pause_after(&settings, Duration::ZERO), Duration::from_millis(18));
        assert_eq!(pause_after(&settings, Duration::from_millis(50)), Duration::from_millis(18));
    }

    #[test]
    fn test_drift_corrected_subtracts_work_time() {
        let settings = TrackerConfig {
            target_rate: 50,
            pacing: Pacing::DriftCorrected,
        };
        assert_eq!(pause_after(&settings, Duration::from_millis(5)), Duration::from_millis(15));
        assert_eq!(pause_after(&settings, Duration::from_millis(25)), Duration::ZERO);
    }

    #[test]
    fn test_state_round_trip() {
        for state in [
            TrackerState::Idle,
            TrackerState::Running,
            TrackerState::Stopping,
            TrackerState::Stopped,
        ] {
            assert_eq!(TrackerState::from_u8(state as u8), state);
        }
    }
}
