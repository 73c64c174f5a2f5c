//! Constants used throughout the tracker

/// Number of markers on the tracked cap, and the number of points P3P needs
pub const MARKER_COUNT: usize = 3;

/// Marker offsets are configured in millimetres, the solver works in centimetres
pub const MILLIMETRES_PER_MODEL_UNIT: f64 = 10.0;

/// Default marker offsets of the cap model in millimetres
pub const DEFAULT_CAP_X_MM: f64 = 40.0;
pub const DEFAULT_CAP_Y_MM: f64 = 60.0;
pub const DEFAULT_CAP_Z_MM: f64 = 100.0;

/// Default capture settings
pub const DEFAULT_CAMERA_WIDTH: u32 = 640;
pub const DEFAULT_CAMERA_HEIGHT: u32 = 480;
pub const DEFAULT_CAMERA_FPS: u32 = 60;

/// Default processing loop rate in cycles per second
pub const DEFAULT_TARGET_RATE: u32 = 55;

/// Length of the distortion vector, OpenCV layout `k1 k2 p1 p2 k3 k4 k5 k6`
pub const DISTORTION_COEFFICIENT_COUNT: usize = 8;

/// Fixed-point iterations used to invert the lens distortion model
pub const UNDISTORT_ITERATIONS: usize = 5;

/// Number of channels in a pose readout
pub const POSE_CHANNELS: usize = 6;

/// Half length of the cross drawn on the top marker in preview frames
pub const PREVIEW_CROSS_HALF_LENGTH: i64 = 10;

/// Relative tolerance when checking a P3P solution against the model geometry
pub const P3P_SIDE_TOLERANCE: f64 = 1e-3;

/// Imaginary parts of quartic roots tolerated as rounding noise
pub const P3P_IMAGINARY_TOLERANCE: f64 = 1e-5;

/// Below this the linear expression for the third distance ratio is ill-conditioned
pub const P3P_DENOMINATOR_EPSILON: f64 = 1e-3;

/// Side error under which both mirror solutions of a symmetric view are kept
pub const P3P_MIRROR_TOLERANCE: f64 = 1e-6;

/// Relative distance under which two P3P solutions count as the same pose
pub const P3P_DUPLICATE_TOLERANCE: f64 = 1e-5;

/// Below this a model side or bearing triangle is treated as degenerate
pub const GEOMETRY_EPSILON: f64 = 1e-9;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-12;
