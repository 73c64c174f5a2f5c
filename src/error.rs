//! Error types for the head pose tracker.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Camera could not be opened or stopped delivering frames
    #[error("Camera error: {0}")]
    Camera(String),

    /// Frame pixel format is not one the tracker can view
    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(String),

    /// Frame buffer does not match its declared layout
    #[error("Frame layout error: {0}")]
    FrameLayout(#[from] ndarray::ShapeError),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Tracker thread lifecycle error
    #[error("Tracker error: {0}")]
    Tracker(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
