//! Configuration management for the head pose tracker

use crate::{
    camera::CaptureRequest,
    constants::{
        DEFAULT_CAMERA_FPS, DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH, DEFAULT_CAP_X_MM, DEFAULT_CAP_Y_MM,
        DEFAULT_CAP_Z_MM, DEFAULT_TARGET_RATE,
    },
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera capture configuration
    pub camera: CameraConfig,

    /// Marker cap geometry
    pub model: ModelConfig,

    /// Processing loop configuration
    pub tracker: TrackerConfig,

    /// Preview configuration
    pub preview: PreviewConfig,
}

/// Camera capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device selection identifier, interpreted by the camera source
    pub device: String,

    /// Requested frame width in pixels
    pub width: u32,

    /// Requested frame height in pixels
    pub height: u32,

    /// Requested frames per second
    pub fps: u32,
}

/// Physical marker offsets of the cap, in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Horizontal distance from the centre line to each side marker
    pub cap_x: f64,

    /// Depth of the side markers behind the top marker
    pub cap_y: f64,

    /// Vertical drop from the top marker to the side markers
    pub cap_z: f64,
}

/// How the processing loop paces itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Sleep a fixed period after every cycle, regardless of work time
    FixedDelay,
    /// Sleep the remainder of the period, clamped at zero
    DriftCorrected,
}

/// Processing loop settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Target processing cycles per second
    pub target_rate: u32,

    /// Pacing strategy
    pub pacing: Pacing,
}

/// Preview settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Build annotated preview frames when a sink is attached and visible
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            model: ModelConfig::default(),
            tracker: TrackerConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            fps: DEFAULT_CAMERA_FPS,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            cap_x: DEFAULT_CAP_X_MM,
            cap_y: DEFAULT_CAP_Y_MM,
            cap_z: DEFAULT_CAP_Z_MM,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            target_rate: DEFAULT_TARGET_RATE,
            pacing: Pacing::FixedDelay,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl TrackerConfig {
    /// Nominal duration of one processing cycle
    ///
    /// Computed in whole milliseconds, so 55 Hz paces at 18 ms.
    #[must_use]
    pub fn cycle_period(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.target_rate.max(1)))
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Capture request derived from the camera section
    #[must_use]
    pub fn capture_request(&self) -> CaptureRequest {
        CaptureRequest {
            device: self.camera.device.clone(),
            width: self.camera.width,
            height: self.camera.height,
            fps: self.camera.fps,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::ConfigError(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }
        if self.camera.fps == 0 {
            return Err(Error::ConfigError("Camera FPS must be greater than 0".to_string()));
        }

        // Collinear or coincident markers leave P3P without a solution
        let ModelConfig { cap_x, cap_y, cap_z } = self.model;
        if ![cap_x, cap_y, cap_z].iter().all(|v| v.is_finite()) {
            return Err(Error::ConfigError("Marker offsets must be finite".to_string()));
        }
        if cap_x <= 0.0 {
            return Err(Error::ConfigError(
                "Marker offset cap_x must be greater than 0".to_string(),
            ));
        }
        if cap_y == 0.0 && cap_z == 0.0 {
            return Err(Error::ConfigError(
                "Marker offsets cap_y and cap_z cannot both be 0".to_string(),
            ));
        }

        if self.tracker.target_rate == 0 || self.tracker.target_rate > 1000 {
            return Err(Error::ConfigError(
                "Target rate must be between 1 and 1000".to_string(),
            ));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Pose Tracker Configuration

# Camera capture
camera:
  device: "default"
  width: 640
  height: 480
  fps: 60

# Marker cap offsets in millimetres
model:
  cap_x: 40.0
  cap_y: 60.0
  cap_z: 100.0

# Processing loop
tracker:
  target_rate: 55
  pacing: fixed_delay

# Preview
preview:
  enabled: true
"#;
