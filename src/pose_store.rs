//! Hand-off of the selected pose from the tracker thread to consumers.
//!
//! The tracker publishes immutable [`Pose`] snapshots; readers copy the
//! latest one out. Once a pose has been published the store never goes
//! back to empty, so a failed cycle leaves the previous pose visible.

use crate::{constants::POSE_CHANNELS, pose_estimation::PoseCandidate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// The selected pose: angles in degrees, translation in centimetres
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// Rotation about the camera Y axis
    pub yaw: f64,
    /// Rotation about the camera X axis
    pub pitch: f64,
    /// Rotation about the camera Z axis
    pub roll: f64,
    /// Horizontal translation
    pub x: f64,
    /// Vertical translation
    pub y: f64,
    /// Distance along the optical axis
    pub z: f64,
}

impl From<&PoseCandidate> for Pose {
    fn from(candidate: &PoseCandidate) -> Self {
        Self {
            yaw: candidate.angles.yaw,
            pitch: candidate.angles.pitch,
            roll: candidate.angles.roll,
            x: candidate.translation.x,
            y: candidate.translation.y,
            z: candidate.translation.z,
        }
    }
}

/// Channel order of a pose readout buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Translation X
    TX = 0,
    /// Translation Y
    TY = 1,
    /// Translation Z
    TZ = 2,
    /// Yaw
    Yaw = 3,
    /// Pitch
    Pitch = 4,
    /// Roll
    Roll = 5,
}

impl Axis {
    /// All channels in buffer order
    pub const ALL: [Self; POSE_CHANNELS] = [Self::TX, Self::TY, Self::TZ, Self::Yaw, Self::Pitch, Self::Roll];
}

impl Pose {
    /// Value of a single channel
    #[must_use]
    pub fn channel(&self, axis: Axis) -> f64 {
        match axis {
            Axis::TX => self.x,
            Axis::TY => self.y,
            Axis::TZ => self.z,
            Axis::Yaw => self.yaw,
            Axis::Pitch => self.pitch,
            Axis::Roll => self.roll,
        }
    }

    /// The pose laid out in [`Axis`] order
    #[must_use]
    pub fn to_array(&self) -> [f64; POSE_CHANNELS] {
        Axis::ALL.map(|axis| self.channel(axis))
    }
}

/// Latest-pose slot shared between the tracker and its readers
#[derive(Debug, Default)]
pub struct PoseStore {
    latest: Mutex<Option<Pose>>,
    ever_published: AtomicBool,
}

impl PoseStore {
    /// An empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest pose
    pub fn publish(&self, pose: Pose) {
        let mut latest = self.latest.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *latest = Some(pose);
        self.ever_published.store(true, Ordering::Release);
    }

    /// Whether any pose has been published yet
    #[must_use]
    pub fn has_succeeded(&self) -> bool {
        self.ever_published.load(Ordering::Acquire)
    }

    /// Copy of the latest pose, if any
    #[must_use]
    pub fn latest(&self) -> Option<Pose> {
        if !self.has_succeeded() {
            return None;
        }
        *self.latest.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Write the latest pose into `out` in [`Axis`] order
    ///
    /// Leaves `out` untouched and returns `false` until the first publish.
    pub fn read_into(&self, out: &mut [f64; POSE_CHANNELS]) -> bool {
        match self.latest() {
            Some(pose) => {
                *out = pose.to_array();
                true
            }
            None => false,
        }
    }
}
