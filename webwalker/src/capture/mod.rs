//! Screen capture scheduling.
//!
//! This module owns the periodic capture loop for every online device:
//!
//! ```text
//! ┌──────────────┐  tick   ┌────────────┐  capture  ┌───────────────┐
//! │ timer task   │───────► │ WorkerPool │─────────► │ ScreenCapture │
//! │ (per device) │         └─────┬──────┘           └───────────────┘
//! └──────────────┘               │ frame
//!                                ▼
//!                          ┌────────────┐
//!                          │ FrameCache │
//!                          └────────────┘
//! ```
//!
//! The device collaborators (capturing a screen, tapping a coordinate,
//! enumerating online devices) are traits so the engine never depends on a
//! particular transport.

mod pool;
mod scheduler;

use std::fmt;

use image::RgbaImage;
use thiserror::Error;

use crate::frame::DeviceId;

pub use pool::Dispatch;
pub use scheduler::{CaptureScheduler, ReconcileReport};

/// Default number of concurrent capture workers.
pub const DEFAULT_CAPTURE_WORKERS: usize = 4;

/// Errors reported by a capture backend.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device is not reachable.
    #[error("device {0} is offline")]
    Offline(DeviceId),

    /// The backend returned data that could not be decoded.
    #[error("garbled frame: {0}")]
    Garbled(String),

    /// Transport-level failure.
    #[error("capture backend error: {0}")]
    Backend(String),
}

/// Errors reported by an input backend.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("device {0} is offline")]
    Offline(DeviceId),

    #[error("input backend error: {0}")]
    Backend(String),
}

/// Captures raw screen frames.
pub trait ScreenCapture: Send + Sync {
    /// Capture the current screen of `device`.
    fn capture(&self, device: &DeviceId) -> Result<RgbaImage, CaptureError>;
}

/// Issues tap / move commands.
pub trait InputCommand: Send + Sync {
    /// Tap the screen of `device` at pixel `(x, y)`.
    fn tap(&self, device: &DeviceId, x: i32, y: i32) -> Result<(), InputError>;
}

/// View of which devices are online and which one automation targets.
pub trait DeviceRegistry: Send + Sync {
    /// Devices currently reachable.
    fn online_devices(&self) -> Vec<DeviceId>;

    /// Whether `device` is running automation or is the selected target.
    fn is_active(&self, device: &DeviceId) -> bool;
}

/// Capture pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Concurrent capture workers shared by all devices.
    pub workers: usize,
    /// Frames retained per device.
    pub frame_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_CAPTURE_WORKERS,
            frame_capacity: crate::cache::DEFAULT_FRAME_CAPACITY,
        }
    }
}

/// Capture counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames written to the cache.
    pub frames_stored: u64,
    /// Capture calls that errored or panicked.
    pub failures: u64,
    /// Blank placeholder frames skipped.
    pub placeholders: u64,
    /// Jobs run on the timer task because every worker was busy.
    pub overflow_runs: u64,
}

impl fmt::Display for CaptureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stored, {} failed, {} placeholders, {} overflow",
            self.frames_stored, self.failures, self.placeholders, self.overflow_runs
        )
    }
}
