//! Closed-loop movement.
//!
//! A move taps the minimap once and then watches the recognized position
//! until it is close enough to the destination, backing off between samples
//! according to how far away the player still is:
//!
//! ```text
//! Idle ──► Moving ──► Reached
//!            │
//!            └──────► Failed (timeout, cancellation, lost position)
//! ```
//!
//! Long walks chain moves along a tile path, usually produced by the
//! navigation graph. All loops block the calling thread; run one device's
//! automation per thread and stop it through [`MovementController::cancel`].

mod controller;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::coord::Tile;
use crate::graph::NavigationError;
use crate::recognizer::DEFAULT_REGION_SIZE;

pub use controller::MovementController;

// ==================== Defaults ====================

/// Default arrival tolerance in minimap pixels.
pub const DEFAULT_TOLERANCE: f64 = 5.0;

/// Default arrival tolerance for the final step of a walk.
pub const DEFAULT_FINE_TOLERANCE: f64 = 2.0;

/// Default number of position samples before a move times out.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Default distance in tiles within which a path point counts as visited.
pub const DEFAULT_CLOSE_THRESHOLD: u32 = 3;

/// Largest random offset added to a tap on each axis, in pixels.
pub const JITTER_RANGE: i32 = 2;

/// Movement failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MovementError {
    #[error("destination not reached after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("movement cancelled")]
    Cancelled,

    #[error("position confidence {confidence:.2} is too low")]
    LowConfidence { confidence: f32 },

    #[error("{destination} is not visible on the minimap")]
    OutOfView { destination: Tile },

    #[error("path blocked at point {index}")]
    PathBlocked { index: usize },

    #[error(transparent)]
    Unreachable(#[from] NavigationError),

    #[error("path is empty")]
    EmptyPath,
}

impl MovementError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MovementError::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, MovementError::Timeout { .. })
    }
}

/// Per-device movement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveState {
    #[default]
    Idle,
    Moving,
    Reached,
    Failed,
}

impl fmt::Display for MoveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MoveState::Idle => "idle",
            MoveState::Moving => "moving",
            MoveState::Reached => "reached",
            MoveState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Poll delays by remaining distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay while farther than `far_distance`.
    pub far: Duration,
    /// Delay while farther than `mid_distance`.
    pub mid: Duration,
    /// Delay when close.
    pub near: Duration,
    pub far_distance: f64,
    pub mid_distance: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            far: Duration::from_millis(400),
            mid: Duration::from_millis(250),
            near: Duration::from_millis(100),
            far_distance: 10.0,
            mid_distance: 5.0,
        }
    }
}

impl Backoff {
    /// Same delay at every distance.
    pub fn constant(delay: Duration) -> Self {
        Self {
            far: delay,
            mid: delay,
            near: delay,
            ..Self::default()
        }
    }

    pub fn delay_for(&self, distance: f64) -> Duration {
        if distance > self.far_distance {
            self.far
        } else if distance > self.mid_distance {
            self.mid
        } else {
            self.near
        }
    }
}

/// Movement tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementConfig {
    /// Arrival tolerance in minimap pixels.
    pub tolerance: f64,
    pub max_attempts: u32,
    /// Randomize tap positions by up to [`JITTER_RANGE`] pixels.
    pub jitter: bool,
    /// Path points within this many tiles of the player are skipped.
    pub close_threshold: u32,
    /// Tolerance for the final step onto an exact destination.
    pub fine_tolerance: f64,
    pub backoff: Backoff,
    /// Minimap crop size passed to the position source.
    pub region_size: u32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            jitter: true,
            close_threshold: DEFAULT_CLOSE_THRESHOLD,
            fine_tolerance: DEFAULT_FINE_TOLERANCE,
            backoff: Backoff::default(),
            region_size: DEFAULT_REGION_SIZE,
        }
    }
}

/// Parameters of a single move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest {
    pub tolerance: f64,
    /// Position samples after the tap before timing out; 0 counts as 1.
    pub max_attempts: u32,
    pub jitter: bool,
}

impl MoveRequest {
    /// Request used for the last step onto an exact tile.
    pub fn fine(config: &MovementConfig) -> Self {
        Self {
            tolerance: config.fine_tolerance,
            jitter: false,
            ..Self::from(config)
        }
    }
}

impl From<&MovementConfig> for MoveRequest {
    fn from(config: &MovementConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            max_attempts: config.max_attempts,
            jitter: config.jitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_by_distance() {
        let b = Backoff::default();
        assert_eq!(b.delay_for(25.0), Duration::from_millis(400));
        assert_eq!(b.delay_for(10.0), Duration::from_millis(250));
        assert_eq!(b.delay_for(7.0), Duration::from_millis(250));
        assert_eq!(b.delay_for(5.0), Duration::from_millis(100));
        assert_eq!(b.delay_for(0.0), Duration::from_millis(100));
    }

    #[test]
    fn test_error_predicates() {
        assert!(MovementError::Cancelled.is_cancelled());
        assert!(!MovementError::Cancelled.is_timeout());
        assert!(MovementError::Timeout { attempts: 3 }.is_timeout());
    }

    #[test]
    fn test_fine_request() {
        let config = MovementConfig::default();
        let fine = MoveRequest::fine(&config);
        assert_eq!(fine.tolerance, DEFAULT_FINE_TOLERANCE);
        assert!(!fine.jitter);
        assert_eq!(fine.max_attempts, config.max_attempts);
    }
}
