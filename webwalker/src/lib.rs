//! Webwalker - screen-driven localization and navigation for emulated devices
//!
//! The engine watches each device's screen, recognizes where the player stands
//! by matching the minimap against a pre-stitched world map, and walks to
//! destinations by tapping the minimap and verifying progress:
//!
//! ```text
//! ScreenCapture ──► CaptureScheduler ──► FrameCache
//!                                            │
//!                        TemplateMatcher ◄── PositionRecognizer
//!                                            │
//!     NavigationGraph ──► MovementController ◄┘ ──► InputCommand
//! ```
//!
//! Device transports are supplied by the caller through the traits in
//! [`capture`].

pub mod cache;
pub mod capture;
pub mod config;
pub mod coord;
pub mod frame;
pub mod graph;
pub mod logging;
pub mod matcher;
pub mod movement;
pub mod recognizer;
pub mod script;

pub use cache::FrameCache;
pub use capture::{CaptureScheduler, DeviceRegistry, InputCommand, ScreenCapture};
pub use config::{ConfigFile, SharedSettings};
pub use coord::{PixelPoint, PixelRect, Tile};
pub use frame::{DeviceId, Frame};
pub use graph::NavigationGraph;
pub use matcher::TemplateMatcher;
pub use movement::{MovementController, MovementError};
pub use recognizer::{PositionRecognizer, PositionResult, PositionSource};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
