//! Position recognition.
//!
//! Determines where the player stands by locating the on-screen minimap
//! inside a pre-stitched world map:
//!
//! 1. crop a square around the minimap centre from the latest cached frame;
//! 2. match it against the device's loaded [`WorldMap`], first inside a window
//!    around the last reliable position and then against the whole map;
//! 3. convert the best placement into a map pixel and a world [`Tile`].
//!
//! A missing frame or map is not an error: the result simply carries zero
//! confidence and callers decide what is reliable enough.

mod position;
mod walker_cache;
mod world_map;

use crate::coord::{PixelPoint, Tile};
use crate::frame::DeviceId;

pub use position::PositionRecognizer;
pub use walker_cache::WalkerCache;
pub use world_map::{MapTransform, WorldMap};

/// Default side length of the minimap crop, in screen pixels.
pub const DEFAULT_REGION_SIZE: u32 = 60;

/// Where the minimap is drawn on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimapGeometry {
    /// Screen pixel under the player marker.
    pub center: PixelPoint,
    /// Radius of the visible minimap disc in screen pixels.
    pub radius: u32,
    /// Edge length of one tile on the minimap, in screen pixels.
    pub pixels_per_tile: u32,
}

impl Default for MinimapGeometry {
    fn default() -> Self {
        Self {
            center: PixelPoint::new(815, 85),
            radius: 70,
            pixels_per_tile: 4,
        }
    }
}

impl MinimapGeometry {
    /// Whether a tile offset from the player is drawn inside the minimap disc.
    pub fn contains_offset(&self, dx_tiles: i32, dy_tiles: i32) -> bool {
        let ppt = self.pixels_per_tile as f64;
        let dx = dx_tiles as f64 * ppt;
        let dy = dy_tiles as f64 * ppt;
        (dx * dx + dy * dy).sqrt() <= self.radius as f64
    }

    /// Screen pixel of a tile offset from the player. World north is up.
    pub fn screen_point(&self, dx_tiles: i32, dy_tiles: i32) -> PixelPoint {
        let ppt = self.pixels_per_tile as i32;
        self.center.offset(dx_tiles * ppt, -dy_tiles * ppt)
    }
}

/// Recognizer tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerConfig {
    pub minimap: MinimapGeometry,
    /// Candidates below this score are discarded.
    pub match_threshold: f32,
    /// Score at which a position is considered reliable.
    pub min_confidence: f32,
    /// Number of candidates kept for change detection.
    pub top_matches: usize,
    /// Region size used by [`PositionSource`] callers.
    pub region_size: u32,
    /// Side of the relocalization window, in multiples of the region size.
    pub search_window_factor: u32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            minimap: MinimapGeometry::default(),
            match_threshold: 0.5,
            min_confidence: 0.7,
            top_matches: 5,
            region_size: DEFAULT_REGION_SIZE,
            search_window_factor: 3,
        }
    }
}

/// Outcome of one recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionResult {
    /// Player location in world-map pixels.
    pub point: PixelPoint,
    pub tile: Tile,
    /// Best match score, 0.0 when nothing was recognized.
    pub confidence: f32,
    pub region_size: u32,
}

impl PositionResult {
    /// Zero-confidence result at the origin.
    pub fn unknown(region_size: u32) -> Self {
        Self {
            point: PixelPoint::ORIGIN,
            tile: Tile::new(0, 0, 0),
            confidence: 0.0,
            region_size,
        }
    }

    pub fn is_reliable(&self, min_confidence: f32) -> bool {
        self.confidence > 0.0 && self.confidence >= min_confidence
    }
}

/// Anything that can report a device's current position.
pub trait PositionSource: Send + Sync {
    fn locate(&self, device: &DeviceId, region_size: u32) -> PositionResult;

    /// Confidence below which results should not be acted on.
    fn min_confidence(&self) -> f32;
}
