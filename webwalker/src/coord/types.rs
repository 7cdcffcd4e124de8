//! Coordinate value types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A world tile coordinate.
///
/// Tiles live on discrete planes (height levels). Two tiles on different
/// planes never interact: distances between them are undefined unless the
/// caller explicitly asks for the cross-plane variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    /// World X (grows east)
    pub x: i32,
    /// World Y (grows north)
    pub y: i32,
    /// Height level
    pub plane: i32,
}

impl Tile {
    /// Create a new tile.
    pub const fn new(x: i32, y: i32, plane: i32) -> Self {
        Self { x, y, plane }
    }

    /// Euclidean distance to another tile on the same plane.
    ///
    /// Returns `None` when the tiles are on different planes.
    pub fn distance(&self, other: &Tile) -> Option<f64> {
        if self.plane != other.plane {
            return None;
        }
        Some(self.distance_ignoring_plane(other))
    }

    /// Euclidean distance in the XY plane, regardless of height level.
    pub fn distance_ignoring_plane(&self, other: &Tile) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns a tile shifted by the given offsets on the same plane.
    pub fn translate(&self, dx: i32, dy: i32) -> Tile {
        Tile::new(self.x + dx, self.y + dy, self.plane)
    }

    /// Returns true if both tiles share a plane.
    pub fn same_plane(&self, other: &Tile) -> bool {
        self.plane == other.plane
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.plane)
    }
}

/// Error returned when parsing a tile from text.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid tile '{0}': expected x,y or x,y,plane")]
pub struct ParseTileError(pub String);

impl std::str::FromStr for Tile {
    type Err = ParseTileError;

    /// Parses `x,y` or `x,y,plane`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let parse = |v: &str| v.parse::<i32>().map_err(|_| ParseTileError(s.to_string()));
        match parts.as_slice() {
            [x, y] => Ok(Tile::new(parse(x)?, parse(y)?, 0)),
            [x, y, plane] => Ok(Tile::new(parse(x)?, parse(y)?, parse(plane)?)),
            _ => Err(ParseTileError(s.to_string())),
        }
    }
}

/// A point in pixel space (screen or map image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub const ORIGIN: PixelPoint = PixelPoint { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean pixel distance.
    pub fn distance(&self, other: &PixelPoint) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> PixelPoint {
        PixelPoint::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for PixelPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Centre of the rectangle, rounded down.
    pub fn center(&self) -> PixelPoint {
        PixelPoint::new(
            (self.x + self.width / 2) as i32,
            (self.y + self.height / 2) as i32,
        )
    }

    /// True if the two rectangles share at least one pixel.
    pub fn overlaps(&self, other: &PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Clamp this rectangle to a `width x height` canvas.
    ///
    /// Returns `None` when nothing of the rectangle remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let right = self.right().min(width);
        let bottom = self.bottom().min(height);
        if right <= x || bottom <= y {
            return None;
        }
        Some(PixelRect::new(x, y, right - x, bottom - y))
    }
}
