//! Pre-stitched world map segments and their pixel/world transform.

use std::fmt;

use image::buffer::ConvertBuffer;
use image::{Rgba32FImage, RgbaImage};

use crate::coord::{PixelPoint, Tile};

/// Maps world-map image pixels to world tiles.
///
/// Pixel `(0, 0)` is the top-left corner of `origin`. World Y grows north
/// while image Y grows down, so moving down the image decreases the tile Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapTransform {
    /// Tile drawn at the image's top-left corner.
    pub origin: Tile,
    /// Edge length of one tile in map pixels.
    pub pixels_per_tile: u32,
}

impl MapTransform {
    pub fn new(origin: Tile, pixels_per_tile: u32) -> Self {
        Self {
            origin,
            pixels_per_tile: pixels_per_tile.max(1),
        }
    }

    /// Tile containing map pixel `point`.
    pub fn tile_at(&self, point: PixelPoint) -> Tile {
        let ppt = self.pixels_per_tile as i32;
        Tile::new(
            self.origin.x + point.x.div_euclid(ppt),
            self.origin.y - point.y.div_euclid(ppt),
            self.origin.plane,
        )
    }

    /// Map pixel at the top-left corner of `tile`.
    pub fn pixel_of(&self, tile: Tile) -> PixelPoint {
        let ppt = self.pixels_per_tile as i32;
        PixelPoint::new(
            (tile.x - self.origin.x) * ppt,
            (self.origin.y - tile.y) * ppt,
        )
    }
}

/// One decoded world map segment.
#[derive(Clone)]
pub struct WorldMap {
    name: String,
    image: Rgba32FImage,
    transform: MapTransform,
}

impl fmt::Debug for WorldMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldMap")
            .field("name", &self.name)
            .field("size", &self.image.dimensions())
            .field("transform", &self.transform)
            .finish()
    }
}

impl WorldMap {
    pub fn new(name: impl Into<String>, image: Rgba32FImage, transform: MapTransform) -> Self {
        Self {
            name: name.into(),
            image,
            transform,
        }
    }

    /// Build from an 8-bit decoded image.
    pub fn from_rgba8(name: impl Into<String>, image: &RgbaImage, transform: MapTransform) -> Self {
        Self::new(name, image.convert(), transform)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &Rgba32FImage {
        &self.image
    }

    pub fn transform(&self) -> &MapTransform {
        &self.transform
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_at_origin() {
        let t = MapTransform::new(Tile::new(3200, 3500, 0), 4);
        assert_eq!(t.tile_at(PixelPoint::new(0, 0)), Tile::new(3200, 3500, 0));
        assert_eq!(t.tile_at(PixelPoint::new(3, 3)), Tile::new(3200, 3500, 0));
    }

    #[test]
    fn test_tile_at_moves_south_down_the_image() {
        let t = MapTransform::new(Tile::new(100, 200, 1), 4);
        assert_eq!(t.tile_at(PixelPoint::new(8, 12)), Tile::new(102, 197, 1));
    }

    #[test]
    fn test_pixel_round_trip() {
        let t = MapTransform::new(Tile::new(0, 100, 0), 2);
        let tile = Tile::new(7, 91, 0);
        assert_eq!(t.tile_at(t.pixel_of(tile)), tile);
    }

    #[test]
    fn test_negative_pixels_floor() {
        let t = MapTransform::new(Tile::new(10, 10, 0), 4);
        assert_eq!(t.tile_at(PixelPoint::new(-1, 0)), Tile::new(9, 10, 0));
    }

    #[test]
    fn test_zero_scale_is_clamped() {
        assert_eq!(MapTransform::new(Tile::new(0, 0, 0), 0).pixels_per_tile, 1);
    }
}
