//! Coordinate module
//!
//! Provides the world tile type and the pixel-space primitives shared by the
//! matcher, the recognizer and the movement controller.

mod types;

pub use types::{ParseTileError, PixelPoint, PixelRect, Tile};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_same_plane() {
        let a = Tile::new(0, 0, 0);
        let b = Tile::new(3, 4, 0);
        assert_eq!(a.distance(&b), Some(5.0));
    }

    #[test]
    fn test_distance_across_planes_is_undefined() {
        let a = Tile::new(0, 0, 0);
        let b = Tile::new(3, 4, 1);
        assert_eq!(a.distance(&b), None);
        assert_eq!(a.distance_ignoring_plane(&b), 5.0);
    }

    #[test]
    fn test_parse_tile() {
        assert_eq!("3200,3200".parse::<Tile>(), Ok(Tile::new(3200, 3200, 0)));
        assert_eq!(" 1, -2 , 1".parse::<Tile>(), Ok(Tile::new(1, -2, 1)));
        assert!("1,2,3,4".parse::<Tile>().is_err());
        assert!("a,b".parse::<Tile>().is_err());
    }

    #[test]
    fn test_tile_display() {
        assert_eq!(Tile::new(1, 2, 3).to_string(), "(1, 2, 3)");
    }

    #[test]
    fn test_rect_overlap() {
        let a = PixelRect::new(0, 0, 10, 10);
        assert!(a.overlaps(&PixelRect::new(9, 9, 5, 5)));
        assert!(!a.overlaps(&PixelRect::new(10, 0, 5, 5)));
    }

    #[test]
    fn test_rect_clamp() {
        let r = PixelRect::new(90, 90, 20, 20);
        assert_eq!(r.clamp_to(100, 100), Some(PixelRect::new(90, 90, 10, 10)));
        assert_eq!(PixelRect::new(100, 0, 5, 5).clamp_to(100, 100), None);
    }

    #[test]
    fn test_rect_center() {
        assert_eq!(PixelRect::new(10, 20, 30, 40).center(), PixelPoint::new(25, 40));
    }
}
