//! `webwalker locate`: one-shot position recognition on image files.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use webwalker::cache::FrameCache;
use webwalker::config::ConfigFile;
use webwalker::coord::{PixelPoint, Tile};
use webwalker::frame::{DeviceId, Frame};
use webwalker::recognizer::{MapTransform, PositionRecognizer, PositionResult, WorldMap};

use super::open_image;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct LocateArgs {
    /// Screenshot containing the minimap
    #[arg(long)]
    pub frame: PathBuf,

    /// Pre-stitched world map image
    #[arg(long)]
    pub map: PathBuf,

    /// World X of the map's top-left tile
    #[arg(long, default_value_t = 0)]
    pub origin_x: i32,

    /// World Y of the map's top-left tile
    #[arg(long, default_value_t = 0)]
    pub origin_y: i32,

    /// Plane the map belongs to
    #[arg(long, default_value_t = 0)]
    pub plane: i32,

    /// Map pixels per tile (defaults to the minimap scale)
    #[arg(long)]
    pub pixels_per_tile: Option<u32>,

    /// Minimap crop size (defaults to the configured region size)
    #[arg(long)]
    pub region: Option<u32>,

    /// Screen X of the minimap centre
    #[arg(long)]
    pub minimap_x: Option<i32>,

    /// Screen Y of the minimap centre
    #[arg(long)]
    pub minimap_y: Option<i32>,
}

pub fn run(args: LocateArgs, config: &ConfigFile) -> Result<(), CliError> {
    let result = locate(&args, config)?;
    print_result(&result, config.recognition.min_confidence);
    Ok(())
}

fn locate(args: &LocateArgs, config: &ConfigFile) -> Result<PositionResult, CliError> {
    let mut recognition = config.recognition.clone();
    let center = recognition.minimap.center;
    recognition.minimap.center = PixelPoint::new(
        args.minimap_x.unwrap_or(center.x),
        args.minimap_y.unwrap_or(center.y),
    );
    let region = args.region.unwrap_or(recognition.region_size);
    if region == 0 {
        return Err(CliError::Usage("--region must be greater than zero".to_string()));
    }
    let pixels_per_tile = args
        .pixels_per_tile
        .unwrap_or(recognition.minimap.pixels_per_tile);

    let screen = open_image(&args.frame)?.to_rgba8();
    let map_image = open_image(&args.map)?.to_rgba8();

    let device = DeviceId::new("file");
    let cache = Arc::new(FrameCache::new(1));
    cache.put(&device, Frame::new(device.clone(), screen));

    let map_name = args
        .map
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "map".to_string());
    let transform = MapTransform::new(
        Tile::new(args.origin_x, args.origin_y, args.plane),
        pixels_per_tile,
    );

    let recognizer = PositionRecognizer::new(cache, recognition);
    recognizer.load_map(
        &device,
        Arc::new(WorldMap::from_rgba8(map_name, &map_image, transform)),
    );
    Ok(recognizer.locate(&device, region))
}

fn print_result(result: &PositionResult, min_confidence: f32) {
    if result.confidence <= 0.0 {
        println!("Position not recognized");
        return;
    }
    println!("Tile:       {}", result.tile);
    println!("Map pixel:  {}", result.point);
    println!(
        "Confidence: {:.3}{}",
        result.confidence,
        if result.is_reliable(min_confidence) {
            ""
        } else {
            " (unreliable)"
        }
    );
}
