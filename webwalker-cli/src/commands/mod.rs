//! CLI subcommands.

pub mod config;
pub mod locate;
pub mod matching;
pub mod path;

use std::path::Path;

use image::DynamicImage;

use crate::error::CliError;

/// Decode an image file.
pub fn open_image(path: &Path) -> Result<DynamicImage, CliError> {
    image::open(path).map_err(|e| CliError::Image {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
