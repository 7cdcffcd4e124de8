//! Normalized cross-correlation score surface.

use image::Rgba32FImage;
use rayon::prelude::*;

use super::template::{Template, FLAT_ENERGY_PER_PIXEL};
use crate::coord::PixelRect;

/// Correlation scores for every needle placement inside a search region.
///
/// `scores[row * cols + col]` is the score with the needle's top-left corner
/// at `(origin_x + col, origin_y + row)` in haystack coordinates.
#[derive(Debug, Clone)]
pub(crate) struct ScoreMap {
    pub origin_x: u32,
    pub origin_y: u32,
    pub cols: usize,
    pub rows: usize,
    pub scores: Vec<f32>,
}

impl ScoreMap {
    pub(crate) fn index(&self, col: usize, row: usize) -> usize {
        row * self.cols + col
    }
}

/// Compute the score surface for `template` over `region` of `haystack`.
///
/// Returns `None` when the needle does not fit inside the region.
pub(crate) fn score_map(
    template: &Template,
    haystack: &Rgba32FImage,
    region: PixelRect,
) -> Option<ScoreMap> {
    let region = region.clamp_to(haystack.width(), haystack.height())?;
    if template.width() == 0
        || template.height() == 0
        || template.width() > region.width
        || template.height() > region.height
        || template.opaque_pixels() == 0
    {
        return None;
    }

    let cols = (region.width - template.width() + 1) as usize;
    let rows = (region.height - template.height() + 1) as usize;
    let stride = haystack.width() as usize * 4;
    let data = haystack.as_raw();

    let mut scores = vec![0.0f32; cols * rows];
    scores
        .par_chunks_mut(cols)
        .enumerate()
        .for_each(|(row, out)| {
            let y = region.y as usize + row;
            for (col, slot) in out.iter_mut().enumerate() {
                let x = region.x as usize + col;
                *slot = score_at(template, data, stride, x, y);
            }
        });

    Some(ScoreMap {
        origin_x: region.x,
        origin_y: region.y,
        cols,
        rows,
        scores,
    })
}

/// Zero-mean NCC of the template placed with its top-left corner at `(x, y)`,
/// summed over the three colour channels and restricted to opaque pixels.
fn score_at(template: &Template, data: &[f32], stride: usize, x: usize, y: usize) -> f32 {
    let mut sum = [0.0f64; 3];
    let mut sum_sq = [0.0f64; 3];
    let mut cross = 0.0f64;

    for p in template.pixels() {
        let base = (y + p.dy as usize) * stride + (x + p.dx as usize) * 4;
        for c in 0..3 {
            let h = data[base + c] as f64;
            sum[c] += h;
            sum_sq[c] += h * h;
            cross += h * p.rgb[c];
        }
    }

    let n = template.opaque_pixels() as f64;
    let variance: f64 = (0..3)
        .map(|c| (sum_sq[c] - sum[c] * sum[c] / n).max(0.0))
        .sum();
    if template.is_flat() || variance <= FLAT_ENERGY_PER_PIXEL * n {
        return 0.0;
    }
    (cross / (variance * template.energy()).sqrt()) as f32
}
