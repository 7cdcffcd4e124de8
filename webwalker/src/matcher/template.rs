//! Prepared needle images.

use image::buffer::ConvertBuffer;
use image::{Rgba32FImage, RgbaImage};

/// One opaque needle pixel, zero-mean per channel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TemplatePixel {
    pub dx: u32,
    pub dy: u32,
    pub rgb: [f64; 3],
}

/// Per-pixel energy at or below which a needle or window counts as flat.
pub(crate) const FLAT_ENERGY_PER_PIXEL: f64 = 1e-9;

/// A needle ready for correlation.
///
/// Pixels with zero alpha are excluded through the mask; the remaining colour
/// values are stored minus their per-channel mean so the correlation numerator
/// needs no extra pass over the haystack window.
#[derive(Debug, Clone)]
pub struct Template {
    width: u32,
    height: u32,
    pixels: Vec<TemplatePixel>,
    /// Sum of squared zero-mean values over all channels.
    energy: f64,
    masked: bool,
}

impl Template {
    /// Prepare a needle from its floating point matrix.
    pub fn from_rgba32f(image: &Rgba32FImage) -> Self {
        let (width, height) = image.dimensions();
        let mut raw = Vec::with_capacity((width * height) as usize);
        let mut masked = false;

        for (x, y, p) in image.enumerate_pixels() {
            if p[3] > 0.0 {
                raw.push((x, y, [p[0], p[1], p[2]]));
            } else {
                masked = true;
            }
        }

        let n = raw.len().max(1) as f64;
        let mut mean = [0.0f64; 3];
        for (_, _, rgb) in &raw {
            for c in 0..3 {
                mean[c] += rgb[c] as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut energy = 0.0f64;
        let pixels = raw
            .into_iter()
            .map(|(dx, dy, rgb)| {
                let centered = [
                    rgb[0] as f64 - mean[0],
                    rgb[1] as f64 - mean[1],
                    rgb[2] as f64 - mean[2],
                ];
                energy += centered.iter().map(|v| v * v).sum::<f64>();
                TemplatePixel {
                    dx,
                    dy,
                    rgb: centered,
                }
            })
            .collect();
        if energy <= FLAT_ENERGY_PER_PIXEL * n {
            energy = 0.0;
        }

        Self {
            width,
            height,
            pixels,
            energy,
            masked,
        }
    }

    /// Prepare a needle from an 8-bit RGBA image.
    pub fn from_rgba8(image: &RgbaImage) -> Self {
        let matrix: Rgba32FImage = image.convert();
        Self::from_rgba32f(&matrix)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether any pixel was excluded by the alpha mask.
    pub fn is_masked(&self) -> bool {
        self.masked
    }

    /// Number of pixels that take part in the correlation.
    pub fn opaque_pixels(&self) -> usize {
        self.pixels.len()
    }

    pub(crate) fn pixels(&self) -> &[TemplatePixel] {
        &self.pixels
    }

    pub(crate) fn energy(&self) -> f64 {
        self.energy
    }

    /// Whether the opaque pixels are a single colour and so cannot correlate.
    pub fn is_flat(&self) -> bool {
        self.energy == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_opaque_template_is_unmasked() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let t = Template::from_rgba8(&img);
        assert!(!t.is_masked());
        assert_eq!(t.opaque_pixels(), 6);
        assert_eq!((t.width(), t.height()), (3, 2));
    }

    #[test]
    fn test_transparent_pixels_are_masked_out() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let t = Template::from_rgba8(&img);
        assert!(t.is_masked());
        assert_eq!(t.opaque_pixels(), 3);
    }

    #[test]
    fn test_values_are_zero_mean() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
        let t = Template::from_rgba8(&img);
        let sum: f64 = t.pixels().iter().map(|p| p.rgb[0]).sum();
        assert!(sum.abs() < 1e-6);
        assert!(t.energy() > 0.0);
    }

    #[test]
    fn test_flat_template_has_no_energy() {
        for v in [0u8, 1, 50, 128, 254, 255] {
            let img = RgbaImage::from_pixel(6, 6, Rgba([v, v, v, 255]));
            let t = Template::from_rgba8(&img);
            assert_eq!(t.energy(), 0.0, "colour {}", v);
            assert!(t.is_flat());
        }
    }
}
