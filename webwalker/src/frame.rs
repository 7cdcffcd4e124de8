//! Captured frames and device identifiers.
//!
//! A [`Frame`] holds one screen capture in two forms: the display-ready
//! `RgbaImage` and the floating point matrix the matcher works on. Both are
//! reference counted and immutable, so handing a frame to a consumer is a
//! cheap clone and never exposes a buffer the cache may still write to.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::buffer::ConvertBuffer;
use image::{Rgba32FImage, RgbaImage};

/// Width of the blank frame some capture backends return while the device
/// display is not ready.
pub const PLACEHOLDER_WIDTH: u32 = 894;

/// Height of the blank placeholder frame.
pub const PLACEHOLDER_HEIGHT: u32 = 540;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Identifier of a controlled device (emulator instance, window, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(Arc<str>);

impl DeviceId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId::new(s)
    }
}

/// A timestamped screen sample for one device.
#[derive(Debug, Clone)]
pub struct Frame {
    device: DeviceId,
    sequence: u64,
    captured_at: Instant,
    bitmap: Arc<RgbaImage>,
    matrix: Arc<Rgba32FImage>,
}

impl Frame {
    /// Build a frame from a raw capture, deriving the numeric matrix once.
    pub fn new(device: DeviceId, bitmap: RgbaImage) -> Self {
        let matrix: Rgba32FImage = bitmap.convert();
        Self::from_parts(device, bitmap, matrix)
    }

    /// Build a frame from already converted representations.
    pub fn from_parts(device: DeviceId, bitmap: RgbaImage, matrix: Rgba32FImage) -> Self {
        Self {
            device,
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            captured_at: Instant::now(),
            bitmap: Arc::new(bitmap),
            matrix: Arc::new(matrix),
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Process-wide monotonically increasing frame number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Display-ready bitmap.
    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }

    /// Numeric matrix (RGBA, 0.0..=1.0 per channel).
    pub fn matrix(&self) -> &Rgba32FImage {
        &self.matrix
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }
}

/// Returns true if `image` is the blank placeholder a backend hands out
/// instead of a real capture: fixed 894x540 dimensions and a fully
/// transparent first pixel.
pub fn is_placeholder(image: &RgbaImage) -> bool {
    image.width() == PLACEHOLDER_WIDTH
        && image.height() == PLACEHOLDER_HEIGHT
        && image.get_pixel(0, 0)[3] == 0
}
