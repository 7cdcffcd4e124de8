//! Frame caching.
//!
//! Captured frames are held per device in a small ring buffer so the
//! recognizer can always read the latest sample without waiting on the
//! capture path.

mod frame_cache;
mod ring;

use std::fmt;

pub use frame_cache::{FrameCache, DEFAULT_FRAME_CAPACITY};

/// Frame cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `get` calls that returned a frame.
    pub hits: u64,
    /// `get` calls for devices with nothing buffered.
    pub misses: u64,
    /// Frames replaced by newer ones.
    pub evictions: u64,
    /// Devices with an allocated ring.
    pub devices: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames: {} hits, {} misses, {} evictions across {} devices",
            self.hits, self.misses, self.evictions, self.devices
        )
    }
}
