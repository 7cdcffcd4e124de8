//! Per-device frame cache.
//!
//! Each device owns a [`FrameRing`] behind its own `parking_lot::Mutex`. The
//! device map itself is a `DashMap`, so writers for different devices never
//! contend on a shared lock.
//!
//! Readers get a clone of the selected frame taken while holding the ring's
//! lock: they can never observe a slot halfway through being replaced. Since
//! frame buffers are reference counted, the clone is cheap and the replaced
//! frame's memory is released as soon as its last holder drops it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::ring::FrameRing;
use super::CacheStats;
use crate::frame::{DeviceId, Frame};

/// Default number of frames retained per device.
///
/// Enough slack for one slow consumer without unbounded growth.
pub const DEFAULT_FRAME_CAPACITY: usize = 5;

/// Fixed-capacity per-device frame cache.
#[derive(Debug)]
pub struct FrameCache {
    rings: DashMap<DeviceId, Arc<Mutex<FrameRing>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_CAPACITY)
    }
}

impl FrameCache {
    /// Create a cache retaining `capacity` frames per device (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            rings: DashMap::new(),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Frames retained per device.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn ring(&self, device: &DeviceId) -> Option<Arc<Mutex<FrameRing>>> {
        self.rings.get(device).map(|r| Arc::clone(r.value()))
    }

    /// Store the newest frame for `device`.
    ///
    /// Returns the frame evicted to make room, if the ring was full. Dropping
    /// the returned value releases its image memory right away.
    pub fn put(&self, device: &DeviceId, frame: Frame) -> Option<Frame> {
        match self.put_if(device, frame, || true) {
            Ok(evicted) => evicted,
            Err(_) => None,
        }
    }

    /// Store `frame` only if `admit` still holds.
    ///
    /// `admit` runs while the device's map entry is locked, so a concurrent
    /// [`clear`](Self::clear) lands either before the check or after the
    /// store. A rejected frame is handed back in `Err`.
    pub fn put_if(
        &self,
        device: &DeviceId,
        frame: Frame,
        admit: impl FnOnce() -> bool,
    ) -> Result<Option<Frame>, Frame> {
        let entry = self.rings.entry(device.clone());
        if !admit() {
            return Err(frame);
        }
        let ring = entry.or_insert_with(|| Arc::new(Mutex::new(FrameRing::new(self.capacity))));

        let evicted = ring.lock().push(frame);
        drop(ring);
        if evicted.is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(evicted)
    }

    /// Most recent frame for `device`, or `None` if it never captured.
    pub fn get(&self, device: &DeviceId) -> Option<Frame> {
        let latest = self
            .ring(device)
            .and_then(|ring| ring.lock().latest().cloned());
        match latest {
            Some(frame) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(frame)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// All buffered frames for `device`, oldest first.
    pub fn frames(&self, device: &DeviceId) -> Vec<Frame> {
        self.ring(device)
            .map(|ring| ring.lock().iter_oldest_first().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of frames buffered for `device`.
    pub fn len(&self, device: &DeviceId) -> usize {
        self.ring(device).map(|ring| ring.lock().len()).unwrap_or(0)
    }

    /// Devices that currently have a ring allocated.
    pub fn devices(&self) -> Vec<DeviceId> {
        self.rings.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop all buffered frames for one device.
    pub fn clear(&self, device: &DeviceId) {
        if let Some((_, ring)) = self.rings.remove(device) {
            let dropped = ring.lock().clear();
            tracing::debug!(device = %device, dropped, "Cleared frame cache");
        }
    }

    /// Drop all buffered frames for every device.
    pub fn clear_all(&self) {
        let devices = self.devices();
        for device in &devices {
            self.clear(device);
        }
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            devices: self.rings.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use proptest::prelude::*;
    use std::thread;

    fn frame(device: &DeviceId) -> Frame {
        Frame::new(device.clone(), RgbaImage::new(2, 2))
    }

    #[test]
    fn test_get_unknown_device_is_none() {
        let cache = FrameCache::default();
        assert!(cache.get(&DeviceId::new("never")).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(FrameCache::default().capacity(), DEFAULT_FRAME_CAPACITY);
    }

    #[test]
    fn test_put_then_get_returns_latest() {
        let cache = FrameCache::new(3);
        let dev = DeviceId::new("emu-1");
        let first = frame(&dev);
        let second = frame(&dev);
        cache.put(&dev, first);
        cache.put(&dev, second.clone());
        assert_eq!(
            cache.get(&dev).map(|f| f.sequence()),
            Some(second.sequence())
        );
    }

    #[test]
    fn test_put_if_rejected_leaves_cache_untouched() {
        let cache = FrameCache::new(2);
        let dev = DeviceId::new("emu-2");
        let rejected = frame(&dev);
        let seq = rejected.sequence();

        let result = cache.put_if(&dev, rejected, || false);
        assert_eq!(result.map_err(|f| f.sequence()).err(), Some(seq));
        assert!(cache.get(&dev).is_none());
        assert!(cache.devices().is_empty());

        assert!(cache.put_if(&dev, frame(&dev), || true).is_ok());
        assert_eq!(cache.len(&dev), 1);
    }

    #[test]
    fn test_put_returns_evicted_when_full() {
        let cache = FrameCache::new(2);
        let dev = DeviceId::new("emu-1");
        let a = frame(&dev);
        assert!(cache.put(&dev, a.clone()).is_none());
        assert!(cache.put(&dev, frame(&dev)).is_none());
        let evicted = cache.put(&dev, frame(&dev)).expect("should evict");
        assert_eq!(evicted.sequence(), a.sequence());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_devices_are_isolated() {
        let cache = FrameCache::new(2);
        let a = DeviceId::new("a");
        let b = DeviceId::new("b");
        cache.put(&a, frame(&a));
        assert!(cache.get(&b).is_none());
        assert_eq!(cache.len(&a), 1);
        assert_eq!(cache.len(&b), 0);
    }

    #[test]
    fn test_clear_single_device() {
        let cache = FrameCache::new(2);
        let a = DeviceId::new("a");
        let b = DeviceId::new("b");
        cache.put(&a, frame(&a));
        cache.put(&b, frame(&b));
        cache.clear(&a);
        assert!(cache.get(&a).is_none());
        assert!(cache.get(&b).is_some());
    }

    #[test]
    fn test_clear_all() {
        let cache = FrameCache::new(2);
        for name in ["a", "b", "c"] {
            let d = DeviceId::new(name);
            cache.put(&d, frame(&d));
        }
        cache.clear_all();
        assert!(cache.devices().is_empty());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let cache = Arc::new(FrameCache::new(4));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let dev = DeviceId::new(format!("dev-{}", i % 2));
                    for _ in 0..50 {
                        cache.put(&dev, frame(&dev));
                        assert!(cache.get(&dev).is_some());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(&DeviceId::new("dev-0")), 4);
        assert_eq!(cache.len(&DeviceId::new("dev-1")), 4);
    }

    proptest! {
        #[test]
        fn prop_holds_most_recent_capacity_frames(capacity in 1usize..8, puts in 1usize..24) {
            let cache = FrameCache::new(capacity);
            let dev = DeviceId::new("p");
            let mut written = Vec::new();
            for _ in 0..puts {
                let f = frame(&dev);
                written.push(f.sequence());
                cache.put(&dev, f);
            }
            let held: Vec<u64> = cache.frames(&dev).iter().map(Frame::sequence).collect();
            let expected: Vec<u64> = written[written.len().saturating_sub(capacity)..].to_vec();
            prop_assert_eq!(held, expected);
            prop_assert_eq!(cache.get(&dev).map(|f| f.sequence()), written.last().copied());
        }
    }
}
