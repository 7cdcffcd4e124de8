//! Fixed-capacity ring of frames for a single device.

use crate::frame::Frame;

/// Ring buffer of the most recent frames.
///
/// Slots are written round-robin; once every slot is filled the next write
/// replaces (and hands back) the oldest frame.
#[derive(Debug)]
pub(crate) struct FrameRing {
    slots: Vec<Option<Frame>>,
    /// Index of the next slot to write.
    next: usize,
    len: usize,
}

impl FrameRing {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            next: 0,
            len: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Write a frame into the next slot, returning the frame it replaced.
    pub(crate) fn push(&mut self, frame: Frame) -> Option<Frame> {
        let replaced = self.slots[self.next].replace(frame);
        self.next = (self.next + 1) % self.slots.len();
        if replaced.is_none() {
            self.len += 1;
        }
        replaced
    }

    /// The most recently written frame.
    pub(crate) fn latest(&self) -> Option<&Frame> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.next + self.slots.len() - 1) % self.slots.len();
        self.slots[idx].as_ref()
    }

    /// All buffered frames, oldest first.
    pub(crate) fn iter_oldest_first(&self) -> impl Iterator<Item = &Frame> {
        let cap = self.slots.len();
        let start = (self.next + cap - self.len) % cap;
        (0..self.len).filter_map(move |i| self.slots[(start + i) % cap].as_ref())
    }

    /// Drop every buffered frame.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.len;
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.next = 0;
        self.len = 0;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::DeviceId;
    use image::RgbaImage;

    fn frame() -> Frame {
        Frame::new(DeviceId::new("d"), RgbaImage::new(1, 1))
    }

    #[test]
    fn test_empty_ring() {
        let ring = FrameRing::new(3);
        assert_eq!(ring.len(), 0);
        assert!(ring.latest().is_none());
        assert_eq!(ring.iter_oldest_first().count(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let ring = FrameRing::new(0);
        assert_eq!(ring.capacity(), 1);
    }

    #[test]
    fn test_push_wraps_and_returns_oldest() {
        let mut ring = FrameRing::new(2);
        let a = frame();
        let b = frame();
        let c = frame();
        assert!(ring.push(a.clone()).is_none());
        assert!(ring.push(b.clone()).is_none());
        let evicted = ring.push(c.clone()).expect("ring was full");
        assert_eq!(evicted.sequence(), a.sequence());
        assert_eq!(ring.latest().map(Frame::sequence), Some(c.sequence()));

        let order: Vec<u64> = ring.iter_oldest_first().map(Frame::sequence).collect();
        assert_eq!(order, vec![b.sequence(), c.sequence()]);
    }

    #[test]
    fn test_clear_resets() {
        let mut ring = FrameRing::new(2);
        ring.push(frame());
        assert_eq!(ring.clear(), 1);
        assert_eq!(ring.len(), 0);
        assert!(ring.latest().is_none());
    }
}
