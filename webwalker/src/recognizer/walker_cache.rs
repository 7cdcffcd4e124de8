//! Memory of the previous recognition for one device.

use super::PositionResult;
use crate::coord::PixelRect;
use crate::matcher::MatchCandidate;

/// Last observed match set and the position derived from it.
///
/// Used only to detect "nothing changed since the last sample". Written by
/// the recognizer; everyone else gets read access through a clone.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkerCache {
    map_name: String,
    frame_sequence: u64,
    matches: Vec<PixelRect>,
    result: PositionResult,
}

impl WalkerCache {
    pub(crate) fn new(
        map_name: &str,
        frame_sequence: u64,
        matches: &[MatchCandidate],
        result: PositionResult,
    ) -> Self {
        Self {
            map_name: map_name.to_string(),
            frame_sequence,
            matches: matches.iter().map(|m| m.rect).collect(),
            result,
        }
    }

    /// Whether `matches` lands on exactly the same pixels as the cached set.
    pub(crate) fn same_matches(&self, matches: &[MatchCandidate]) -> bool {
        self.matches.len() == matches.len()
            && self.matches.iter().zip(matches).all(|(a, b)| *a == b.rect)
    }

    pub(crate) fn is_same_frame(&self, map_name: &str, sequence: u64, region_size: u32) -> bool {
        self.map_name == map_name
            && self.frame_sequence == sequence
            && self.result.region_size == region_size
    }

    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    pub fn frame_sequence(&self) -> u64 {
        self.frame_sequence
    }

    /// Top-N match rectangles from the last recognition, best first.
    pub fn matches(&self) -> &[PixelRect] {
        &self.matches
    }

    pub fn last_result(&self) -> PositionResult {
        self.result
    }
}
