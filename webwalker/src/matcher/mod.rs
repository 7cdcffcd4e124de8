//! Template matching.
//!
//! Locates a small needle image inside a larger haystack using zero-mean
//! normalized cross-correlation. Needles with transparent pixels are matched
//! through a binary mask (alpha > 0), so only opaque pixels influence the
//! score.
//!
//! # Acceptance window
//!
//! Candidates are accepted when `threshold <= score <= 1.1`. The theoretical
//! maximum is 1.0; the extra headroom absorbs floating point overshoot so a
//! perfect match is never rejected.
//!
//! # Duplicate suppression
//!
//! A single strong feature produces a plateau of high scores around its true
//! location. After each accepted peak the plateau is flood-filled and cleared,
//! and every placement overlapping the accepted rectangle is cleared, so one
//! instance yields exactly one candidate.
//!
//! The matcher holds no state and may be shared freely between threads.

mod ncc;
mod suppress;
mod template;

use image::{DynamicImage, Rgba32FImage};
use tracing::debug;

use crate::coord::PixelRect;

pub use template::Template;

/// Upper bound of the acceptance window.
pub const MAX_ACCEPTED_SCORE: f32 = 1.1;

/// Default cap on candidates returned by [`TemplateMatcher::match_all`].
pub const DEFAULT_MAX_RESULTS: usize = 64;

/// A located needle instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate {
    /// Needle placement in haystack pixels.
    pub rect: PixelRect,
    /// Correlation score (nominally -1.0..=1.0).
    pub score: f32,
}

/// Which candidate [`TemplateMatcher::find_masked`] should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPick {
    /// Highest scoring placement.
    #[default]
    Best,
    /// First placement in row-major order inside the acceptance window.
    First,
}

/// Stateless normalized cross-correlation matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMatcher;

impl TemplateMatcher {
    pub fn new() -> Self {
        Self
    }

    /// All non-overlapping placements scoring within the acceptance window,
    /// best first.
    pub fn match_all(
        &self,
        needle: &Template,
        haystack: &Rgba32FImage,
        threshold: f32,
    ) -> Vec<MatchCandidate> {
        self.match_all_limited(needle, haystack, threshold, DEFAULT_MAX_RESULTS)
    }

    /// Like [`match_all`](Self::match_all) with an explicit result cap.
    pub fn match_all_limited(
        &self,
        needle: &Template,
        haystack: &Rgba32FImage,
        threshold: f32,
        max_results: usize,
    ) -> Vec<MatchCandidate> {
        let full = PixelRect::new(0, 0, haystack.width(), haystack.height());
        self.match_in_region(needle, haystack, full, threshold, max_results)
    }

    /// Match only inside `region` of the haystack. Candidate rectangles are
    /// reported in haystack coordinates.
    pub fn match_in_region(
        &self,
        needle: &Template,
        haystack: &Rgba32FImage,
        region: PixelRect,
        threshold: f32,
        max_results: usize,
    ) -> Vec<MatchCandidate> {
        match ncc::score_map(needle, haystack, region) {
            Some(map) => {
                suppress::extract_peaks(map, needle.width(), needle.height(), threshold, max_results)
            }
            None => Vec::new(),
        }
    }

    /// The highest scoring candidate, if any clears `threshold`.
    pub fn best_match(
        &self,
        needle: &Template,
        haystack: &Rgba32FImage,
        threshold: f32,
    ) -> Option<MatchCandidate> {
        self.match_all_limited(needle, haystack, threshold, 1)
            .into_iter()
            .next()
    }

    /// Match a single expected instance of a (possibly transparent) needle.
    ///
    /// Returns `None` rather than failing when the two images have
    /// incompatible colour models or bit depths, or the needle does not fit.
    pub fn find_masked(
        &self,
        needle: &DynamicImage,
        haystack: &DynamicImage,
        threshold: f32,
        pick: MatchPick,
    ) -> Option<MatchCandidate> {
        if !formats_compatible(needle, haystack) {
            debug!(
                needle = ?needle.color(),
                haystack = ?haystack.color(),
                "Incompatible pixel formats, skipping match"
            );
            return None;
        }
        if needle.width() > haystack.width() || needle.height() > haystack.height() {
            return None;
        }

        let template = Template::from_rgba32f(&needle.to_rgba32f());
        let haystack = haystack.to_rgba32f();
        match pick {
            MatchPick::Best => self.best_match(&template, &haystack, threshold),
            MatchPick::First => {
                let full = PixelRect::new(0, 0, haystack.width(), haystack.height());
                let map = ncc::score_map(&template, &haystack, full)?;
                suppress::first_above(&map, template.width(), template.height(), threshold)
            }
        }
    }
}

/// Same colour model (grey vs colour) and the same bytes per channel.
fn formats_compatible(needle: &DynamicImage, haystack: &DynamicImage) -> bool {
    let (n, h) = (needle.color(), haystack.color());
    let depth = |c: image::ColorType| c.bytes_per_pixel() / c.channel_count();
    n.has_color() == h.has_color() && depth(n) == depth(h)
}
