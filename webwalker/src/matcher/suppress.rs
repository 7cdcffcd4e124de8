//! Peak extraction with duplicate suppression.

use super::ncc::ScoreMap;
use super::{MatchCandidate, MAX_ACCEPTED_SCORE};
use crate::coord::PixelRect;

/// Value written into cleared placements; below any threshold.
const SUPPRESSED: f32 = f32::NEG_INFINITY;

/// Highest remaining score, first in row-major order on ties.
fn argmax(map: &ScoreMap) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in map.scores.iter().enumerate() {
        match best {
            Some((_, b)) if score <= b => {}
            _ => best = Some((idx, score)),
        }
    }
    best
}

/// Clear every placement whose needle rectangle overlaps the accepted one.
fn suppress_overlap(map: &mut ScoreMap, col: usize, row: usize, width: u32, height: u32) {
    let (w, h) = (width as usize, height as usize);
    let c0 = col.saturating_sub(w - 1);
    let r0 = row.saturating_sub(h - 1);
    let c1 = (col + w - 1).min(map.cols - 1);
    let r1 = (row + h - 1).min(map.rows - 1);
    for r in r0..=r1 {
        let start = map.index(c0, r);
        let end = map.index(c1, r);
        map.scores[start..=end].iter_mut().for_each(|s| *s = SUPPRESSED);
    }
}

/// Clear the 4-connected region of placements scoring at least `threshold`
/// around the accepted peak.
fn flood_fill(map: &mut ScoreMap, col: usize, row: usize, threshold: f32) {
    let mut stack = vec![(col, row)];
    while let Some((c, r)) = stack.pop() {
        let idx = map.index(c, r);
        if map.scores[idx] < threshold {
            continue;
        }
        map.scores[idx] = SUPPRESSED;
        if c > 0 {
            stack.push((c - 1, r));
        }
        if c + 1 < map.cols {
            stack.push((c + 1, r));
        }
        if r > 0 {
            stack.push((c, r - 1));
        }
        if r + 1 < map.rows {
            stack.push((c, r + 1));
        }
    }
}

/// Repeatedly take the best placement within `[threshold, MAX_ACCEPTED_SCORE]`,
/// suppressing its neighbourhood before looking for the next.
pub(crate) fn extract_peaks(
    mut map: ScoreMap,
    needle_width: u32,
    needle_height: u32,
    threshold: f32,
    max_results: usize,
) -> Vec<MatchCandidate> {
    let mut candidates = Vec::new();

    while candidates.len() < max_results {
        let Some((idx, score)) = argmax(&map) else {
            break;
        };
        if score < threshold {
            break;
        }
        let (col, row) = (idx % map.cols, idx / map.cols);

        if score > MAX_ACCEPTED_SCORE {
            // Outside the acceptance window; drop this placement only.
            map.scores[idx] = SUPPRESSED;
            continue;
        }

        candidates.push(MatchCandidate {
            rect: PixelRect::new(
                map.origin_x + col as u32,
                map.origin_y + row as u32,
                needle_width,
                needle_height,
            ),
            score,
        });

        flood_fill(&mut map, col, row, threshold);
        suppress_overlap(&mut map, col, row, needle_width, needle_height);
    }

    candidates
}

/// First placement in row-major order inside the acceptance window.
pub(crate) fn first_above(
    map: &ScoreMap,
    needle_width: u32,
    needle_height: u32,
    threshold: f32,
) -> Option<MatchCandidate> {
    let idx = map
        .scores
        .iter()
        .position(|s| (threshold..=MAX_ACCEPTED_SCORE).contains(s))?;
    let (col, row) = (idx % map.cols, idx / map.cols);
    Some(MatchCandidate {
        rect: PixelRect::new(
            map.origin_x + col as u32,
            map.origin_y + row as u32,
            needle_width,
            needle_height,
        ),
        score: map.scores[idx],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(cols: usize, rows: usize, hot: &[(usize, usize, f32)]) -> ScoreMap {
        let mut scores = vec![0.0; cols * rows];
        for &(c, r, s) in hot {
            scores[r * cols + c] = s;
        }
        ScoreMap {
            origin_x: 0,
            origin_y: 0,
            cols,
            rows,
            scores,
        }
    }

    #[test]
    fn test_plateau_yields_single_peak() {
        let m = map(
            10,
            10,
            &[(4, 4, 0.99), (5, 4, 0.97), (4, 5, 0.96), (5, 5, 0.95)],
        );
        let peaks = extract_peaks(m, 2, 2, 0.9, 10);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].rect, PixelRect::new(4, 4, 2, 2));
    }

    #[test]
    fn test_distant_peaks_are_both_reported_in_order() {
        let m = map(20, 20, &[(2, 2, 0.92), (15, 15, 0.98)]);
        let peaks = extract_peaks(m, 3, 3, 0.9, 10);
        assert_eq!(peaks.len(), 2);
        assert_eq!((peaks[0].rect.x, peaks[0].rect.y), (15, 15));
        assert_eq!((peaks[1].rect.x, peaks[1].rect.y), (2, 2));
    }

    #[test]
    fn test_overshoot_up_to_bound_is_accepted() {
        let m = map(5, 5, &[(1, 1, 1.05)]);
        let peaks = extract_peaks(m, 1, 1, 0.9, 10);
        assert_eq!(peaks.len(), 1);
    }

    #[test]
    fn test_scores_above_bound_are_rejected() {
        let m = map(5, 5, &[(1, 1, 1.5), (3, 3, 0.95)]);
        let peaks = extract_peaks(m, 1, 1, 0.9, 10);
        assert_eq!(peaks.len(), 1);
        assert_eq!((peaks[0].rect.x, peaks[0].rect.y), (3, 3));
    }

    #[test]
    fn test_max_results_caps_output() {
        let m = map(30, 30, &[(0, 0, 0.95), (10, 10, 0.96), (20, 20, 0.97)]);
        assert_eq!(extract_peaks(m, 2, 2, 0.9, 2).len(), 2);
    }

    #[test]
    fn test_first_above_is_row_major() {
        let m = map(5, 5, &[(4, 0, 0.91), (0, 3, 0.99)]);
        let first = first_above(&m, 1, 1, 0.9).unwrap();
        assert_eq!((first.rect.x, first.rect.y), (4, 0));
    }
}
