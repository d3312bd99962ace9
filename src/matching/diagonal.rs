use std::ops::Range;

use super::{min3, DtwKernel, DtwScratch, INF, LANES};
use crate::db::models::Song;
use crate::pitch::PitchType;

/// Anti-diagonal kernel.
///
/// Cells on one anti-diagonal `d = row + col` depend only on diagonals `d-1`
/// and `d-2`, so each diagonal is filled in `LANES`-wide chunks without
/// branches. Reading the song through its reversed buffer makes the song
/// frames of one diagonal contiguous and in the same order as the query
/// frames; the buffer's zero padding covers the tail of the last chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagonalKernel;

impl DtwKernel for DiagonalKernel {
    fn score(
        &self,
        song: &Song,
        range: Range<usize>,
        query: &[PitchType],
        shift: PitchType,
        scratch: &mut DtwScratch,
    ) -> PitchType {
        let slen = range.len();
        let qlen = query.len();
        if slen == 0 || qlen == 0 {
            return INF;
        }
        // rev[k] == song.pitch[range.end - 1 - k], followed by padding.
        let rev = &song.simd_pitch[song.pitch.len() - range.end..];

        // Buffers are indexed by query column + 1; index 0 is the free-start column.
        let (q, d1, d2, d3) = scratch.prepare(query, shift, qlen + 1 + LANES);
        let (mut two_back, mut one_back, mut current) = (d1, d2, d3);

        let mut best = INF;
        for d in 0..slen + qlen - 1 {
            // Valid columns j satisfy 0 <= d - j < slen and j < qlen.
            let first = (d + 1).saturating_sub(slen);
            let end = (d + 1).min(qlen);
            // Song row d - j sits at reversed index slen - 1 - d + j.
            let rev_base = slen - 1 + first - d;

            let mut j = first;
            while j < end {
                let s = &rev[rev_base + (j - first)..][..LANES];
                let qs = &q[j..j + LANES];
                let up = &one_back[j + 1..j + 1 + LANES];
                let left = &one_back[j..j + LANES];
                let diag = &two_back[j..j + LANES];

                let mut lane = [0.0 as PitchType; LANES];
                for k in 0..LANES {
                    lane[k] = min3(up[k], diag[k], left[k]) + (s[k] - qs[k]).abs();
                }
                let take = LANES.min(end - j);
                current[j + 1..j + 1 + take].copy_from_slice(&lane[..take]);
                j += LANES;
            }

            if end == qlen && current[qlen] < best {
                best = current[qlen];
            }

            let oldest = two_back;
            two_back = one_back;
            one_back = current;
            current = oldest;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_scores_zero() {
        let song = Song::build(vec![1.0, 2.0, 3.0], "a", "");
        let mut scratch = DtwScratch::default();
        assert_eq!(DiagonalKernel.score(&song, 0..3, &[1.0, 2.0, 3.0], 0.0, &mut scratch), 0.0);
    }

    #[test]
    fn test_reversed_scores_positive() {
        let song = Song::build(vec![3.0, 2.0, 1.0], "b", "");
        let mut scratch = DtwScratch::default();
        assert!(DiagonalKernel.score(&song, 0..3, &[1.0, 2.0, 3.0], 0.0, &mut scratch) > 0.0);
    }

    #[test]
    fn test_sub_range_ignores_frames_outside() {
        // The exact match lives in frames 4..7; restricting to 0..4 must not see it.
        let song = Song::build(vec![10.0, 10.0, 10.0, 10.0, 60.0, 62.0, 64.0], "c", "");
        let query = [60.0, 62.0, 64.0];
        let mut scratch = DtwScratch::default();
        assert_eq!(DiagonalKernel.score(&song, 4..7, &query, 0.0, &mut scratch), 0.0);
        assert!(DiagonalKernel.score(&song, 0..4, &query, 0.0, &mut scratch) > 100.0);
    }

    #[test]
    fn test_query_longer_than_lanes() {
        let pitch: Vec<PitchType> = (0..50).map(|i| 50.0 + (i % 7) as PitchType).collect();
        let song = Song::build(pitch.clone(), "d", "");
        let query = &pitch[10..30];
        let mut scratch = DtwScratch::default();
        assert_eq!(DiagonalKernel.score(&song, 0..50, query, 0.0, &mut scratch), 0.0);
    }
}
