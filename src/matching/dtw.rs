use std::ops::Range;

use super::{min3, DtwKernel, DtwScratch, INF};
use crate::db::models::Song;
use crate::pitch::PitchType;

/// Best alignment of a query inside a song slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub cost: PitchType,
    /// First matched song frame.
    pub from: usize,
    /// One past the last matched song frame.
    pub to: usize,
}

/// Row-by-row kernel over the song's pitch sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowKernel;

impl DtwKernel for RowKernel {
    fn score(
        &self,
        song: &Song,
        range: Range<usize>,
        query: &[PitchType],
        shift: PitchType,
        scratch: &mut DtwScratch,
    ) -> PitchType {
        score_rows(&song.pitch[range], query, shift, scratch)
    }
}

/// DTW cost of `query` against `song` with free start and end.
pub fn score(song: &[PitchType], query: &[PitchType], shift: PitchType) -> PitchType {
    score_rows(song, query, shift, &mut DtwScratch::default())
}

pub(crate) fn score_rows(
    song: &[PitchType],
    query: &[PitchType],
    shift: PitchType,
    scratch: &mut DtwScratch,
) -> PitchType {
    let n = query.len();
    if song.is_empty() || n == 0 {
        return INF;
    }
    let (q, prev, cur, _) = scratch.prepare(query, shift, n + 1);
    let (mut prev, mut cur) = (prev, cur);

    let mut best = INF;
    for &s in song {
        for j in 0..n {
            cur[j + 1] = min3(prev[j + 1], prev[j], cur[j]) + (s - q[j]).abs();
        }
        std::mem::swap(&mut prev, &mut cur);
        if prev[n] < best {
            best = prev[n];
        }
    }
    best
}

/// Like [`score`], but also reports which song frames the optimal path covers.
///
/// Every cell carries the song row at which its path entered the matrix, so
/// the best final cell yields both ends of the match. Costs several times
/// more than [`score`]; the search only runs it on retained results.
pub fn find_where(song: &[PitchType], query: &[PitchType], shift: PitchType) -> Alignment {
    let n = query.len();
    if song.is_empty() || n == 0 {
        return Alignment { cost: INF, from: 0, to: 0 };
    }
    let q: Vec<PitchType> = query.iter().map(|&v| v - shift).collect();

    let mut prev = vec![INF; n + 1];
    let mut cur = vec![INF; n + 1];
    prev[0] = 0.0;
    cur[0] = 0.0;
    let mut prev_start = vec![0usize; n + 1];
    let mut cur_start = vec![0usize; n + 1];

    let mut best = Alignment { cost: INF, from: 0, to: 0 };
    for (i, &s) in song.iter().enumerate() {
        // Entering from the virtual zero column starts the path at this row.
        prev_start[0] = i;
        cur_start[0] = i;
        for j in 0..n {
            let mut v = prev[j + 1];
            let mut start = prev_start[j + 1];
            if prev[j] < v {
                v = prev[j];
                start = prev_start[j];
            }
            if cur[j] < v {
                v = cur[j];
                start = cur_start[j];
            }
            cur[j + 1] = v + (s - q[j]).abs();
            cur_start[j + 1] = start;
        }
        std::mem::swap(&mut prev, &mut cur);
        std::mem::swap(&mut prev_start, &mut cur_start);
        if prev[n] < best.cost {
            best = Alignment {
                cost: prev[n],
                from: prev_start[n],
                to: i + 1,
            };
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_identical_scores_zero() {
        assert_eq!(score(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 0.0), 0.0);
    }

    #[test]
    fn test_reversed_scores_positive() {
        assert!(score(&[3.0, 2.0, 1.0], &[1.0, 2.0, 3.0], 0.0) > 0.0);
    }

    #[test]
    fn test_shift_aligns_transposed_song() {
        // Song sits 5 semitones below the query: song + 5 == query.
        let song = [55.0, 57.0, 59.0, 60.0];
        let query = [60.0, 62.0, 64.0, 65.0];
        assert_eq!(score(&song, &query, 5.0), 0.0);
        assert!(score(&song, &query, 0.0) > 0.0);
    }

    #[test]
    fn test_free_start_and_end() {
        // Query matches exactly in the middle of a longer song.
        let song = [40.0, 41.0, 60.0, 62.0, 64.0, 30.0, 31.0];
        let query = [60.0, 62.0, 64.0];
        assert_eq!(score(&song, &query, 0.0), 0.0);
        let a = find_where(&song, &query, 0.0);
        assert_eq!(a, Alignment { cost: 0.0, from: 2, to: 5 });
    }

    #[test]
    fn test_find_where_full_range() {
        let a = find_where(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 0.0);
        assert_eq!(a, Alignment { cost: 0.0, from: 0, to: 3 });
    }

    #[test]
    fn test_time_stretch_is_free() {
        // Each query note held twice as long in the song costs nothing.
        let song = [60.0, 60.0, 62.0, 62.0, 64.0, 64.0];
        let query = [60.0, 62.0, 64.0];
        assert_eq!(score(&song, &query, 0.0), 0.0);
        assert_eq!(find_where(&song, &query, 0.0).to, 5);
    }

    #[test]
    fn test_not_worse_than_diagonal_path() {
        // DP optimum never exceeds the cost of the plain one-to-one path.
        let mut rng = StdRng::seed_from_u64(42);
        for len in 1..20 {
            let song: Vec<PitchType> = (0..len + 5).map(|_| rng.gen_range(40..80) as PitchType).collect();
            let query: Vec<PitchType> = (0..len).map(|_| rng.gen_range(40..80) as PitchType).collect();
            for offset in 0..5 {
                let fixed: PitchType = (0..len)
                    .map(|j| (song[offset + j] + 1.5 - query[j]).abs())
                    .sum();
                assert!(score(&song, &query, 1.5) <= fixed + 1e-3);
            }
        }
    }

    #[test]
    fn test_find_where_cost_matches_score() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let n = rng.gen_range(1..40);
            let m = rng.gen_range(1..15);
            let song: Vec<PitchType> = (0..n).map(|_| rng.gen_range(0..100) as PitchType / 3.0).collect();
            let query: Vec<PitchType> = (0..m).map(|_| rng.gen_range(0..100) as PitchType / 3.0).collect();
            let shift = rng.gen_range(-50..50) as PitchType / 10.0;
            let a = find_where(&song, &query, shift);
            assert_eq!(a.cost.to_bits(), score(&song, &query, shift).to_bits());
            assert!(a.from < a.to && a.to <= n);
        }
    }

    #[test]
    fn test_find_where_empty() {
        let a = find_where(&[], &[1.0], 0.0);
        assert_eq!(a.cost, INF);
        assert_eq!((a.from, a.to), (0, 0));
    }
}
