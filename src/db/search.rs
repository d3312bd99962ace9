//! Ranked search over the whole database.

use std::cmp::Ordering;
use std::sync::Arc;

use rayon::prelude::*;

use super::Database;
use super::models::{SearchOutcome, Song, SongPitchRange, SongScore};
use crate::config::SearchConfig;
use crate::matching::{DtwKernel, DtwScratch, INF, find_where};
use crate::pitch::PitchType;
use crate::stats;

/// A song's best range and the cost it scored.
struct Candidate {
    song_id: String,
    song: Arc<Song>,
    range: SongPitchRange,
    score: PitchType,
}

impl Database {
    /// Rank every song against `query`.
    ///
    /// Each song scores its best range at the transposition that moves the
    /// query median onto the range median. Results are sorted by ascending
    /// cost and cut where the scores stop looking like matches.
    pub fn search(&self, query: &[PitchType]) -> SearchOutcome {
        let Some(query_median) = stats::median(query) else {
            return SearchOutcome::default();
        };
        let songs = self.snapshot();
        if songs.is_empty() {
            return SearchOutcome::default();
        }
        let config = &self.search;
        let kernel = config.kernel.kernel();

        let mut candidates: Vec<Candidate> = songs
            .into_par_iter()
            .map_init(DtwScratch::default, |scratch, (song_id, song)| {
                let (range, score) = best_range(kernel, &song, query, query_median, scratch)?;
                Some(Candidate { song_id, song, range, score })
            })
            .flatten()
            .collect();

        let scores: Vec<f64> = candidates.iter().map(|c| c.score as f64).collect();
        let (mean, std_dev) = stats::mean_std(&scores);
        log::debug!(
            "Scored {} songs with {} kernel: mean {:.2}, std dev {:.2}",
            candidates.len(),
            config.kernel.label(),
            mean,
            std_dev
        );

        candidates.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.song_id.cmp(&b.song_id))
        });
        let scored = candidates.len();
        let keep = cutoff(&candidates, mean, config);
        candidates.truncate(keep);

        let songs = candidates
            .into_par_iter()
            .map(|c| {
                let slice = &c.song.pitch[c.range.from..c.range.to];
                let alignment = find_where(slice, query, query_median - c.range.median);
                SongScore {
                    song_id: c.song_id,
                    name: c.song.name.clone(),
                    score: c.score,
                    artist: c.song.artist.clone(),
                    from: c.range.from + alignment.from,
                    to: c.range.from + alignment.to,
                }
            })
            .collect();

        SearchOutcome { songs, mean, std_dev, scored }
    }
}

/// Lowest-cost range of one song. `None` when nothing scored finite.
fn best_range(
    kernel: &dyn DtwKernel,
    song: &Song,
    query: &[PitchType],
    query_median: PitchType,
    scratch: &mut DtwScratch,
) -> Option<(SongPitchRange, PitchType)> {
    let mut best: Option<(SongPitchRange, PitchType)> = None;
    for range in song.search_ranges().iter() {
        let shift = query_median - range.median;
        let cost = kernel.score(song, range.from..range.to, query, shift, scratch);
        if cost < best.map_or(INF, |(_, c)| c) {
            best = Some((*range, cost));
        }
    }
    best
}

/// Number of sorted candidates to keep.
fn cutoff(sorted: &[Candidate], mean: f64, config: &SearchConfig) -> usize {
    let Some(first) = sorted.first() else {
        return 0;
    };
    let best = first.score as f64;
    let limit = sorted.len().min(config.max_results);
    sorted[..limit]
        .iter()
        .position(|c| {
            let score = c.score as f64;
            (score > config.mean_ratio * mean && score > config.score_floor)
                || score > config.best_ratio * best
        })
        .unwrap_or(limit)
}
