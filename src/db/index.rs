//! Search-time index of a song: overall pitch statistics, the transposition
//! ranges and the reversed buffer the diagonal kernel reads.
//!
//! A hummed query is compared at the transposition that moves its median onto
//! the song. Rather than try every transposition over the whole song, each
//! song records, per integer transposition `t`, the stretches where a local
//! average of the melody (over 80..=240 frames) stays within a semitone of
//! `t`. A query sung at level `t` can only match well inside those
//! stretches, so search scores the ranges and nothing else.

use std::borrow::Cow;

use super::models::{Song, SongPitchRange};
use crate::matching::LANES;
use crate::pitch::{MAX_PITCH, PitchType};
use crate::stats;

/// Window used to widen the transposition bounds.
const BOUND_WINDOW: usize = 128;
const BOUND_STRIDE: usize = 16;
/// Initial half-width of the transposition bounds around the song median.
const BOUND_MARGIN: PitchType = 2.0;

/// Shortest and longest local-average window, in frames.
const MIN_SPAN: usize = 80;
const MAX_SPAN: usize = 240;

/// How far (in semitones) a transposition may sit outside the local
/// average envelope and still count as compatible.
const ENVELOPE_SLACK: i64 = 1;

impl Song {
    /// Index a finished pitch sequence. An empty sequence produces a song the
    /// database will refuse to store.
    pub fn build(
        pitch: Vec<PitchType>,
        name: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        let median = stats::median(&pitch).unwrap_or(0.0);
        let (low, high) = transposition_bounds(&pitch, median);
        let ranges = if pitch.len() >= MIN_SPAN {
            compatible_ranges(&pitch, low, high)
        } else {
            Vec::new()
        };
        let simd_pitch = reversed_padded(&pitch);

        Song {
            name: name.into(),
            artist: artist.into(),
            pitch,
            median,
            low,
            high,
            ranges,
            simd_pitch,
        }
    }

    /// Ranges the search should score. Songs too short to have any are
    /// scored whole, at their median.
    pub fn search_ranges(&self) -> Cow<'_, [SongPitchRange]> {
        if self.ranges.is_empty() && !self.pitch.is_empty() {
            Cow::Owned(vec![SongPitchRange {
                from: 0,
                to: self.pitch.len(),
                median: self.median,
            }])
        } else {
            Cow::Borrowed(&self.ranges)
        }
    }
}

/// `[median - 2, median + 2]`, widened to cover the median of every
/// 128-frame window (stride 16).
fn transposition_bounds(pitch: &[PitchType], median: PitchType) -> (PitchType, PitchType) {
    let mut low = median - BOUND_MARGIN;
    let mut high = median + BOUND_MARGIN;
    let mut start = 0;
    while start + BOUND_WINDOW <= pitch.len() {
        if let Some(m) = stats::median(&pitch[start..start + BOUND_WINDOW]) {
            low = low.min(m);
            high = high.max(m);
        }
        start += BOUND_STRIDE;
    }
    (low, high)
}

/// For every frame, the min and max of the rounded average pitch over all
/// windows of `MIN_SPAN..=MAX_SPAN` frames that contain it.
/// Requires `pitch.len() >= MIN_SPAN`.
fn local_average_envelope(pitch: &[PitchType]) -> (Vec<i64>, Vec<i64>) {
    let n = pitch.len();
    let mut prefix = Vec::with_capacity(n + 1);
    let mut acc = 0.0f64;
    prefix.push(acc);
    for &p in pitch {
        acc += p as f64;
        prefix.push(acc);
    }

    let mut lower = vec![i64::MAX; n];
    let mut upper = vec![i64::MIN; n];
    for start in 0..=n - MIN_SPAN {
        let longest = (n - start).min(MAX_SPAN);
        let mut lo = i64::MAX;
        let mut hi = i64::MIN;
        // Walking lengths downwards, (lo, hi) covers every window starting
        // at `start` that reaches the frame `start + len - 1`.
        for len in (1..=longest).rev() {
            if len >= MIN_SPAN {
                let avg = ((prefix[start + len] - prefix[start]) / len as f64).round() as i64;
                lo = lo.min(avg);
                hi = hi.max(avg);
            }
            let frame = start + len - 1;
            lower[frame] = lower[frame].min(lo);
            upper[frame] = upper[frame].max(hi);
        }
    }
    (lower, upper)
}

/// Maximal runs of frames compatible with each integer transposition in
/// `floor(low)..=floor(high)`, clipped to the semitone range.
fn compatible_ranges(pitch: &[PitchType], low: PitchType, high: PitchType) -> Vec<SongPitchRange> {
    let (lower, upper) = local_average_envelope(pitch);
    let n = pitch.len();
    let mut ranges = Vec::new();

    let first = (low.floor() as i64).max(0);
    let last = (high.floor() as i64).min(MAX_PITCH as i64);
    for t in first..=last {
        let mut run_start: Option<usize> = None;
        for frame in 0..n {
            let fits =
                lower[frame] - ENVELOPE_SLACK <= t && t <= upper[frame] + ENVELOPE_SLACK;
            match (fits, run_start) {
                (true, None) => run_start = Some(frame),
                (false, Some(from)) => {
                    ranges.push(SongPitchRange { from, to: frame, median: t as PitchType });
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(from) = run_start {
            ranges.push(SongPitchRange { from, to: n, median: t as PitchType });
        }
    }
    ranges
}

fn reversed_padded(pitch: &[PitchType]) -> Vec<PitchType> {
    let mut out = Vec::with_capacity(pitch.len() + LANES);
    out.extend(pitch.iter().rev());
    out.resize(pitch.len() + LANES, 0.0);
    out
}
