use serde::Serialize;

use crate::pitch::PitchType;

/// A stretch of a song that stays near one transposition.
///
/// Frames `from..to` of the song's pitch sequence all have a local average
/// pitch within one semitone of `median` (an integer transposition stored as
/// a pitch value). Search only scores a song inside its ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SongPitchRange {
    pub from: usize,
    pub to: usize,
    pub median: PitchType,
}

impl SongPitchRange {
    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }
}

/// An indexed song. Built once by [`Song::build`], never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Song {
    pub name: String,
    pub artist: String,
    pub pitch: Vec<PitchType>,
    pub median: PitchType,
    pub low: PitchType,
    pub high: PitchType,
    pub ranges: Vec<SongPitchRange>,
    /// `pitch` reversed, then padded with `matching::LANES` zeros.
    pub simd_pitch: Vec<PitchType>,
}

/// One song's result for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongScore {
    pub song_id: String,
    pub name: String,
    pub score: PitchType,
    pub artist: String,
    /// Matched song frames, half-open.
    pub from: usize,
    pub to: usize,
}

/// Ranked search result plus the statistics used for the cut-off.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub songs: Vec<SongScore>,
    /// Mean of the per-song best scores (songs with a finite score only).
    pub mean: f64,
    /// Population standard deviation of the same scores.
    pub std_dev: f64,
    /// Number of songs that produced a finite score.
    pub scored: usize,
}

/// One record of the flat-text song database.
#[derive(Debug, Clone, PartialEq)]
pub struct SongRecord {
    pub song_id: String,
    pub name: String,
    pub artist: String,
    pub pitch: Vec<PitchType>,
}

/// Summary numbers for `stats`.
#[derive(Debug, Default)]
pub struct LibraryStats {
    pub total_songs: usize,
    pub total_frames: usize,
    pub total_ranges: usize,
    pub unranged_songs: usize,
    pub lowest_pitch: Option<PitchType>,
    pub highest_pitch: Option<PitchType>,
}
