//! Request-shaped operations over a shared [`Database`].
//!
//! Every operation answers with a [`SearchResponse`]; user-facing failures
//! are reported in it, not raised.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::config::TrackerConfig;
use crate::db::Database;
use crate::db::models::{Song, SongScore};
use crate::pitch::{PitchType, parse_pitch};
use crate::tracker;

pub const PROGRESS_DONE: &str = "100";
pub const PROGRESS_ERROR: &str = "error";

const EMPTY_PITCH: &str = "pitch must not be empty";
const EMPTY_FILE: &str = "file must not be empty";
const NO_PITCH: &str = "Cannot analyze pitch. Maybe it is silent or full of noise.";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("songId must not be empty")]
    EmptySongId,
}

/// Result of a search request.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// `"100"` on success, `"error"` otherwise.
    pub progress: String,
    /// The query that was searched.
    pub pitch: Vec<PitchType>,
    pub songs: Vec<SongScore>,
    pub reason: String,
}

impl SearchResponse {
    fn done(pitch: Vec<PitchType>, songs: Vec<SongScore>, reason: String) -> Self {
        Self {
            progress: PROGRESS_DONE.to_string(),
            pitch,
            songs,
            reason,
        }
    }

    fn error(reason: impl Into<String>) -> Self {
        Self {
            progress: PROGRESS_ERROR.to_string(),
            pitch: Vec::new(),
            songs: Vec::new(),
            reason: reason.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.progress == PROGRESS_ERROR
    }
}

pub struct SearchService {
    db: Arc<Database>,
    tracker: TrackerConfig,
}

impl SearchService {
    pub fn new(db: Arc<Database>, tracker: TrackerConfig) -> Self {
        Self { db, tracker }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Index and store a song from its pitch text. Returns whether it was
    /// stored; a song without pitch removes any previous entry instead.
    pub fn add(
        &self,
        song_id: &str,
        name: &str,
        artist: &str,
        pitch_text: &str,
    ) -> Result<bool, ServiceError> {
        if song_id.is_empty() {
            return Err(ServiceError::EmptySongId);
        }
        let song = Song::build(parse_pitch(pitch_text), name, artist);
        let stored = self.db.add_song(song_id, song);
        log::info!("Added song {} name {}", song_id, name);
        Ok(stored)
    }

    /// Search a space-separated pitch query.
    pub fn search_text(&self, pitch_text: &str) -> SearchResponse {
        self.search_pitch(parse_pitch(pitch_text))
    }

    pub fn search_pitch(&self, pitch: Vec<PitchType>) -> SearchResponse {
        if pitch.is_empty() {
            return SearchResponse::error(EMPTY_PITCH);
        }
        let outcome = self.db.search(&pitch);
        log::info!("Search with {} frames: {} results", pitch.len(), outcome.songs.len());
        SearchResponse::done(pitch, outcome.songs, String::new())
    }

    /// Extract a hummed query from a WAV file and search it. The reason
    /// field carries the extraction and search timings.
    pub fn search_wav(&self, path: &Path) -> SearchResponse {
        if path.as_os_str().is_empty() {
            return SearchResponse::error(EMPTY_FILE);
        }
        let started = Instant::now();
        let pitch = match tracker::extract_contour(path, &self.tracker) {
            Ok(pitch) => pitch,
            Err(e) => {
                log::warn!("Failed to extract pitch from {}: {}", path.display(), e);
                return SearchResponse::error(e.to_string());
            }
        };
        if pitch.is_empty() {
            return SearchResponse::error(NO_PITCH);
        }
        let extracted = Instant::now();
        let outcome = self.db.search(&pitch);
        let searched = Instant::now();

        let reason = format!(
            "pitch {}ms search {}ms",
            extracted.duration_since(started).as_millis(),
            searched.duration_since(extracted).as_millis()
        );
        log::info!("Search local file {}: {}", path.display(), reason);
        SearchResponse::done(pitch, outcome.songs, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn service() -> SearchService {
        let db = Arc::new(Database::new());
        let service = SearchService::new(db, TrackerConfig::default());
        service.add("1", "Rising", "A", "60 62 64 65 67").unwrap();
        service.add("2", "Falling", "B", "67 65 64 62 60").unwrap();
        service
    }

    fn write_wav(name: &str, samples: &[f32]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("humsearch_{}_{}.wav", name, std::process::id()));
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_search_text() {
        let service = service();
        let response = service.search_text("61 63 65 66 68");
        assert!(!response.is_error());
        assert_eq!(response.progress, "100");
        assert_eq!(response.pitch, vec![61.0, 63.0, 65.0, 66.0, 68.0]);
        assert_eq!(response.songs[0].song_id, "1");
        assert_eq!(response.songs[0].score, 0.0);
    }

    #[test]
    fn test_unvoiced_tokens_never_searched() {
        let service = service();
        let response = service.search_text("60 -1 62 -1 64");
        assert!(!response.is_error());
        assert_eq!(response.pitch, vec![60.0, 62.0, 64.0]);

        assert!(service.add("3", "Raw", "C", "-1 -1 61 -1 63").unwrap());
        assert_eq!(service.database().get("3").unwrap().pitch, vec![61.0, 63.0]);
        assert!(service.search_text("-1 -1").is_error());
    }

    #[test]
    fn test_empty_pitch_is_error() {
        let service = service();
        let response = service.search_text("  not numbers ");
        assert!(response.is_error());
        assert_eq!(response.reason, "pitch must not be empty");
        assert!(response.songs.is_empty());
    }

    #[test]
    fn test_add_requires_id() {
        let service = service();
        assert!(matches!(service.add("", "x", "y", "60"), Err(ServiceError::EmptySongId)));
    }

    #[test]
    fn test_add_empty_pitch_removes() {
        let service = service();
        assert!(!service.add("1", "Rising", "A", "").unwrap());
        assert!(service.database().get("1").is_none());
        assert_eq!(service.database().len(), 1);
    }

    #[test]
    fn test_response_json_shape() {
        let service = service();
        let json = serde_json::to_value(service.search_text("60 62 64 65 67")).unwrap();
        assert_eq!(json["progress"], "100");
        let first = &json["songs"][0];
        assert_eq!(first["songId"], "1");
        assert_eq!(first["name"], "Rising");
        assert_eq!(first["artist"], "A");
        assert_eq!(first["from"], 0);
        assert_eq!(first["to"], 5);
    }

    #[test]
    fn test_search_wav_missing_file() {
        let service = service();
        let response = service.search_wav(Path::new("/nonexistent/hum.wav"));
        assert!(response.is_error());
        assert!(response.reason.contains("WAV"));
        assert!(service.search_wav(Path::new("")).is_error());
    }

    #[test]
    fn test_search_wav_silence() {
        let service = service();
        let path = write_wav("silence", &vec![0.0; 16000]);
        let response = service.search_wav(&path);
        std::fs::remove_file(&path).ok();
        assert!(response.is_error());
        assert_eq!(response.reason, NO_PITCH);
    }

    #[test]
    fn test_search_wav_tone() {
        let service = service();
        let samples: Vec<f32> = (0..32000)
            .map(|i| (2.0 * std::f32::consts::PI * 261.63 * i as f32 / 16000.0).sin() * 0.5)
            .collect();
        let path = write_wav("tone", &samples);
        let response = service.search_wav(&path);
        std::fs::remove_file(&path).ok();
        assert!(!response.is_error(), "{}", response.reason);
        assert!(response.pitch.iter().all(|&p| (p - 60.0).abs() <= 0.1));
        assert!(response.reason.starts_with("pitch "));
        assert!(!response.songs.is_empty());
    }
}
