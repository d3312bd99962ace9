pub mod flatfile;
pub mod index;
pub mod models;
pub mod search;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::SearchConfig;
use crate::stats;
use models::{LibraryStats, Song, SongRecord};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, DbError>;

/// In-memory song collection.
///
/// Searches take the read lock only long enough to snapshot the song
/// handles; adds and removals take the write lock. Songs are immutable and
/// replaced whole.
pub struct Database {
    songs: RwLock<HashMap<String, Arc<Song>>>,
    search: SearchConfig,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        Self::with_config(SearchConfig::default())
    }

    pub fn with_config(search: SearchConfig) -> Self {
        Self {
            songs: RwLock::new(HashMap::new()),
            search,
        }
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// Insert or replace a song. A song without pitch is never stored: any
    /// existing entry under `id` is removed instead. Returns whether the
    /// song was stored.
    pub fn add_song(&self, id: &str, song: Song) -> bool {
        let mut songs = self.songs.write();
        insert_or_remove(&mut songs, id, song)
    }

    pub fn remove_song(&self, id: &str) -> bool {
        self.songs.write().remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Song>> {
        self.songs.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.songs.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.songs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.read().is_empty()
    }

    /// Song ids, sorted.
    pub fn song_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.songs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Index records in parallel, then store them under one write lock.
    /// Later records replace earlier ones with the same id.
    /// Returns the number of records stored.
    pub fn load_records(&self, records: Vec<SongRecord>) -> usize {
        let built: Vec<(String, Song)> = records
            .into_par_iter()
            .map(|r| {
                let song = Song::build(r.pitch, r.name, r.artist);
                (r.song_id, song)
            })
            .collect();

        let mut songs = self.songs.write();
        let mut stored = 0;
        for (id, song) in built {
            if insert_or_remove(&mut songs, &id, song) {
                stored += 1;
            } else {
                log::warn!("Song {} has no pitch, not stored", id);
            }
        }
        stored
    }

    /// Load a flat-text database file.
    pub fn load_file(&self, path: &Path) -> Result<usize> {
        let records = flatfile::read_file(path)?;
        let total = records.len();
        let stored = self.load_records(records);
        log::info!("Loaded {} of {} songs from {}", stored, total, path.display());
        Ok(stored)
    }

    pub fn stats(&self) -> LibraryStats {
        let songs = self.songs.read();
        let mut stats = LibraryStats {
            total_songs: songs.len(),
            ..Default::default()
        };
        for song in songs.values() {
            stats.total_frames += song.pitch.len();
            stats.total_ranges += song.ranges.len();
            if song.ranges.is_empty() {
                stats.unranged_songs += 1;
            }
            if let Some((lo, hi)) = stats::min_max(&song.pitch) {
                stats.lowest_pitch = Some(stats.lowest_pitch.map_or(lo, |v| v.min(lo)));
                stats.highest_pitch = Some(stats.highest_pitch.map_or(hi, |v| v.max(hi)));
            }
        }
        stats
    }

    /// Snapshot of all songs, for searching outside the lock.
    fn snapshot(&self) -> Vec<(String, Arc<Song>)> {
        self.songs
            .read()
            .iter()
            .map(|(id, song)| (id.clone(), Arc::clone(song)))
            .collect()
    }
}

fn insert_or_remove(songs: &mut HashMap<String, Arc<Song>>, id: &str, song: Song) -> bool {
    if song.pitch.is_empty() {
        songs.remove(id);
        false
    } else {
        songs.insert(id.to_string(), Arc::new(song));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let db = Database::new();
        assert!(db.add_song("1", Song::build(vec![1.0, 2.0, 3.0], "1", "")));
        assert!(db.contains("1"));
        assert_eq!(db.get("1").unwrap().pitch, vec![1.0, 2.0, 3.0]);
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_empty_song_never_stored() {
        let db = Database::new();
        assert!(!db.add_song("x", Song::build(Vec::new(), "empty", "")));
        assert!(db.get("x").is_none());
        assert!(db.is_empty());
    }

    #[test]
    fn test_empty_song_removes_existing() {
        let db = Database::new();
        db.add_song("x", Song::build(vec![60.0, 61.0], "real", ""));
        db.add_song("x", Song::build(Vec::new(), "empty", ""));
        assert!(db.get("x").is_none());
    }

    #[test]
    fn test_replace_is_whole_song() {
        let db = Database::new();
        db.add_song("x", Song::build(vec![60.0], "old", ""));
        let before = db.get("x").unwrap();
        db.add_song("x", Song::build(vec![70.0, 71.0], "new", ""));
        // A reader holding the old handle still sees the old song intact.
        assert_eq!(before.name, "old");
        assert_eq!(db.get("x").unwrap().name, "new");
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_remove() {
        let db = Database::new();
        db.add_song("a", Song::build(vec![60.0], "a", ""));
        assert!(db.remove_song("a"));
        assert!(!db.remove_song("a"));
    }

    #[test]
    fn test_load_records_skips_empty() {
        let db = Database::new();
        let text = "1\nA\nX\n60 61 62\n2\nB\nY\nnot numbers\n3\nC\nZ\n50\n";
        let stored = db.load_records(flatfile::parse_records(text));
        assert_eq!(stored, 2);
        assert_eq!(db.song_ids(), vec!["1".to_string(), "3".to_string()]);
        assert_eq!(db.get("1").unwrap().artist, "X");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let db = Database::new();
        assert!(db.load_file(Path::new("/nonexistent/songs.txt")).is_err());
    }

    #[test]
    fn test_stats() {
        let db = Database::new();
        db.add_song("a", Song::build(vec![60.0; 100], "a", ""));
        db.add_song("b", Song::build(vec![50.0, 70.0], "b", ""));
        let stats = db.stats();
        assert_eq!(stats.total_songs, 2);
        assert_eq!(stats.total_frames, 102);
        assert_eq!(stats.unranged_songs, 1);
        assert_eq!(stats.total_ranges, 3);
        assert_eq!(stats.lowest_pitch, Some(50.0));
        assert_eq!(stats.highest_pitch, Some(70.0));
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let db = Arc::new(Database::new());
        for i in 0..20 {
            db.add_song(&i.to_string(), Song::build(vec![60.0 + i as f32; 90], format!("s{}", i), ""));
        }
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    for k in 0..10 {
                        if t == 0 {
                            db.add_song(&format!("new{}", k), Song::build(vec![65.0; 90], "n", ""));
                        } else {
                            let out = db.search(&[62.0, 62.0, 62.0]);
                            assert!(!out.songs.is_empty());
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(db.len(), 30);
    }
}
