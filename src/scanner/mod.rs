use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::SUPPORTED_EXTENSIONS;

/// An audio file found on disk, with the record fields derived from its path.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    pub path: PathBuf,
    /// Path relative to the scanned root, without extension.
    pub song_id: String,
    /// File stem with underscores turned into spaces.
    pub name: String,
    /// Name of the containing directory, empty at the scan root.
    pub artist: String,
}

/// Walk directories (or take single files) and collect supported audio
/// files, sorted by path.
pub fn discover(paths: &[PathBuf]) -> Vec<AudioFile> {
    let mut files = Vec::new();
    for root in paths {
        for entry in WalkDir::new(root).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !is_supported(entry.path()) {
                continue;
            }
            let base = if root.is_file() {
                root.parent().unwrap_or(Path::new(""))
            } else {
                root.as_path()
            };
            files.push(describe(base, entry.path()));
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);
    log::info!("Found {} audio files", files.len());
    files
}

fn is_supported(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

fn describe(base: &Path, path: &Path) -> AudioFile {
    let relative = path.strip_prefix(base).unwrap_or(path).with_extension("");
    let song_id = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_default();
    let artist = relative
        .parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    AudioFile {
        path: path.to_path_buf(),
        song_id,
        name,
        artist,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let file = describe(Path::new("/music"), Path::new("/music/folk/little_bee.wav"));
        assert_eq!(file.song_id, "folk/little_bee");
        assert_eq!(file.name, "little bee");
        assert_eq!(file.artist, "folk");

        let top = describe(Path::new("/music"), Path::new("/music/hum.WAV"));
        assert_eq!(top.song_id, "hum");
        assert_eq!(top.artist, "");
    }

    #[test]
    fn test_discover_filters_extensions() {
        let root = std::env::temp_dir().join(format!("humsearch_scan_{}", std::process::id()));
        std::fs::create_dir_all(root.join("band")).unwrap();
        std::fs::write(root.join("band/b.wav"), b"").unwrap();
        std::fs::write(root.join("a.WAV"), b"").unwrap();
        std::fs::write(root.join("notes.txt"), b"").unwrap();

        let files = discover(&[root.clone()]);
        std::fs::remove_dir_all(&root).ok();

        let ids: Vec<&str> = files.iter().map(|f| f.song_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "band/b"]);
        assert_eq!(files[1].artist, "band");
    }

    #[test]
    fn test_missing_directory_is_empty() {
        assert!(discover(&[PathBuf::from("/nonexistent/humsearch")]).is_empty());
    }
}
