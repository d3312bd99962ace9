use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::matching::KernelKind;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Custom song database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Number of parallel workers. 0 = auto-detect (all cores).
    pub workers: usize,
    /// Ranking and kernel settings.
    pub search: SearchConfig,
    /// Pitch extraction settings.
    pub tracker: TrackerConfig,
}

/// Search tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// DTW kernel used for ranking.
    pub kernel: KernelKind,
    /// Never return more than this many songs.
    pub max_results: usize,
    /// Stop once a score exceeds `mean_ratio × mean` ...
    pub mean_ratio: f64,
    /// ... and also exceeds this absolute floor.
    pub score_floor: f64,
    /// Stop once a score exceeds `best_ratio ×` the best score.
    pub best_ratio: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            kernel: KernelKind::default(),
            max_results: 100,
            mean_ratio: 0.8,
            score_floor: 70.0,
            best_ratio: 2.0,
        }
    }
}

/// Which pitch tracker turns audio into a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerMethod {
    #[default]
    Yin,
    Pyin,
}

/// Pitch extraction settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub method: TrackerMethod,
    /// YIN absolute threshold on the normalized difference.
    pub yin_threshold: f64,
    /// YIN frames below this voicing probability count as unvoiced.
    pub voicing_threshold: f64,
    /// Fold values an octave or more away from the contour median back in.
    pub fold_octaves: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            method: TrackerMethod::default(),
            yin_threshold: 0.15,
            voicing_threshold: 0.5,
            fold_octaves: true,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/humsearch/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve worker count: 0 → all available cores.
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default song database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        dirs.data_dir().join("songs.txt")
    } else {
        // Fallback: current directory
        PathBuf::from("songs.txt")
    }
}
