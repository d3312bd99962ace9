pub mod analyzer;
pub mod config;
pub mod contour;
pub mod db;
pub mod matching;
pub mod pitch;
pub mod scanner;
pub mod service;
pub mod stats;
pub mod tracker;

/// Audio file extensions we support
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav"];

/// Application name for XDG paths
pub const APP_NAME: &str = "humsearch";
