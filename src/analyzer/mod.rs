use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::TrackerConfig;
use crate::db::models::SongRecord;
use crate::scanner::AudioFile;
use crate::tracker::{self, TrackerError};

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

pub struct AnalyzeResult {
    /// One record per file with a usable contour, in input order.
    pub records: Vec<SongRecord>,
    pub analyzed: u64,
    /// Decoded fine but had no voiced frame.
    pub silent: u64,
    pub failed: u64,
}

/// Extract the pitch contour of every file in parallel.
///
/// Files that fail to decode, or that contain no pitch, are counted and
/// skipped; they never abort the batch.
pub fn analyze_files(
    files: &[AudioFile],
    tracker_config: &TrackerConfig,
    jobs: usize,
) -> std::result::Result<AnalyzeResult, AnalyzeError> {
    if files.is_empty() {
        log::info!("No audio files to analyze");
        return Ok(AnalyzeResult {
            records: Vec::new(),
            analyzed: 0,
            silent: 0,
            failed: 0,
        });
    }

    log::info!("Analyzing {} files with {} workers", files.len(), jobs);

    let pb = ProgressBar::new(files.len() as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let results: Vec<Result<SongRecord, TrackerError>> = pool.install(|| {
        files
            .par_iter()
            .map(|file| {
                let result = tracker::extract_contour(&file.path, tracker_config).map(|pitch| SongRecord {
                    song_id: file.song_id.clone(),
                    name: file.name.clone(),
                    artist: file.artist.clone(),
                    pitch,
                });
                pb.inc(1);
                result
            })
            .collect()
    });

    let mut records = Vec::with_capacity(results.len());
    let (mut analyzed, mut silent, mut failed) = (0u64, 0u64, 0u64);
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(record) if record.pitch.is_empty() => {
                log::warn!("No pitch found in {}", file.path.display());
                silent += 1;
            }
            Ok(record) => {
                records.push(record);
                analyzed += 1;
            }
            Err(e) => {
                log::warn!("Analysis failed for {}: {}", file.path.display(), e);
                failed += 1;
            }
        }
    }

    pb.finish_with_message(format!(
        "Done: {} analyzed, {} silent, {} failed",
        analyzed, silent, failed
    ));

    Ok(AnalyzeResult {
        records,
        analyzed,
        silent,
        failed,
    })
}
