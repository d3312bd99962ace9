use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use humsearch::config::AppConfig;
use humsearch::db::Database;
use humsearch::db::flatfile;
use humsearch::db::models::{SongRecord, SongScore};
use humsearch::matching::KernelKind;
use humsearch::service::{SearchResponse, SearchService};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "humsearch", version, about = "Query-by-humming melody search")]
struct Cli {
    /// Path to the flat-text song database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the database with a pitch sequence or a hummed WAV file
    Search {
        /// Space-separated semitone values
        pitch: Vec<String>,

        /// Extract the query from this WAV file instead
        #[arg(long, conflicts_with = "pitch")]
        wav: Option<PathBuf>,

        /// DTW kernel (overrides config)
        #[arg(long, value_enum)]
        kernel: Option<KernelKind>,

        /// Number of results to print
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the pitch contour of a WAV file
    Extract {
        wav: PathBuf,

        /// Print the raw tracker output (-1 for unvoiced frames)
        #[arg(long)]
        raw: bool,
    },

    /// Extract every WAV under the given directories into a database file
    Build {
        /// Directories or files to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output file (defaults to the database path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Append one song to the database file
    Add {
        song_id: String,

        name: String,

        #[arg(long, default_value = "")]
        artist: String,

        /// Space-separated semitone values
        #[arg(long, required_unless_present = "wav")]
        pitch: Option<String>,

        /// Extract the song's pitch from this WAV file instead
        #[arg(long, conflicts_with = "pitch")]
        wav: Option<PathBuf>,
    },

    /// Show database statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let mut config = AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(humsearch::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    match cli.command {
        Commands::Search { pitch, wav, kernel, limit, json } => {
            if let Some(kernel) = kernel {
                config.search.kernel = kernel;
            }
            let db = load_database(&db_path, &config)?;
            let service = SearchService::new(db, config.tracker.clone());
            let response = match wav {
                Some(path) => service.search_wav(&path),
                None => service.search_text(&pitch.join(" ")),
            };

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&response).context("Failed to encode response")?
                );
            } else {
                print_response(&response, limit);
            }
            if response.is_error() {
                anyhow::bail!("Search failed: {}", response.reason);
            }
        }

        Commands::Extract { wav, raw } => {
            let contour = humsearch::tracker::extract_file(&wav, &config.tracker)
                .with_context(|| format!("Failed to extract pitch from {}", wav.display()))?;
            if raw {
                println!("{}", humsearch::pitch::format_raw_pitch(&contour));
            } else {
                let cleaned = humsearch::contour::clean(&contour, config.tracker.fold_octaves);
                println!("{}", humsearch::pitch::format_pitch(&cleaned));
            }
        }

        Commands::Build { paths, output, jobs } => {
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let output = output.unwrap_or_else(|| db_path.clone());

            let files = humsearch::scanner::discover(&paths);
            if files.is_empty() {
                anyhow::bail!("No WAV files found under the given paths");
            }
            let result = humsearch::analyzer::analyze_files(&files, &config.tracker, workers)
                .context("Analysis failed")?;
            flatfile::write_file(&output, &result.records)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Build complete: {} songs written to {}, {} silent, {} failed",
                result.analyzed,
                output.display(),
                result.silent,
                result.failed
            );
        }

        Commands::Add { song_id, name, artist, pitch, wav } => {
            if song_id.is_empty() {
                anyhow::bail!("songId must not be empty");
            }
            let pitch = match (pitch, wav) {
                (_, Some(path)) => humsearch::tracker::extract_contour(&path, &config.tracker)
                    .with_context(|| format!("Failed to extract pitch from {}", path.display()))?,
                (Some(text), None) => humsearch::pitch::parse_pitch(&text),
                (None, None) => Vec::new(),
            };
            if pitch.is_empty() {
                anyhow::bail!("Song {} has no pitch, not added", song_id);
            }
            let frames = pitch.len();
            let record = SongRecord {
                song_id,
                name,
                artist,
                pitch,
            };
            flatfile::append_to_file(&db_path, &record).context("Failed to append song")?;
            println!("Added song {} ({} frames) to {}", record.song_id, frames, db_path.display());
        }

        Commands::Stats => {
            let db = load_database(&db_path, &config)?;
            let stats = db.stats();
            println!("Library Statistics");
            println!("==================");
            println!("Total songs:      {}", stats.total_songs);
            println!("Total frames:     {}", stats.total_frames);
            println!("Search ranges:    {}", stats.total_ranges);
            println!("Unranged songs:   {}", stats.unranged_songs);
            if let (Some(lo), Some(hi)) = (stats.lowest_pitch, stats.highest_pitch) {
                println!("Pitch span:       {:.1} .. {:.1}", lo, hi);
            }
            println!("Kernel:           {}", db.search_config().kernel.label());
        }
    }

    Ok(())
}

fn load_database(path: &Path, config: &AppConfig) -> Result<Arc<Database>> {
    let db = Database::with_config(config.search.clone());
    db.load_file(path)
        .with_context(|| format!("Failed to load song database {}", path.display()))?;
    Ok(Arc::new(db))
}

/// Print a table of ranked songs.
fn print_response(response: &SearchResponse, limit: usize) {
    if response.is_error() {
        println!("Error: {}", response.reason);
        return;
    }
    println!("Query: {} frames", response.pitch.len());
    if !response.reason.is_empty() {
        println!("Timing: {}", response.reason);
    }
    println!();
    print_score_table(&response.songs[..response.songs.len().min(limit)]);
}

fn print_score_table(songs: &[SongScore]) {
    if songs.is_empty() {
        println!("No matches.");
        return;
    }
    println!(
        "{:>3}  {:<30} {:<20} {:>8} {:>12}",
        "#", "Song", "Artist", "Score", "Frames"
    );
    println!("{}", "-".repeat(78));

    for (rank, s) in songs.iter().enumerate() {
        println!(
            "{:>3}  {:<30} {:<20} {:>8.2} {:>12}",
            rank + 1,
            truncate(&s.name, 30),
            truncate(&s.artist, 20),
            s.score,
            format!("{}-{}", s.from, s.to),
        );
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}
