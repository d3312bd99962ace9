//! Audio to pitch contour.
//!
//! [`extract_yin`] runs the single-candidate YIN estimator over fixed
//! frames. [`extract_pyin`] collects pYIN candidates per hop, decodes them
//! with the HMM and downsamples the result to a comparable frame rate.

pub mod decode;
pub mod hmm;
pub mod pyin;
pub mod yin;

use std::path::Path;

use rayon::prelude::*;
use thiserror::Error;

use crate::config::{TrackerConfig, TrackerMethod};
use crate::contour;
use crate::pitch::{PitchType, hz_to_pitch};
use crate::stats;
use hmm::HmmDecoder;
use pyin::{PyinConfig, PyinTracker};
use yin::YinTracker;

/// YIN analysis frame, in samples.
pub const YIN_FRAME: usize = 2048;
/// YIN hops this many times per second.
pub const YIN_HOPS_PER_SEC: u32 = 16;
/// pYIN frames decoded per output frame.
pub const PYIN_DOWNSAMPLE: usize = 5;

/// Lowest sample rate the trackers accept.
const MIN_SAMPLE_RATE: u32 = 4000;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Decode error: {0}")]
    Decode(#[from] decode::DecodeError),
    #[error("Sample rate {0} Hz is too low for pitch tracking")]
    SampleRate(u32),
}

/// One pitch hypothesis for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchCandidate {
    pub frequency: f64,
    pub probability: f64,
}

/// Cumulative mean normalized difference, in place. Index 0 becomes 1, and
/// so does any lag whose running sum is still zero.
pub(crate) fn cumulative_mean_normalize(d: &mut [f64]) {
    let Some(first) = d.first_mut() else {
        return;
    };
    *first = 1.0;
    let mut running = 0.0;
    for (tau, value) in d.iter_mut().enumerate().skip(1) {
        running += *value;
        *value = if running == 0.0 {
            1.0
        } else {
            *value * tau as f64 / running
        };
    }
}

/// Parabolic refinement of the lag at `tau`. At either end of the buffer
/// only one neighbour exists, so the lower of the two is taken as is.
pub(crate) fn refine_lag(d: &[f64], tau: usize) -> f64 {
    let at_start = tau < 1;
    let at_end = tau + 1 >= d.len();
    match (at_start, at_end) {
        (true, true) => tau as f64,
        (true, false) => {
            if d[tau] <= d[tau + 1] { tau as f64 } else { (tau + 1) as f64 }
        }
        (false, true) => {
            if d[tau] <= d[tau - 1] { tau as f64 } else { (tau - 1) as f64 }
        }
        (false, false) => {
            let (s0, s1, s2) = (d[tau - 1], d[tau], d[tau + 1]);
            let denom = 2.0 * (2.0 * s1 - s2 - s0);
            if denom == 0.0 {
                tau as f64
            } else {
                tau as f64 + (s2 - s0) / denom
            }
        }
    }
}

/// Start offsets of every complete frame.
fn frame_starts(len: usize, frame: usize, hop: usize) -> impl IndexedParallelIterator<Item = usize> {
    let count = if len >= frame { (len - frame) / hop + 1 } else { 0 };
    (0..count).into_par_iter().map(move |k| k * hop)
}

/// YIN contour: 2048-sample frames every `sample_rate / 16` samples. Frames
/// whose probability does not exceed `voicing_threshold` are unvoiced.
pub fn extract_yin(
    samples: &[f32],
    sample_rate: u32,
    threshold: f64,
    voicing_threshold: f64,
) -> Vec<Option<PitchType>> {
    let hop = ((sample_rate / YIN_HOPS_PER_SEC) as usize).max(1);
    let contour: Vec<Option<PitchType>> = frame_starts(samples.len(), YIN_FRAME, hop)
        .map_init(
            || YinTracker::new(sample_rate, threshold),
            |yin, start| {
                yin.estimate(&samples[start..start + YIN_FRAME])
                    .filter(|c| c.probability > voicing_threshold)
                    .and_then(|c| hz_to_pitch(c.frequency))
            },
        )
        .collect();
    log::debug!(
        "YIN: {} frames, {} voiced",
        contour.len(),
        contour.iter().flatten().count()
    );
    contour
}

/// pYIN contour: candidates per hop (in parallel), one HMM pass over all
/// frames, then the median of each run of [`PYIN_DOWNSAMPLE`] frames.
pub fn extract_pyin(samples: &[f32], sample_rate: u32) -> Vec<Option<PitchType>> {
    let config = PyinConfig::new(sample_rate);
    let (frame, hop) = (config.frame_length, config.hop_length);

    let frames: Vec<Vec<PitchCandidate>> = frame_starts(samples.len(), frame, hop)
        .map_init(
            || PyinTracker::new(config.clone()),
            |tracker, start| tracker.find_candidates(&samples[start..start + frame]),
        )
        .collect();

    let decoder = HmmDecoder::new(&config);
    let mut prob = decoder.initial();
    let mut backpointers = Vec::with_capacity(frames.len());
    for candidates in &frames {
        let (next, back) = decoder.forward(candidates, &prob);
        prob = next;
        backpointers.push(back);
    }
    let decoded: Vec<Option<PitchType>> = decoder
        .backtrack(&frames, &backpointers, &prob)
        .into_iter()
        .map(|c| c.and_then(|c| hz_to_pitch(c.frequency)))
        .collect();
    log::debug!(
        "pYIN: {} frames, {} voiced",
        decoded.len(),
        decoded.iter().flatten().count()
    );
    downsample_median(&decoded, PYIN_DOWNSAMPLE)
}

/// Median of each run of `run` frames. A run is voiced only when more than
/// half of its frames are; its value is the median of the voiced ones.
pub fn downsample_median(frames: &[Option<PitchType>], run: usize) -> Vec<Option<PitchType>> {
    frames
        .chunks(run.max(1))
        .map(|chunk| {
            let voiced: Vec<PitchType> = chunk.iter().flatten().copied().collect();
            if voiced.len() * 2 > chunk.len() {
                stats::median(&voiced)
            } else {
                None
            }
        })
        .collect()
}

/// Raw contour of decoded audio with the configured tracker.
pub fn extract_samples(
    samples: &[f32],
    sample_rate: u32,
    config: &TrackerConfig,
) -> Result<Vec<Option<PitchType>>, TrackerError> {
    if sample_rate < MIN_SAMPLE_RATE {
        return Err(TrackerError::SampleRate(sample_rate));
    }
    Ok(match config.method {
        TrackerMethod::Yin => extract_yin(
            samples,
            sample_rate,
            config.yin_threshold,
            config.voicing_threshold,
        ),
        TrackerMethod::Pyin => extract_pyin(samples, sample_rate),
    })
}

/// Raw contour of a WAV file.
pub fn extract_file(path: &Path, config: &TrackerConfig) -> Result<Vec<Option<PitchType>>, TrackerError> {
    let audio = decode::load_wav(path)?;
    log::debug!(
        "Decoded {}: {:.1}s at {} Hz",
        path.display(),
        audio.duration_secs(),
        audio.sample_rate
    );
    extract_samples(&audio.samples, audio.sample_rate, config)
}

/// Cleaned contour of a WAV file, ready to search or index. Empty when the
/// recording has no voiced frame.
pub fn extract_contour(path: &Path, config: &TrackerConfig) -> Result<Vec<PitchType>, TrackerError> {
    let raw = extract_file(path, config)?;
    Ok(contour::clean(&raw, config.fold_octaves))
}
