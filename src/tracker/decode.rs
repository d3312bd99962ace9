use std::io::Read;
use std::path::Path;

use hound::{SampleFormat, WavReader};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),
    #[error("WAV file has no samples")]
    Empty,
}

/// Decoded audio: mono samples in [-1, 1] and their sample rate.
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Load a PCM WAV file and average its channels to mono.
pub fn load_wav(path: &Path) -> Result<MonoAudio, DecodeError> {
    let reader = WavReader::open(path)?;
    read_mono(reader)
}

/// Decode WAV data from any reader.
pub fn read_mono<R: Read>(mut reader: WavReader<R>) -> Result<MonoAudio, DecodeError> {
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };
    if interleaved.is_empty() {
        return Err(DecodeError::Empty);
    }

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(MonoAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}
