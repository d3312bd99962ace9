//! Single-candidate YIN pitch estimator.

use super::{PitchCandidate, cumulative_mean_normalize, refine_lag};

/// Default absolute threshold on the normalized difference.
pub const DEFAULT_THRESHOLD: f64 = 0.15;

/// YIN estimator. Owns its difference buffer, so keep one per thread.
#[derive(Debug, Clone)]
pub struct YinTracker {
    sample_rate: f64,
    threshold: f64,
    diff: Vec<f64>,
}

impl YinTracker {
    pub fn new(sample_rate: u32, threshold: f64) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            threshold,
            diff: Vec::new(),
        }
    }

    /// Estimate the fundamental of one frame. Lags cover the first half of
    /// the frame. `None` means no lag fell under the threshold.
    pub fn estimate(&mut self, frame: &[f32]) -> Option<PitchCandidate> {
        let half = frame.len() / 2;
        if half < 3 {
            return None;
        }
        self.difference(frame, half);
        cumulative_mean_normalize(&mut self.diff);
        let tau = self.absolute_threshold()?;
        let lag = refine_lag(&self.diff, tau);
        if !(lag > 0.0) {
            return None;
        }
        Some(PitchCandidate {
            frequency: self.sample_rate / lag,
            probability: 1.0 - self.diff[tau],
        })
    }

    fn difference(&mut self, frame: &[f32], half: usize) {
        self.diff.clear();
        self.diff.extend((0..half).map(|tau| {
            frame[..half]
                .iter()
                .zip(&frame[tau..tau + half])
                .map(|(&a, &b)| {
                    let delta = a as f64 - b as f64;
                    delta * delta
                })
                .sum::<f64>()
        }));
    }

    /// First lag from 2 under the threshold, followed down to its local
    /// minimum.
    fn absolute_threshold(&self) -> Option<usize> {
        let d = &self.diff;
        let mut tau = (2..d.len()).find(|&t| d[t] < self.threshold)?;
        while tau + 1 < d.len() && d[tau + 1] < d[tau] {
            tau += 1;
        }
        Some(tau)
    }
}
