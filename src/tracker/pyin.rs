//! Probabilistic YIN: every dip of the normalized difference becomes a
//! candidate, weighted by how much of a Beta prior over thresholds it claims.
//! [`super::hmm::HmmDecoder`] picks one candidate per frame afterwards.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::{PitchCandidate, cumulative_mean_normalize, refine_lag};

/// pYIN and HMM parameters.
#[derive(Debug, Clone)]
pub struct PyinConfig {
    pub fmin: f64,
    pub fmax: f64,
    pub sample_rate: u32,
    pub frame_length: usize,
    pub hop_length: usize,
    pub n_thresholds: usize,
    pub beta_alpha: f64,
    pub beta_beta: f64,
    /// Pitch bin width in semitones.
    pub resolution: f64,
    /// Octaves per second.
    pub max_transition_rate: f64,
    pub switch_prob: f64,
    pub no_trough_prob: f64,
}

impl PyinConfig {
    /// Defaults for `sample_rate`: frames of the smallest power of two
    /// covering 1/30 s, hops of 1/100 s.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            fmin: 55.0,
            fmax: 1047.0,
            sample_rate,
            frame_length: (sample_rate.div_ceil(30) as usize).next_power_of_two(),
            hop_length: ((sample_rate / 100) as usize).max(1),
            n_thresholds: 100,
            beta_alpha: 2.0,
            beta_beta: 11.0 + 1.0 / 3.0,
            resolution: 0.1,
            max_transition_rate: 35.92,
            switch_prob: 0.01,
            no_trough_prob: 0.01,
        }
    }

    /// Number of pitch bins between `fmin` and `fmax`.
    pub fn n_bins(&self) -> usize {
        (12.0 * (self.fmax / self.fmin).log2() / self.resolution).floor() as usize + 1
    }

    /// Normalized Beta prior over thresholds `1/n, 2/n, ..., 1`.
    fn threshold_prior(&self) -> Vec<f64> {
        let n = self.n_thresholds as f64;
        let mut prior: Vec<f64> = (1..=self.n_thresholds)
            .map(|k| {
                let x = k as f64 / n;
                x.powf(self.beta_alpha - 1.0) * (1.0 - x).powf(self.beta_beta - 1.0)
            })
            .collect();
        let sum: f64 = prior.iter().sum();
        if sum > 0.0 {
            prior.iter_mut().for_each(|p| *p /= sum);
        }
        prior
    }
}

/// Per-frame candidate finder. Holds FFT plans and buffers; one per thread.
pub struct PyinTracker {
    config: PyinConfig,
    prior: Vec<f64>,
    planner: FftPlanner<f64>,
    plans: Option<(usize, Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>)>,
    spectrum: Vec<Complex<f64>>,
    energy: Vec<f64>,
    diff: Vec<f64>,
}

impl PyinTracker {
    pub fn new(config: PyinConfig) -> Self {
        let prior = config.threshold_prior();
        Self {
            config,
            prior,
            planner: FftPlanner::new(),
            plans: None,
            spectrum: Vec::new(),
            energy: Vec::new(),
            diff: Vec::new(),
        }
    }

    /// Pitch candidates of one frame, most probable first. Empty when the
    /// normalized difference has no dip in the searched lag range.
    pub fn find_candidates(&mut self, frame: &[f32]) -> Vec<PitchCandidate> {
        if frame.len() < 4 {
            return Vec::new();
        }
        self.difference(frame);
        cumulative_mean_normalize(&mut self.diff);
        self.find_dips()
    }

    /// `d(τ) = Σ_{i<n-τ} x_i² + Σ_{i>=τ} x_i² - 2 r(τ)`, with the
    /// autocorrelation `r` taken through a zero-padded FFT.
    fn difference(&mut self, frame: &[f32]) {
        let n = frame.len();
        let size = n * 2;
        let (forward, inverse) = self.plans_for(size);

        self.spectrum.clear();
        self.spectrum.extend(frame.iter().map(|&x| Complex::new(x as f64, 0.0)));
        self.spectrum.resize(size, Complex::new(0.0, 0.0));
        forward.process(&mut self.spectrum);
        for c in self.spectrum.iter_mut() {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        inverse.process(&mut self.spectrum);

        // energy[k] = Σ_{i<k} x_i²
        self.energy.clear();
        self.energy.push(0.0);
        let mut acc = 0.0;
        for &x in frame {
            acc += x as f64 * x as f64;
            self.energy.push(acc);
        }

        let scale = 1.0 / size as f64;
        let total = self.energy[n];
        self.diff.clear();
        self.diff.extend((0..n).map(|tau| {
            let r = self.spectrum[tau].re * scale;
            self.energy[n - tau] + (total - self.energy[tau]) - 2.0 * r
        }));
    }

    fn plans_for(&mut self, size: usize) -> (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>) {
        if let Some((planned, forward, inverse)) = &self.plans {
            if *planned == size {
                return (Arc::clone(forward), Arc::clone(inverse));
            }
        }
        let forward = self.planner.plan_fft_forward(size);
        let inverse = self.planner.plan_fft_inverse(size);
        self.plans = Some((size, Arc::clone(&forward), Arc::clone(&inverse)));
        (forward, inverse)
    }

    fn find_dips(&self) -> Vec<PitchCandidate> {
        let d = &self.diff;
        let sr = self.config.sample_rate as f64;
        let min_period = ((sr / self.config.fmax) as usize).max(2);
        let max_period = ((sr / self.config.fmin) as usize + 1).min(d.len() - 1);

        let n = self.config.n_thresholds;
        // Thresholds above this index are already claimed.
        let mut unclaimed = n;
        let mut dips: Vec<PitchCandidate> = Vec::new();
        let mut deepest: Option<(usize, f64)> = None;

        for tau in min_period..max_period {
            let value = d[tau];
            if !(value < d[tau - 1] && value <= d[tau + 1]) {
                continue;
            }
            let mut probability = 0.0;
            while unclaimed > 0 && value < unclaimed as f64 / n as f64 {
                probability += self.prior[unclaimed - 1];
                unclaimed -= 1;
            }
            if deepest.is_none_or(|(_, v)| value < v) {
                deepest = Some((dips.len(), value));
            }
            dips.push(PitchCandidate {
                frequency: sr / refine_lag(d, tau),
                probability,
            });
        }

        let Some((deepest, _)) = deepest else {
            return Vec::new();
        };
        let residual: f64 = self.prior[..unclaimed].iter().sum::<f64>() * self.config.no_trough_prob;
        dips[deepest].probability += residual;

        dips.retain(|c| c.probability > 0.0 && c.frequency.is_finite());
        dips.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        dips
    }
}
