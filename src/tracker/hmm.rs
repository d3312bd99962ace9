//! Viterbi smoothing of pYIN candidates.
//!
//! States are pitch bins crossed with voicing: state `s` is bin `s / 2`,
//! voiced when `s` is even. Transitions are limited to a band of bins around
//! the source, so each row is stored as a contiguous run of destination
//! states starting at `row_start[s]`, with its weights in one shared arena.

use super::PitchCandidate;
use super::pyin::PyinConfig;

#[derive(Debug, Clone)]
pub struct HmmDecoder {
    fmin: f64,
    resolution: f64,
    n_bins: usize,
    /// First destination state of each row.
    row_start: Vec<usize>,
    /// Offset of each row's weights in `weights`; one extra trailing entry.
    row_offset: Vec<usize>,
    weights: Vec<f64>,
}

impl HmmDecoder {
    pub fn new(config: &PyinConfig) -> Self {
        let n_bins = config.n_bins();
        let n_states = n_bins * 2;
        // Largest pitch move per hop, in bins.
        let step = config.max_transition_rate * 12.0 * config.hop_length as f64
            / config.sample_rate as f64
            / config.resolution;
        let reach = step.max(0.0).floor() as usize;

        let mut row_start = Vec::with_capacity(n_states);
        let mut row_offset = Vec::with_capacity(n_states + 1);
        let mut weights = Vec::new();
        for state in 0..n_states {
            let bin = state / 2;
            let lo = bin.saturating_sub(reach);
            let hi = (bin + reach).min(n_bins - 1);
            let (stay, switch) = if state % 2 == 0 {
                (1.0 - config.switch_prob, config.switch_prob)
            } else {
                (config.switch_prob, 1.0 - config.switch_prob)
            };

            row_start.push(lo * 2);
            let offset = weights.len();
            row_offset.push(offset);
            for dest in lo..=hi {
                let taper = step - (dest as f64 - bin as f64).abs();
                weights.push(stay * taper);
                weights.push(switch * taper);
            }
            let row = &mut weights[offset..];
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                row.iter_mut().for_each(|w| *w /= sum);
            } else {
                let uniform = 1.0 / row.len() as f64;
                row.iter_mut().for_each(|w| *w = uniform);
            }
        }
        row_offset.push(weights.len());

        Self {
            fmin: config.fmin,
            resolution: config.resolution,
            n_bins,
            row_start,
            row_offset,
            weights,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn n_states(&self) -> usize {
        self.n_bins * 2
    }

    /// Transition weights out of `state`, and the first state they lead to.
    pub fn row(&self, state: usize) -> (usize, &[f64]) {
        let weights = &self.weights[self.row_offset[state]..self.row_offset[state + 1]];
        (self.row_start[state], weights)
    }

    /// Uniform start distribution.
    pub fn initial(&self) -> Vec<f64> {
        vec![1.0 / self.n_states() as f64; self.n_states()]
    }

    /// One max-product step. Returns the new normalized state probabilities
    /// and, per state, the predecessor it was reached from.
    pub fn forward(&self, candidates: &[PitchCandidate], prev: &[f64]) -> (Vec<f64>, Vec<usize>) {
        let n_states = self.n_states();
        let mut prob = vec![0.0; n_states];
        let mut back = vec![0usize; n_states];

        for (src, &p) in prev.iter().enumerate().take(n_states) {
            if p == 0.0 {
                continue;
            }
            let (start, row) = self.row(src);
            for (k, &w) in row.iter().enumerate() {
                let reach = p * w;
                if reach > prob[start + k] {
                    prob[start + k] = reach;
                    back[start + k] = src;
                }
            }
        }

        let nearest = self.nearest_candidates(candidates);
        let voiced_mass: f64 = nearest.iter().flatten().map(|&i| candidates[i].probability).sum();
        let unvoiced = (1.0 - voiced_mass) / self.n_bins as f64;
        for (state, p) in prob.iter_mut().enumerate() {
            let observed = if state % 2 == 0 {
                nearest[state / 2].map_or(0.0, |i| candidates[i].probability)
            } else {
                unvoiced
            };
            *p *= observed;
        }

        let sum: f64 = prob.iter().sum();
        if sum > 0.0 {
            prob.iter_mut().for_each(|p| *p /= sum);
        } else {
            let uniform = 1.0 / n_states as f64;
            prob.iter_mut().for_each(|p| *p = uniform);
            back.iter_mut().enumerate().for_each(|(i, b)| *b = i);
        }
        (prob, back)
    }

    /// Walk the backpointers from the most likely final state.
    ///
    /// Voiced frames report the candidate sitting in the decoded bin, or the
    /// candidate closest to any bin centre when the decoded bin has none.
    /// Unvoiced states, and frames without candidates, give `None`.
    pub fn backtrack(
        &self,
        frames: &[Vec<PitchCandidate>],
        backpointers: &[Vec<usize>],
        final_prob: &[f64],
    ) -> Vec<Option<PitchCandidate>> {
        let mut out = vec![None; frames.len()];
        let mut state = final_prob
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
            .0;

        for i in (0..frames.len()).rev() {
            let candidates = &frames[i];
            if state % 2 == 0 {
                let nearest = self.nearest_candidates(candidates);
                out[i] = nearest
                    .get(state / 2)
                    .copied()
                    .flatten()
                    .or_else(|| self.closest_to_bin_centre(candidates))
                    .map(|k| candidates[k]);
            }
            if let Some(&prev) = backpointers.get(i).and_then(|b| b.get(state)) {
                state = prev;
            }
        }
        out
    }

    /// Fractional bin of a frequency.
    fn bin_position(&self, frequency: f64) -> f64 {
        (frequency / self.fmin).log2() * 12.0 / self.resolution
    }

    /// For every bin, the candidate that quantizes into it with the least
    /// error.
    fn nearest_candidates(&self, candidates: &[PitchCandidate]) -> Vec<Option<usize>> {
        let mut nearest: Vec<Option<usize>> = vec![None; self.n_bins];
        let mut errors = vec![f64::INFINITY; self.n_bins];
        for (i, c) in candidates.iter().enumerate() {
            let pos = self.bin_position(c.frequency);
            let error = (pos - pos.round()).abs();
            let bin = (pos.round().max(0.0) as usize).min(self.n_bins - 1);
            if nearest[bin].is_none() || error < errors[bin] {
                nearest[bin] = Some(i);
                errors[bin] = error;
            }
        }
        nearest
    }

    fn closest_to_bin_centre(&self, candidates: &[PitchCandidate]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in candidates.iter().enumerate() {
            let pos = self.bin_position(c.frequency);
            let error = (pos - pos.round()).abs();
            if best.is_none_or(|(_, e)| error < e) {
                best = Some((i, error));
            }
        }
        best.map(|(i, _)| i)
    }
}
