//! Small numeric helpers shared by the tracker, the index and the search.
//! All of them are defined on empty input.

use crate::pitch::PitchType;

/// Median of a pitch slice. Even-length input averages the two middle values.
/// Returns `None` for an empty slice.
pub fn median(values: &[PitchType]) -> Option<PitchType> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Mean and population standard deviation. `(0.0, 0.0)` for empty input.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Minimum and maximum of a slice, ignoring NaN. `None` for empty input.
pub fn min_max(values: &[PitchType]) -> Option<(PitchType, PitchType)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
