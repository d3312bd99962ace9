//! Turn a raw tracker contour into a searchable pitch sequence.

use crate::pitch::PitchType;
use crate::stats;

const OCTAVE: PitchType = 12.0;

/// Clean a raw contour:
///
/// 1. drop unvoiced frames at both ends (all unvoiced gives an empty result),
/// 2. fill inner gaps with the last voiced value,
/// 3. optionally fold values an octave or more from the median back toward it,
/// 4. smooth with a three-point filter that runs left to right in place, so
///    each frame sees its already-smoothed predecessor.
pub fn clean(raw: &[Option<PitchType>], fold_octaves: bool) -> Vec<PitchType> {
    let Some(start) = raw.iter().position(Option::is_some) else {
        return Vec::new();
    };
    let end = raw.iter().rposition(Option::is_some).map_or(start, |e| e + 1);

    let mut last = 0.0;
    let mut pitch: Vec<PitchType> = raw[start..end]
        .iter()
        .map(|p| {
            if let Some(v) = *p {
                last = v;
            }
            last
        })
        .collect();

    if fold_octaves {
        fold_to_median(&mut pitch);
    }
    smooth(&mut pitch);
    pitch
}

fn fold_to_median(pitch: &mut [PitchType]) {
    let Some(median) = stats::median(pitch) else {
        return;
    };
    for v in pitch.iter_mut() {
        let offset = *v - median;
        if offset.abs() >= OCTAVE {
            *v = median + offset % OCTAVE;
        }
    }
}

fn smooth(pitch: &mut [PitchType]) {
    for i in 1..pitch.len().saturating_sub(1) {
        let (hi, lo) = if pitch[i - 1] < pitch[i] {
            (pitch[i], pitch[i - 1])
        } else {
            (pitch[i - 1], pitch[i])
        };
        let next = pitch[i + 1];
        pitch[i] = if next > hi {
            hi
        } else if next > lo {
            next
        } else {
            lo
        };
    }
}
