//! Semitone pitch values and their text form.
//!
//! A pitch is a MIDI-like semitone number (69 = A4 = 440 Hz) rounded to one
//! decimal. Frames without a detectable pitch are `None` in a raw contour;
//! only cleaned contours (plain `f32`) ever reach the search engine.

/// Semitone pitch value.
pub type PitchType = f32;

/// Text token used for an unvoiced frame in raw contour dumps.
pub const UNVOICED_TOKEN: &str = "-1";

/// Highest semitone a pitch may take. A 24 kHz tone sits near 136.
pub const MAX_PITCH: PitchType = 140.0;

/// Convert a frequency to a semitone pitch, rounded to one decimal and
/// clamped at 0. Non-positive frequencies have no pitch.
pub fn hz_to_pitch(frequency: f64) -> Option<PitchType> {
    if !(frequency > 0.0) || !frequency.is_finite() {
        return None;
    }
    let midi = (frequency / 440.0).log2() * 12.0 + 69.0;
    let rounded = (midi * 10.0).round() / 10.0;
    Some(rounded.max(0.0) as PitchType)
}

/// Parse a line of space-separated semitone values.
/// Tokens that are not numbers are skipped, never fatal, and so are values
/// outside `0..=MAX_PITCH`. That drops the `-1` of raw dumps.
pub fn parse_pitch(line: &str) -> Vec<PitchType> {
    line.split_whitespace()
        .filter_map(|tok| tok.parse::<f64>().ok())
        .map(|v| v as PitchType)
        .filter(|v| (0.0..=MAX_PITCH).contains(v))
        .collect()
}

/// Format a cleaned contour as a single space-separated line. Values are
/// written in their shortest exact form so they parse back unchanged.
pub fn format_pitch(pitch: &[PitchType]) -> String {
    pitch
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a raw contour, writing unvoiced frames as `-1`.
pub fn format_raw_pitch(raw: &[Option<PitchType>]) -> String {
    raw.iter()
        .map(|p| match p {
            Some(v) => v.to_string(),
            None => UNVOICED_TOKEN.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a440_is_69() {
        assert_eq!(hz_to_pitch(440.0), Some(69.0));
        assert_eq!(hz_to_pitch(880.0), Some(81.0));
    }

    #[test]
    fn test_rounding_to_one_decimal() {
        // 450 Hz = 69.389 semitones
        assert_eq!(hz_to_pitch(450.0), Some(69.4));
    }

    #[test]
    fn test_no_pitch_for_non_positive() {
        assert_eq!(hz_to_pitch(0.0), None);
        assert_eq!(hz_to_pitch(-10.0), None);
        assert_eq!(hz_to_pitch(f64::NAN), None);
    }

    #[test]
    fn test_very_low_frequency_clamps_to_zero() {
        assert_eq!(hz_to_pitch(1.0), Some(0.0));
    }

    #[test]
    fn test_parse_skips_garbage() {
        let p = parse_pitch("60 61.5 abc  62 - 1e1 nan");
        assert_eq!(p, vec![60.0, 61.5, 62.0, 10.0]);
        // Values that overflow f32 or leave the semitone range are dropped.
        assert_eq!(parse_pitch("60 1e39 -1e39 inf 2e7 140.5"), vec![60.0]);
    }

    #[test]
    fn test_parse_drops_unvoiced_token() {
        let raw = format_raw_pitch(&[Some(60.0), None, Some(62.0), None]);
        assert_eq!(parse_pitch(&raw), vec![60.0, 62.0]);
        assert_eq!(parse_pitch("60 -1 62 -0.5 0 140"), vec![60.0, 62.0, 0.0, 140.0]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_pitch("").is_empty());
        assert!(parse_pitch("   ").is_empty());
    }

    #[test]
    fn test_format_roundtrip_text() {
        assert_eq!(format_pitch(&[60.0, 61.5]), "60 61.5");
        assert_eq!(format_raw_pitch(&[Some(60.0), None]), "60 -1");
    }

    #[test]
    fn test_format_keeps_every_digit() {
        // Even-length medians land on hundredths.
        let contour = vec![60.25, 57.05, 72.1];
        assert_eq!(parse_pitch(&format_pitch(&contour)), contour);
    }
}
