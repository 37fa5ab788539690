//! Number formatting for the digest.
//!
//! Every helper returns [`PLACEHOLDER`] (or a [`FormatError`] the caller turns into
//! it) for absent, unparseable, non-finite or out-of-range values.

use crate::error::FormatError;

/// Shown for any value that is missing or unusable.
pub const PLACEHOLDER: &str = "—";

/// Upper bound on both digest texts, in characters.
pub const MAX_DIGEST_CHARS: usize = 1024;

const KMH_PER_MPS: f64 = 3.6;

/// Plausibility window for one displayed field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRange {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
}

impl FieldRange {
    pub const AIR_TEMP_C: Self = Self::new("air_temp_c", -90.0, 60.0);
    pub const SEA_TEMP_C: Self = Self::new("sea_temp_c", -5.0, 45.0);
    pub const HUMIDITY_PCT: Self = Self::new("humidity_pct", 0.0, 100.0);
    pub const WIND_KMH: Self = Self::new("wind_kmh", 0.0, 500.0);
    pub const PRICE_USD: Self = Self::new("price_usd", 0.0, 1.0e12);

    pub const fn new(field: &'static str, min: f64, max: f64) -> Self {
        Self { field, min, max }
    }

    /// # Errors
    ///
    /// [`FormatError::NonFinite`] or [`FormatError::OutOfRange`].
    pub fn check(&self, value: f64) -> Result<f64, FormatError> {
        if !value.is_finite() {
            return Err(FormatError::NonFinite { field: self.field });
        }
        if value < self.min || value > self.max {
            return Err(FormatError::OutOfRange {
                field: self.field,
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(value)
    }
}

/// Parses a raw textual value into a finite number.
///
/// # Errors
///
/// [`FormatError::NotANumber`] for text that does not parse or is not finite.
pub fn parse_number(raw: &str) -> Result<f64, FormatError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| FormatError::NotANumber {
            raw: raw.to_owned(),
        })
}

/// Formats `value` with fixed `decimals`, or the placeholder.
pub fn fixed(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(value) if value.is_finite() => {
            let formatted = format!("{value:.decimals$}");
            // "-0" reads as a bug in a weather line
            if formatted.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
                formatted.trim_start_matches('-').to_owned()
            } else {
                formatted
            }
        }
        _ => PLACEHOLDER.to_owned(),
    }
}

/// Like [`fixed`], but checks the value against `range` first.
///
/// # Errors
///
/// Returns the range violation; absent values are not an error.
pub fn checked_fixed(
    value: Option<f64>,
    decimals: usize,
    range: FieldRange,
) -> Result<String, FormatError> {
    match value {
        Some(value) => range.check(value).map(|value| fixed(Some(value), decimals)),
        None => Ok(PLACEHOLDER.to_owned()),
    }
}

/// Converts m/s to km/h.
pub fn wind_kmh(wind_mps: Option<f64>) -> Option<f64> {
    wind_mps.map(|mps| mps * KMH_PER_MPS)
}

/// Whether it is raining; `None` when precipitation is unknown.
pub fn is_raining(precip_mm: Option<f64>) -> Option<bool> {
    precip_mm
        .filter(|precip| precip.is_finite())
        .map(|precip| precip > 0.0)
}

/// "да" / "нет", or `missing` when precipitation is unknown.
pub fn rain_label(precip_mm: Option<f64>, missing: &'static str) -> &'static str {
    match is_raining(precip_mm) {
        Some(true) => "да",
        Some(false) => "нет",
        None => missing,
    }
}

/// Truncates to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_owned(),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_precision_matches_digest_fields() {
        assert_eq!(fixed(Some(31.26), 1), "31.3");
        assert_eq!(fixed(Some(64_123.6), 0), "64124");
        assert_eq!(fixed(Some(0.52349), 3), "0.523");
        assert_eq!(fixed(Some(2331.456), 2), "2331.46");
        assert_eq!(fixed(None, 2), PLACEHOLDER);
        assert_eq!(fixed(Some(f64::NAN), 1), PLACEHOLDER);
    }

    #[test]
    fn negative_zero_is_printed_without_sign() {
        assert_eq!(fixed(Some(-0.04), 1), "0.0");
        assert_eq!(fixed(Some(-0.4), 0), "0");
        assert_eq!(fixed(Some(-1.5), 1), "-1.5");
    }

    #[test]
    fn wind_is_converted_to_kmh_and_missing_stays_missing() {
        assert_eq!(fixed(wind_kmh(Some(10.0)), 0), "36");
        assert_eq!(wind_kmh(None), None);
        assert_eq!(fixed(wind_kmh(None), 0), PLACEHOLDER);
    }

    #[test]
    fn rain_requires_positive_precipitation() {
        assert_eq!(rain_label(Some(0.2), PLACEHOLDER), "да");
        assert_eq!(rain_label(Some(0.0), PLACEHOLDER), "нет");
        assert_eq!(rain_label(None, PLACEHOLDER), PLACEHOLDER);
        assert_eq!(rain_label(Some(f64::NAN), "нет данных"), "нет данных");
    }

    #[test]
    fn parse_number_rejects_text_and_infinities() {
        assert_eq!(parse_number(" 12.5 "), Ok(12.5));
        assert!(matches!(parse_number("abc"), Err(FormatError::NotANumber { .. })));
        assert!(parse_number("inf").is_err());
    }

    #[test]
    fn range_check_reports_field() {
        let error = checked_fixed(Some(140.0), 0, FieldRange::HUMIDITY_PCT)
            .expect_err("humidity above 100");
        assert!(matches!(
            error,
            FormatError::OutOfRange {
                field: "humidity_pct",
                ..
            }
        ));
        assert_eq!(
            checked_fixed(None, 0, FieldRange::HUMIDITY_PCT),
            Ok(PLACEHOLDER.to_owned())
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "ё".repeat(1030);
        let truncated = truncate_chars(&text, MAX_DIGEST_CHARS);

        assert_eq!(truncated.chars().count(), MAX_DIGEST_CHARS);
        assert_eq!(truncated.len(), MAX_DIGEST_CHARS * 2);
        assert_eq!(truncate_chars("short", MAX_DIGEST_CHARS), "short");
    }
}
