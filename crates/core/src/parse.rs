//! Numeric parsing of exchange-formatted values.
//!
//! Upstream feeds publish numbers as display strings: thousands separators
//! (`"1,234,567"`), explicit sign prefixes (`"+5.00"`), surrounding blanks.

use crate::error::{ParseError, ParseErrorKind};

/// Parse a locale-formatted decimal string.
///
/// Thousands separators and surrounding whitespace are removed; a leading
/// `+` or `-` is honoured. Non-finite results are rejected.
pub fn parse_decimal(raw: &str) -> Result<f64, ParseError> {
    let cleaned: String = raw.trim().chars().filter(|&c| c != ',').collect();
    if cleaned.is_empty() {
        return Err(ParseError::new(raw, ParseErrorKind::Empty));
    }
    // f64::from_str also accepts "inf"/"nan"; only plain decimals are allowed here.
    let body = cleaned
        .strip_prefix(|c: char| c == '+' || c == '-')
        .unwrap_or(&cleaned);
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return Err(ParseError::new(raw, ParseErrorKind::Invalid));
    }
    let value: f64 = cleaned
        .parse()
        .map_err(|_| ParseError::new(raw, ParseErrorKind::Invalid))?;
    if !value.is_finite() {
        return Err(ParseError::new(raw, ParseErrorKind::NonFinite));
    }
    Ok(value)
}

/// Parse an optional raw value, treating absence and failure alike.
///
/// Failures are logged at debug level and otherwise dropped.
pub fn parse_opt(raw: Option<&str>) -> Option<f64> {
    let raw = raw?;
    match parse_decimal(raw) {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::debug!(%err, "unparseable value");
            None
        }
    }
}

/// Round to `decimals` places exactly as fixed-point formatting does.
///
/// The exact binary value is rounded and ties go to even, so
/// `round_to(1.125, 2)` is 1.12 and the stored value always renders back to
/// the same digits.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    format!("{:.*}", decimals as usize, value)
        .parse()
        .unwrap_or(value)
}
