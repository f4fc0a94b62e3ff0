//! Best-effort numeric coercion of raw tabular fields.
//!
//! Every parser here is total: a field that is absent, empty, non-numeric or
//! non-finite comes back as `None` (or the caller's fallback) and never aborts
//! the row.

pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = trimmed.parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

pub fn parse_number_or(raw: Option<&str>, fallback: f64) -> f64 {
    parse_number(raw).unwrap_or(fallback)
}

/// Integer fields (floors, years) accept decimal text such as `"12.0"` and
/// truncate toward zero.
pub fn parse_integer(raw: Option<&str>) -> Option<i64> {
    let value = parse_number(raw)?.trunc();
    if value < i64::MIN as f64 || value > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}

pub fn parse_integer_or(raw: Option<&str>, fallback: i64) -> i64 {
    parse_integer(raw).unwrap_or(fallback)
}

/// Rounds half away from zero to `digits` decimal places.
pub(crate) fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
