//! Lenient numeric parsing for exported report cells.

const STRIPPED: &[char] = &[',', '_', '$', '€', '£', '¥', '₹'];

/// A parsed cell. `coerced` is set when the raw text was present but could
/// not be used as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericField<T> {
    pub value: T,
    pub coerced: bool,
}

impl<T> NumericField<T> {
    const fn clean(value: T) -> Self {
        Self {
            value,
            coerced: false,
        }
    }

    const fn coerced(value: T) -> Self {
        Self {
            value,
            coerced: true,
        }
    }
}

fn strip(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !STRIPPED.contains(c))
        .collect()
}

/// Parse a non-negative amount (revenue, clicks). Empty cells are zero.
/// Anything unparseable, non-finite or negative becomes zero and is flagged.
pub fn parse_amount(raw: &str) -> NumericField<f64> {
    let cleaned = strip(raw);
    if cleaned.is_empty() {
        return NumericField::clean(0.0);
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => NumericField::clean(v),
        Ok(v) if v == 0.0 => NumericField::clean(0.0),
        _ => NumericField::coerced(0.0),
    }
}

/// Parse a non-negative integer count (searches). Integral floats such as
/// `12.0` are accepted; fractional values are truncated and flagged.
pub fn parse_count(raw: &str) -> NumericField<u64> {
    let amount = parse_amount(raw);
    if amount.coerced {
        return NumericField::coerced(0);
    }
    let truncated = amount.value.trunc();
    if truncated > u64::MAX as f64 {
        return NumericField::coerced(0);
    }
    if truncated != amount.value {
        NumericField::coerced(truncated as u64)
    } else {
        NumericField::clean(truncated as u64)
    }
}
