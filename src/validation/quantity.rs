//! # Resource Quantity Grammar
//!
//! Parsing and comparison of Kubernetes resource quantity strings
//! ("100m", "256Mi", "1Gi", "2", "1.5"). Comparison is what the
//! requests-versus-limits rule needs; values are normalized to a common
//! milli-unit scale before comparing.

use anyhow::Result;

/// Parse a quantity string into milli-units of its base dimension.
/// CPU "100m" → 100; CPU "2" → 2000; memory "256Mi" → 256·2²⁰·1000.
pub fn parse_quantity_millis(input: &str) -> Result<u128> {
    let s = input.trim();
    if s.is_empty() {
        return Err(anyhow::anyhow!("quantity cannot be empty"));
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number_str, suffix) = s.split_at(split);

    if number_str.is_empty() {
        return Err(anyhow::anyhow!("invalid quantity '{s}': missing number"));
    }

    let number: f64 = number_str
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid quantity '{s}': {e}"))?;
    if number < 0.0 {
        return Err(anyhow::anyhow!("quantity '{s}' must not be negative"));
    }

    let scale_millis: f64 = match suffix {
        "" => 1000.0,
        "m" => 1.0,
        "k" => 1000.0 * 1e3,
        "M" => 1000.0 * 1e6,
        "G" => 1000.0 * 1e9,
        "T" => 1000.0 * 1e12,
        "Ki" => 1000.0 * 1024.0,
        "Mi" => 1000.0 * 1024.0 * 1024.0,
        "Gi" => 1000.0 * 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1000.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        other => {
            return Err(anyhow::anyhow!(
                "invalid quantity '{s}': unknown suffix '{other}'"
            ))
        }
    };

    Ok((number * scale_millis).round() as u128)
}

/// Whether the string parses as a quantity
#[must_use]
pub fn is_valid_quantity(input: &str) -> bool {
    parse_quantity_millis(input).is_ok()
}

/// True when `request` exceeds `limit`. Errors are treated as not-exceeding;
/// unparseable strings are rejected by their own structural rule first.
#[must_use]
pub fn request_exceeds_limit(request: &str, limit: &str) -> bool {
    match (parse_quantity_millis(request), parse_quantity_millis(limit)) {
        (Ok(r), Ok(l)) => r > l,
        _ => false,
    }
}
