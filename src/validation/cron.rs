//! # Cron Schedule Grammar
//!
//! Validates five-field cron expressions (minute, hour, day-of-month,
//! month, day-of-week) as used by backup schedules. Each field accepts
//! `*`, values, ranges, lists, and step suffixes.

use anyhow::Result;

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec { name: "minute", min: 0, max: 59 },
    FieldSpec { name: "hour", min: 0, max: 23 },
    FieldSpec { name: "day-of-month", min: 1, max: 31 },
    FieldSpec { name: "month", min: 1, max: 12 },
    FieldSpec { name: "day-of-week", min: 0, max: 6 },
];

/// Validate a five-field cron expression
pub fn validate_cron(expr: &str) -> Result<()> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(anyhow::anyhow!(
            "invalid cron expression '{}': expected 5 fields, got {}",
            expr,
            fields.len()
        ));
    }

    for (value, spec) in fields.iter().zip(FIELDS.iter()) {
        validate_field(value, spec)
            .map_err(|e| anyhow::anyhow!("invalid cron expression '{expr}': {e}"))?;
    }

    Ok(())
}

/// Whether the string is a valid five-field cron expression
#[must_use]
pub fn is_valid_cron(expr: &str) -> bool {
    validate_cron(expr).is_ok()
}

fn validate_field(field: &str, spec: &FieldSpec) -> Result<()> {
    if field.is_empty() {
        return Err(anyhow::anyhow!("{} field is empty", spec.name));
    }

    for part in field.split(',') {
        // Optional step suffix applies to a range or the full wildcard
        let (base, step) = match part.split_once('/') {
            Some((b, s)) => (b, Some(s)),
            None => (part, None),
        };

        if let Some(step) = step {
            let step: u32 = step
                .parse()
                .map_err(|_| anyhow::anyhow!("{} step '{}' is not a number", spec.name, step))?;
            if step == 0 {
                return Err(anyhow::anyhow!("{} step must be greater than zero", spec.name));
            }
        }

        if base == "*" {
            continue;
        }

        let (lo, hi) = match base.split_once('-') {
            Some((lo, hi)) => (parse_value(lo, spec)?, parse_value(hi, spec)?),
            None => {
                let v = parse_value(base, spec)?;
                (v, v)
            }
        };

        if lo > hi {
            return Err(anyhow::anyhow!(
                "{} range '{}' is inverted",
                spec.name,
                base
            ));
        }
    }

    Ok(())
}

fn parse_value(value: &str, spec: &FieldSpec) -> Result<u32> {
    let v: u32 = value
        .parse()
        .map_err(|_| anyhow::anyhow!("{} value '{}' is not a number", spec.name, value))?;
    if v < spec.min || v > spec.max {
        return Err(anyhow::anyhow!(
            "{} value {} is outside {}..={}",
            spec.name,
            v,
            spec.min,
            spec.max
        ));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_expressions() {
        for expr in [
            "0 2 * * *",
            "*/15 * * * *",
            "0 0 1 * *",
            "30 4 * * 0",
            "0 0 * * 1-5",
            "0 6,18 * * *",
            "0-30/5 2 * * *",
        ] {
            assert!(is_valid_cron(expr), "'{expr}' should be valid");
        }
    }

    #[test]
    fn test_invalid_expressions() {
        for expr in [
            "",
            "not-a-cron",
            "0 2 * *",
            "0 2 * * * *",
            "60 * * * *",
            "* 24 * * *",
            "* * 0 * *",
            "* * * 13 *",
            "* * * * 7",
            "5-1 * * * *",
            "*/0 * * * *",
        ] {
            assert!(!is_valid_cron(expr), "'{expr}' should be invalid");
        }
    }
}
