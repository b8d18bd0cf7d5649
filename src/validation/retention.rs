//! # Retention Grammar
//!
//! Retention windows use the union grammar `^\d+[smhdwy]$`. Storage
//! retention additionally documents the day/week sub-grammar in its schema
//! description; validation accepts the union everywhere so a spec valid for
//! one field never silently fails another.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static RETENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<number>\d+)(?P<unit>[smhdwy])$").expect("retention regex is valid")
});

/// A parsed retention window. Formatting reproduces the input exactly, so
/// parse→format round-trips unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub value: u64,
    pub unit: RetentionUnit,
}

/// Retention units of the union grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Years,
}

impl RetentionUnit {
    #[must_use]
    pub fn suffix(&self) -> char {
        match self {
            RetentionUnit::Seconds => 's',
            RetentionUnit::Minutes => 'm',
            RetentionUnit::Hours => 'h',
            RetentionUnit::Days => 'd',
            RetentionUnit::Weeks => 'w',
            RetentionUnit::Years => 'y',
        }
    }

    #[must_use]
    pub fn seconds(&self) -> u64 {
        match self {
            RetentionUnit::Seconds => 1,
            RetentionUnit::Minutes => 60,
            RetentionUnit::Hours => 3600,
            RetentionUnit::Days => 86_400,
            RetentionUnit::Weeks => 7 * 86_400,
            RetentionUnit::Years => 365 * 86_400,
        }
    }
}

impl Retention {
    /// Parse a retention string against the union grammar
    pub fn parse(input: &str) -> Result<Self> {
        let caps = RETENTION_RE.captures(input).ok_or_else(|| {
            anyhow::anyhow!(
                "invalid retention '{}': expected <number><unit> with unit one of s, m, h, d, w, y",
                input
            )
        })?;

        let value: u64 = caps
            .name("number")
            .expect("number group always present on match")
            .as_str()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid retention number in '{input}': {e}"))?;

        if value == 0 {
            return Err(anyhow::anyhow!(
                "retention '{}' must be greater than zero",
                input
            ));
        }

        let unit = match caps
            .name("unit")
            .expect("unit group always present on match")
            .as_str()
        {
            "s" => RetentionUnit::Seconds,
            "m" => RetentionUnit::Minutes,
            "h" => RetentionUnit::Hours,
            "d" => RetentionUnit::Days,
            "w" => RetentionUnit::Weeks,
            "y" => RetentionUnit::Years,
            other => return Err(anyhow::anyhow!("unsupported retention unit '{other}'")),
        };

        Ok(Self { value, unit })
    }

    #[must_use]
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.value * self.unit.seconds())
    }
}

impl std::fmt::Display for Retention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// Whether the string matches the retention union grammar
#[must_use]
pub fn is_valid_retention(input: &str) -> bool {
    Retention::parse(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_grammar_accepts_all_units() {
        for r in ["30s", "15m", "24h", "15d", "4w", "1y"] {
            assert!(is_valid_retention(r), "'{r}' should parse");
        }
    }

    #[test]
    fn test_rejects_bad_grammar() {
        for r in ["", "15", "d15", "15D", "15 d", "1.5d", "15dd", "0d", "-1d"] {
            assert!(!is_valid_retention(r), "'{r}' should be rejected");
        }
    }

    #[test]
    fn test_parse_format_round_trip() {
        for r in ["30s", "15m", "24h", "15d", "4w", "1y", "90d", "168h"] {
            let parsed = Retention::parse(r).unwrap();
            assert_eq!(parsed.to_string(), r, "round trip for '{r}'");
        }
    }

    #[test]
    fn test_duration_conversion() {
        assert_eq!(
            Retention::parse("2d").unwrap().as_duration(),
            Duration::from_secs(2 * 86_400)
        );
        assert_eq!(
            Retention::parse("1w").unwrap().as_duration(),
            Duration::from_secs(7 * 86_400)
        );
    }
}
