//! # Network Name Grammars
//!
//! DNS-1123 host and label validation used by the ingress rules.

use regex::Regex;
use std::sync::LazyLock;

static DNS_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("label regex is valid"));

/// Whether the string is a valid DNS-1123 host name (dot-separated labels,
/// at most 253 characters total, each label at most 63)
#[must_use]
pub fn is_valid_dns_name(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    host.split('.')
        .all(|label| label.len() <= 63 && DNS_LABEL_RE.is_match(label))
}

/// Whether the string is a single valid DNS-1123 label (resource names)
#[must_use]
pub fn is_valid_dns_label(label: &str) -> bool {
    label.len() <= 63 && DNS_LABEL_RE.is_match(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_hosts() {
        for h in [
            "grafana.example.com",
            "metrics.internal",
            "a.b.c.d",
            "prometheus",
            "x1-y2.z3",
        ] {
            assert!(is_valid_dns_name(h), "'{h}' should be valid");
        }
    }

    #[test]
    fn test_invalid_hosts() {
        let long_label = format!("{}.com", "a".repeat(64));
        for h in [
            "",
            "Grafana.Example.com",
            "-leading.example.com",
            "trailing-.example.com",
            "under_score.example.com",
            "double..dot",
            long_label.as_str(),
        ] {
            assert!(!is_valid_dns_name(h), "'{h}' should be invalid");
        }
    }
}
