//! # Version Grammar
//!
//! Parsing and comparison of component version strings.
//! Grammar: `^v?\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?$`

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)(-(?P<pre>[0-9A-Za-z.-]+))?$")
        .expect("version regex is valid")
});

/// A parsed component version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Pre-release tag, compared lexicographically; a pre-release sorts
    /// below the same release without one
    pub pre: Option<String>,
}

impl ComponentVersion {
    /// Parse a version string, tolerating the optional `v` prefix
    pub fn parse(input: &str) -> Result<Self> {
        let caps = VERSION_RE.captures(input.trim()).ok_or_else(|| {
            anyhow::anyhow!(
                "invalid version '{}': expected v<major>.<minor>.<patch>[-pre]",
                input
            )
        })?;

        let field = |name: &str| -> Result<u64> {
            caps.name(name)
                .ok_or_else(|| anyhow::anyhow!("missing {name} in version '{input}'"))?
                .as_str()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid {name} in version '{input}': {e}"))
        };

        Ok(Self {
            major: field("major")?,
            minor: field("minor")?,
            patch: field("patch")?,
            pre: caps.name("pre").map(|m| m.as_str().to_string()),
        })
    }
}

impl PartialOrd for ComponentVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => std::cmp::Ordering::Equal,
                // A pre-release sorts below the plain release
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

/// Whether the string matches the version grammar
#[must_use]
pub fn is_valid_version(input: &str) -> bool {
    VERSION_RE.is_match(input.trim())
}

/// True when `new` is an older release than `old` (used for the downgrade
/// warning; downgrades are permitted, never blocked)
#[must_use]
pub fn is_downgrade(old: &str, new: &str) -> bool {
    match (ComponentVersion::parse(old), ComponentVersion::parse(new)) {
        (Ok(old), Ok(new)) => new < old,
        _ => false,
    }
}

/// Normalize a version into an image tag: components whose upstream tags
/// omit the `v` prefix have it stripped, the rest keep the string verbatim.
#[must_use]
pub fn image_tag(version: &str, tags_with_v_prefix: bool) -> String {
    let v = version.trim();
    if tags_with_v_prefix {
        v.to_string()
    } else {
        v.strip_prefix('v').unwrap_or(v).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_versions() {
        for v in ["v2.48.0", "2.48.0", "10.2.0", "0.91.0", "v1.0.0-rc.1", "2.9.4-beta"] {
            assert!(is_valid_version(v), "'{v}' should be valid");
        }
    }

    #[test]
    fn test_invalid_versions() {
        for v in ["invalid-version", "v2.48", "2", "v2.48.0.1", "", "latest ", "v-1.0.0"] {
            assert!(!is_valid_version(v), "'{v}' should be invalid");
        }
    }

    #[test]
    fn test_ordering() {
        let a = ComponentVersion::parse("v2.47.0").unwrap();
        let b = ComponentVersion::parse("v2.48.0").unwrap();
        assert!(a < b);

        let rc = ComponentVersion::parse("v2.48.0-rc.1").unwrap();
        assert!(rc < b);
        assert!(rc > a);
    }

    #[test]
    fn test_downgrade_detection() {
        assert!(is_downgrade("v2.48.0", "v2.47.0"));
        assert!(!is_downgrade("v2.47.0", "v2.48.0"));
        assert!(!is_downgrade("v2.48.0", "v2.48.0"));
        // Unparseable strings never report a downgrade; the structural
        // rules reject them separately
        assert!(!is_downgrade("garbage", "v2.47.0"));
    }

    #[test]
    fn test_image_tag_prefix_policy() {
        assert_eq!(image_tag("v2.48.0", true), "v2.48.0");
        assert_eq!(image_tag("v10.2.0", false), "10.2.0");
        assert_eq!(image_tag("10.2.0", false), "10.2.0");
    }
}
