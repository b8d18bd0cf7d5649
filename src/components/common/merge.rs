//! # Config Merge & Fingerprints
//!
//! Deterministic deep-merge of the advanced config bag over operator
//! defaults, and canonical hashing used for both the platform config hash
//! and content-addressed config bundles. `serde_json` maps are ordered, so
//! canonical serialization sorts keys without extra work; the hash is
//! stable regardless of input key order.

use sha2::{Digest, Sha256};

/// Deep-merge `overlay` into `base`: scalars from the overlay override,
/// lists replace, maps overlay recursively. The result is deterministic so
/// configuration fingerprints stay stable.
#[must_use]
pub fn deep_merge(base: serde_json::Value, overlay: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        // Anything non-map from the overlay wins outright, lists included
        (_, overlay) => overlay,
    }
}

/// Canonical JSON rendering: keys sorted, no insignificant whitespace
pub fn canonical_json(value: &serde_json::Value) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Content hash of a canonicalized value, hex-encoded SHA-256
#[must_use]
pub fn content_hash(value: &serde_json::Value) -> String {
    let canonical = canonical_json(value).unwrap_or_default();
    hash_bytes(canonical.as_bytes())
}

/// Hex-encoded SHA-256 of raw bytes
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Short content-address suffix for artifact names
#[must_use]
pub fn short_hash(value: &serde_json::Value) -> String {
    content_hash(value)[..8].to_string()
}
