//! # Platform Validation
//!
//! Admission rules for the Platform resource. Three hooks gate every spec
//! change: `create` (structural checks), `update` (structural plus delta
//! rules), and `delete` (dependency check). Each violation becomes a
//! structured field cause with a dotted path; warnings are advisory and
//! never block.
//!
//! The hooks are pure functions over Platform values so the webhook and the
//! reconciler share one implementation.

use crate::crd::Platform;
use thiserror::Error;

pub mod cron;
pub mod delta;
pub mod network;
pub mod quantity;
pub mod retention;
pub mod structural;
pub mod version;

pub use cron::{is_valid_cron, validate_cron};
pub use network::{is_valid_dns_label, is_valid_dns_name};
pub use quantity::{is_valid_quantity, parse_quantity_millis, request_exceeds_limit};
pub use retention::{is_valid_retention, Retention};
pub use version::{image_tag, is_downgrade, is_valid_version, ComponentVersion};

/// A single admission violation tied to a spec field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCause {
    /// Dotted field path, e.g. `spec.components.metrics.version`
    pub path: String,
    /// Kind tag for the violation
    pub kind: CauseKind,
    /// Human message
    pub message: String,
}

impl FieldCause {
    #[must_use]
    pub fn new(path: impl Into<String>, kind: CauseKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Violation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CauseKind {
    /// A required field is absent or empty
    Required,
    /// A field value fails its grammar or range
    Invalid,
    /// The change is not allowed in the current state
    Forbidden,
    /// The value names something outside the supported set
    NotSupported,
}

impl CauseKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CauseKind::Required => "FieldValueRequired",
            CauseKind::Invalid => "FieldValueInvalid",
            CauseKind::Forbidden => "FieldValueForbidden",
            CauseKind::NotSupported => "FieldValueNotSupported",
        }
    }
}

/// Typed admission failure, distinguishable by the caller
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The spec violates structural or delta rules
    #[error("invalid Platform spec: {}", summarize(.0))]
    Invalid(Vec<FieldCause>),
    /// The write raced another writer
    #[error("conflict: {0}")]
    Conflict(String),
    /// The operation is refused in the current state
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl AdmissionError {
    /// Structured causes, empty for non-Invalid kinds
    #[must_use]
    pub fn causes(&self) -> &[FieldCause] {
        match self {
            AdmissionError::Invalid(causes) => causes,
            _ => &[],
        }
    }
}

fn summarize(causes: &[FieldCause]) -> String {
    causes
        .iter()
        .map(|c| format!("{}: {}", c.path, c.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Admission hook for create: structural checks on the whole spec.
/// Returns advisory warnings on success.
pub fn validate_create(platform: &Platform) -> Result<Vec<String>, AdmissionError> {
    let mut causes = Vec::new();
    let mut warnings = Vec::new();
    structural::check_structure(platform, &mut causes, &mut warnings);
    if causes.is_empty() {
        Ok(warnings)
    } else {
        Err(AdmissionError::Invalid(causes))
    }
}

/// Admission hook for update: structural checks plus delta rules against
/// the prior accepted object
pub fn validate_update(old: &Platform, new: &Platform) -> Result<Vec<String>, AdmissionError> {
    let mut causes = Vec::new();
    let mut warnings = Vec::new();
    structural::check_structure(new, &mut causes, &mut warnings);
    delta::check_delta(old, new, &mut causes, &mut warnings);
    if causes.is_empty() {
        Ok(warnings)
    } else {
        Err(AdmissionError::Invalid(causes))
    }
}

/// Admission hook for delete: refuses while finalizers owned by third
/// parties remain
pub fn validate_delete(platform: &Platform) -> Result<Vec<String>, AdmissionError> {
    let foreign: Vec<&String> = platform
        .metadata
        .finalizers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|f| !f.starts_with(crate::constants::API_GROUP))
        .collect();

    if foreign.is_empty() {
        Ok(Vec::new())
    } else {
        Err(AdmissionError::Forbidden(format!(
            "third-party finalizers must be cleared before deletion: {}",
            foreign
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}
