//! # Error Taxonomy
//!
//! Typed reconciliation errors. Each kind carries its own retry policy:
//! config errors wait for a spec change, transient errors ride the work
//! queue backoff, conflicts retry within the pass, dependency waits requeue
//! fast, quota and backend failures requeue slow to avoid retry storms.

use crate::validation::AdmissionError;
use thiserror::Error;

/// Reconciliation error kinds
#[derive(Debug, Error)]
pub enum Error {
    /// Spec or rendered config is invalid; no retry until the spec changes
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Network or API-throttling failure; retried via work-queue backoff
    #[error("transient failure: {0}")]
    Transient(String),

    /// Optimistic-concurrency conflict; the pass retries from the top
    #[error("conflict: {0}")]
    Conflict(String),

    /// An upstream component has not reported Ready yet
    #[error("{component} is waiting for {waiting_on} to become ready")]
    DependencyUnready {
        component: String,
        waiting_on: String,
    },

    /// Namespace or cluster quota refused the write
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Object store or Git host is unreachable
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The requested version is outside the component's supported range
    #[error("{component} version '{version}' is not supported")]
    VersionUnsupported { component: String, version: String },
}

/// Stable kind tags for metrics labels and condition reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigInvalid,
    Transient,
    Conflict,
    DependencyUnready,
    QuotaExceeded,
    BackendUnavailable,
    VersionUnsupported,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::Transient => "Transient",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::DependencyUnready => "DependencyUnready",
            ErrorKind::QuotaExceeded => "QuotaExceeded",
            ErrorKind::BackendUnavailable => "BackendUnavailable",
            ErrorKind::VersionUnsupported => "VersionUnsupported",
        }
    }
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            Error::Transient(_) => ErrorKind::Transient,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::DependencyUnready { .. } => ErrorKind::DependencyUnready,
            Error::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            Error::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Error::VersionUnsupported { .. } => ErrorKind::VersionUnsupported,
        }
    }

    /// Kinds that never resolve without a spec change. VersionUnsupported is
    /// treated as ConfigInvalid per policy.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::ConfigInvalid(_) | Error::VersionUnsupported { .. }
        )
    }

    /// Classify a Kubernetes API error into the taxonomy
    #[must_use]
    pub fn from_kube(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(resp) => match resp.code {
                409 => Error::Conflict(resp.message.clone()),
                403 if resp.message.contains("quota") => Error::QuotaExceeded(resp.message.clone()),
                422 => Error::ConfigInvalid(resp.message.clone()),
                429 | 500 | 502 | 503 | 504 => Error::Transient(resp.message.clone()),
                _ => Error::Transient(err.to_string()),
            },
            _ => Error::Transient(err.to_string()),
        }
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        Error::from_kube(err)
    }
}

impl From<AdmissionError> for Error {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::Invalid(_) => Error::ConfigInvalid(err.to_string()),
            AdmissionError::Conflict(msg) => Error::Conflict(msg),
            AdmissionError::Forbidden(msg) => Error::ConfigInvalid(msg),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_kinds() {
        assert!(Error::ConfigInvalid("bad".into()).is_terminal());
        assert!(Error::VersionUnsupported {
            component: "metrics".into(),
            version: "v0.1.0".into()
        }
        .is_terminal());
        assert!(!Error::Transient("net".into()).is_terminal());
        assert!(!Error::Conflict("409".into()).is_terminal());
    }

    #[test]
    fn test_kind_tags_are_stable() {
        assert_eq!(Error::Transient("x".into()).kind().as_str(), "Transient");
        assert_eq!(
            Error::QuotaExceeded("x".into()).kind().as_str(),
            "QuotaExceeded"
        );
    }
}
