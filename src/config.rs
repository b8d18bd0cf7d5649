//! # Operator Configuration
//!
//! Process flags and environment variables. No configuration files are
//! required; every setting has a default from the constants module.

use crate::constants;
use clap::Parser;

/// Operator-level settings
#[derive(Debug, Clone, Parser)]
#[command(name = "platform-operator", about = "Observability platform operator")]
pub struct OperatorConfig {
    /// Address the metrics/probe server binds to
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0")]
    pub metrics_addr: String,

    /// Port for /metrics, /healthz, and /readyz
    #[arg(long, env = "METRICS_PORT", default_value_t = constants::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Port for the admission webhook (HTTPS)
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = constants::DEFAULT_WEBHOOK_PORT)]
    pub webhook_port: u16,

    /// Path to the webhook TLS certificate (PEM). The webhook is disabled
    /// when unset.
    #[arg(long, env = "WEBHOOK_CERT_PATH")]
    pub webhook_cert_path: Option<String>,

    /// Path to the webhook TLS private key (PEM)
    #[arg(long, env = "WEBHOOK_KEY_PATH")]
    pub webhook_key_path: Option<String>,

    /// Namespace the operator runs in (lease and default artifacts)
    #[arg(long, env = "POD_NAMESPACE", default_value = "platform-system")]
    pub namespace: String,

    /// Leader-election lease name
    #[arg(long, env = "LEASE_NAME", default_value = constants::DEFAULT_LEASE_NAME)]
    pub lease_name: String,

    /// Leader-election lease duration in seconds; renewal runs at one third
    /// of this
    #[arg(long, env = "LEASE_DURATION_SECS", default_value_t = constants::DEFAULT_LEASE_DURATION_SECS)]
    pub lease_duration_secs: u64,

    /// Maximum Platforms reconciled concurrently
    #[arg(long, env = "CONCURRENCY_LIMIT", default_value_t = constants::DEFAULT_CONCURRENCY_LIMIT)]
    pub concurrency_limit: usize,

    /// Requeue interval once a Platform has settled, seconds
    #[arg(long, env = "SETTLED_REQUEUE_SECS", default_value_t = constants::DEFAULT_SETTLED_REQUEUE_SECS)]
    pub settled_requeue_secs: u64,

    /// Requeue interval while components are progressing, seconds
    #[arg(long, env = "PROGRESSING_REQUEUE_SECS", default_value_t = constants::DEFAULT_PROGRESSING_REQUEUE_SECS)]
    pub progressing_requeue_secs: u64,

    /// Error backoff base delay, seconds
    #[arg(long, env = "BACKOFF_BASE_SECS", default_value_t = constants::DEFAULT_BACKOFF_BASE_SECS)]
    pub backoff_base_secs: u64,

    /// Error backoff cap, seconds
    #[arg(long, env = "BACKOFF_CAP_SECS", default_value_t = constants::DEFAULT_BACKOFF_CAP_SECS)]
    pub backoff_cap_secs: u64,

    /// Deadline for one reconcile pass, seconds
    #[arg(long, env = "RECONCILE_DEADLINE_SECS", default_value_t = constants::DEFAULT_RECONCILE_DEADLINE_SECS)]
    pub reconcile_deadline_secs: u64,

    /// Force Helm mode for all Platforms regardless of their installer spec
    #[arg(long, env = "HELM_MODE", default_value_t = false)]
    pub helm_mode: bool,

    /// Default Helm chart repository when a Platform does not name one
    #[arg(long, env = "CHART_REPOSITORY", default_value = "https://charts.observability.io")]
    pub chart_repository: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        // Parse from an empty argv so defaults and env vars apply
        Self::parse_from::<_, std::ffi::OsString>([std::ffi::OsString::from("platform-operator")])
    }
}
