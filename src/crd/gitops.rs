//! # GitOps Binding
//!
//! Declarative source-of-truth binding for a Platform: a Git repository the
//! spec is rendered from, plus drift, promotion, and rollback policies.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// GitOps binding for a Platform
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsSpec {
    /// Provider flavor. Explicit selection is required; there is no
    /// auto-detection.
    pub provider: GitOpsProvider,
    /// Repository binding
    pub repository: GitRepositorySpec,
    /// Delete live artifacts whose rendered counterparts disappeared
    #[serde(default)]
    pub prune: bool,
    /// Drift detection policy
    #[serde(default)]
    pub drift: Option<DriftPolicySpec>,
    /// Environment promotion pipeline
    #[serde(default)]
    pub promotion: Option<PromotionSpec>,
    /// Rollback policy and snapshot bounds
    #[serde(default)]
    pub rollback: Option<RollbackPolicySpec>,
    /// Image automation: the only path on which the controller pushes
    #[serde(default)]
    pub image_automation: Option<ImageAutomationSpec>,
}

/// Supported GitOps provider flavors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum GitOpsProvider {
    /// Pull-based: a GitRepository source object is owned per Platform and
    /// continuously reconciled
    Flux,
    /// Application-based: a materialized application object, repository
    /// cloned directly
    Application,
}

impl GitOpsProvider {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GitOpsProvider::Flux => "flux",
            GitOpsProvider::Application => "application",
        }
    }
}

/// Git repository source binding
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySpec {
    /// HTTPS or SSH repository URL
    pub url: String,
    /// Branch to track
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Path within the repository holding the rendered Platform spec
    #[serde(default)]
    pub path: Option<String>,
    /// Secret with credentials (username/password for HTTPS, identity for
    /// SSH). Absent means anonymous access.
    #[serde(default)]
    pub secret_ref: Option<String>,
    /// Poll interval, e.g. "1m"
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_poll_interval() -> String {
    "1m".to_string()
}

/// Drift detection policy
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriftPolicySpec {
    /// Detection interval, e.g. "5m"
    #[serde(default = "default_drift_interval")]
    pub interval: String,
    /// Action taken when drift is found
    #[serde(default)]
    pub action: DriftAction,
    /// Dotted field paths excluded from comparison
    #[serde(default)]
    pub ignore_paths: Option<Vec<String>>,
}

fn default_drift_interval() -> String {
    "5m".to_string()
}

/// Action taken on detected drift
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum DriftAction {
    /// Emit a condition and an event only
    #[default]
    Notify,
    /// Re-apply the rendered spec
    Remediate,
}

/// Environment promotion pipeline
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromotionSpec {
    /// Ordered environments, each bound to a branch with its own gates
    pub environments: Vec<EnvironmentSpec>,
}

/// One promotion environment
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    /// Environment name, e.g. "staging"
    pub name: String,
    /// Branch holding this environment's rendered state
    pub branch: String,
    /// Gates that must all pass before promotion into this environment
    #[serde(default)]
    pub gates: Option<Vec<GateSpec>>,
}

/// A promotion gate. Promotion blocks until every gate passes; manual
/// approval gates block indefinitely pending an acknowledgement object.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum GateSpec {
    /// Minimum ready-replica availability across enabled components
    Availability {
        /// Required percentage, 0-100
        min_percent: u8,
    },
    /// Health checks must hold for the given duration
    HealthDuration {
        /// Duration, e.g. "10m"
        duration: String,
    },
    /// Compare a metric query result against a threshold
    Metric {
        /// Query submitted to the metrics endpoint
        query: String,
        /// Comparison operator
        comparison: MetricComparison,
        /// Threshold value
        threshold: f64,
    },
    /// Block until an acknowledgement object names this environment
    ManualApproval {
        /// ConfigMap recording approvals, defaults to
        /// `<platform>-promotion-approvals`
        #[serde(default)]
        approval_object: Option<String>,
    },
}

/// Comparison operators for metric gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum MetricComparison {
    Lt,
    Le,
    Gt,
    Ge,
}

/// Rollback policy
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollbackPolicySpec {
    /// Fire a rollback automatically when health thresholds are exceeded
    #[serde(default)]
    pub automatic: bool,
    /// Consecutive health failures before an automatic rollback
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Window the failures must persist for, e.g. "5m"
    #[serde(default = "default_failure_window")]
    pub window: String,
    /// Bound on recorded snapshots; oldest evicted first
    #[serde(default)]
    pub max_history: Option<u32>,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_failure_window() -> String {
    "5m".to_string()
}

/// Image automation: commit rendered image bumps back to Git
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageAutomationSpec {
    /// Whether automation commits are enabled
    #[serde(default)]
    pub enabled: bool,
    /// Branch the automation commits to
    pub branch: String,
    /// Commit author, fixed identity
    #[serde(default = "default_author")]
    pub author: String,
    /// Commit message template; `{component}` and `{version}` are
    /// substituted
    #[serde(default = "default_message_template")]
    pub message_template: String,
}

fn default_author() -> String {
    "platform-operator <automation@observability.io>".to_string()
}

fn default_message_template() -> String {
    "chore: update {component} to {version}".to_string()
}
