//! # Platform Custom Resource
//!
//! The top-level declarative resource this operator manages: a collection of
//! observability components (metrics server, dashboards, log store, trace
//! store, collector) with versions, replica counts, resource budgets,
//! storage backends, ingress, authentication, HA, backup, GitOps bindings,
//! autoscaling policies, and cost guards.
//!
//! Spec and status are partitioned: controllers never write spec, users
//! never write status. The GitOps controller is the one exception on the
//! spec side; it applies rendered specs on behalf of the user.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod autoscaling;
pub mod components;
pub mod extras;
pub mod gitops;
pub mod status;

pub use autoscaling::{
    ComponentAutoscalingSpec, ComponentBudgetSpec, CostAction, CostChannelSpec, CostGuardSpec,
    CostThresholdSpec, HorizontalPolicySpec, PredictiveModelKind, PredictivePolicySpec,
    VerticalPolicySpec, VerticalUpdateMode,
};
pub use components::{
    AuthMode, AuthSpec, CollectorSpec, CommonComponentSpec, ComponentIngressSpec, ComponentKind,
    ComponentsSpec, DashboardsSpec, IngressTlsSpec, LogsSpec, MetricsSpec, ObjectStoreSpec,
    RemoteWriteSpec, ResourceBudget, RingSpec, SchemaPeriodSpec, StorageSpec, TracesSpec,
    SUPPORTED_SCHEMA_VERSIONS,
};
pub use gitops::{
    DriftAction, DriftPolicySpec, EnvironmentSpec, GateSpec, GitOpsProvider, GitOpsSpec,
    GitRepositorySpec, ImageAutomationSpec, MetricComparison, PromotionSpec, RollbackPolicySpec,
};
pub use status::{
    ComponentPhase, ComponentStatus, Condition, FrozenStatusSummary, GitOpsStatus, PlatformPhase,
    PlatformStatus, RollbackSnapshot,
};

/// Platform Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: observability.io/v1beta1
/// kind: Platform
/// metadata:
///   name: production
///   namespace: monitoring
/// spec:
///   components:
///     metrics:
///       enabled: true
///       version: v2.48.0
///       replicas: 2
///       resources:
///         requests: {cpu: 100m, memory: 256Mi}
///         limits: {cpu: 500m, memory: 1Gi}
///     dashboards:
///       enabled: true
///       version: 10.2.0
///   highAvailability:
///     enabled: true
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Platform",
    group = "observability.io",
    version = "v1beta1",
    namespaced,
    status = "PlatformStatus",
    shortname = "obsplat",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Metrics", "type":"string", "jsonPath":".spec.components.metrics.version"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSpec {
    /// The observability components to deploy. At least one must be enabled.
    pub components: ComponentsSpec,
    /// Pause reconciliation entirely; the platform keeps its last state and
    /// a Paused condition is surfaced
    #[serde(default)]
    pub paused: bool,
    /// High-availability mode: every enabled stateful or service-critical
    /// component requires at least 2 replicas plus a disruption budget
    #[serde(default)]
    pub high_availability: Option<HighAvailabilitySpec>,
    /// Scheduled backups of component state
    #[serde(default)]
    pub backup: Option<BackupSpec>,
    /// Installer mode selection: native manifests or Helm releases. One
    /// mode per component deployment; modes are not mixed.
    #[serde(default)]
    pub installer: Option<InstallerSpec>,
    /// Image registry override prepended to component image names
    #[serde(default)]
    pub image_registry: Option<String>,
    /// GitOps source-of-truth binding
    #[serde(default)]
    pub gitops: Option<GitOpsSpec>,
    /// Cost guards: budgets, alert thresholds, and enforcement actions
    #[serde(default)]
    pub cost: Option<CostGuardSpec>,
    /// Per-tenant isolation labels applied to all rendered artifacts
    #[serde(default)]
    pub tenant: Option<TenantSpec>,
    /// Service-mesh integration toggles
    #[serde(default)]
    pub service_mesh: Option<ServiceMeshIntegrationSpec>,
}

/// High-availability block
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HighAvailabilitySpec {
    /// Whether HA constraints are enforced
    #[serde(default)]
    pub enabled: bool,
}

/// Scheduled backup block
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// Whether backups are scheduled
    #[serde(default)]
    pub enabled: bool,
    /// Cron expression, five fields
    #[serde(default)]
    pub schedule: Option<String>,
    /// Number of backups kept; must be at least 1 when a schedule is set
    #[serde(default)]
    pub retention: Option<i32>,
    /// Object-store destination for backup archives
    #[serde(default)]
    pub destination: Option<ObjectStoreSpec>,
}

/// Installer mode selection
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallerSpec {
    /// Deployment mode for all components
    #[serde(default)]
    pub mode: InstallerMode,
    /// Helm chart repository, required in Helm mode
    #[serde(default)]
    pub chart_repository: Option<String>,
}

/// Supported installer modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum InstallerMode {
    /// Operator-rendered native manifests
    #[default]
    Native,
    /// Helm releases named `<platform>-<component>`
    Helm,
}

/// Tenant isolation block
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    /// Tenant identifier stamped onto every artifact
    pub name: String,
    /// Quota hints surfaced to admission, not enforced by the operator
    #[serde(default)]
    pub labels: Option<std::collections::BTreeMap<String, String>>,
}

/// Service-mesh integration block
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMeshIntegrationSpec {
    /// Whether sidecar injection labels are applied to workloads
    #[serde(default)]
    pub enabled: bool,
    /// Mesh flavor, informational
    #[serde(default)]
    pub provider: Option<String>,
    /// Enforce mutual TLS annotations on services
    #[serde(default)]
    pub mtls: bool,
}

impl Platform {
    /// Namespaced identity key, used for the work queue and backoff state
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.metadata.namespace.as_deref().unwrap_or("default"),
            self.metadata.name.as_deref().unwrap_or("unknown")
        )
    }

    /// Whether HA constraints apply
    #[must_use]
    pub fn ha_enabled(&self) -> bool {
        self.spec
            .high_availability
            .as_ref()
            .is_some_and(|ha| ha.enabled)
    }

    /// Installer mode, defaulting to native manifests
    #[must_use]
    pub fn installer_mode(&self) -> InstallerMode {
        self.spec
            .installer
            .as_ref()
            .map_or(InstallerMode::Native, |i| i.mode)
    }
}
