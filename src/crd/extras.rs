//! # Companion Resources
//!
//! Schema-only resources emitted alongside the Platform CRD. They carry no
//! controllers of their own; external collaborators (the API gateway, the
//! mesh integration) consume them.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Standalone log-store tuning consumed by the log component when a
/// Platform references it
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "LogStoreConfig",
    group = "observability.io",
    version = "v1beta1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct LogStoreConfigSpec {
    /// Platform the tuning applies to
    pub platform_ref: String,
    /// Per-tenant ingestion limits
    #[serde(default)]
    pub limits: Option<BTreeMap<String, String>>,
    /// Compaction interval, e.g. "10m"
    #[serde(default)]
    pub compaction_interval: Option<String>,
}

/// A dashboard definition registered with the dashboards component
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Dashboard",
    group = "observability.io",
    version = "v1beta1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSpec {
    /// Platform the dashboard belongs to
    pub platform_ref: String,
    /// Folder the dashboard is filed under
    #[serde(default)]
    pub folder: Option<String>,
    /// Opaque dashboard model; the operator stores it, the dashboards
    /// component interprets it
    pub definition: serde_json::Value,
}

/// Service-mesh binding consumed by the mesh integration
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ServiceMesh",
    group = "observability.io",
    version = "v1beta1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMeshSpec {
    /// Platform the binding applies to
    pub platform_ref: String,
    /// Mesh flavor
    #[serde(default)]
    pub provider: Option<String>,
    /// Require mutual TLS between platform services
    #[serde(default)]
    pub mtls: bool,
}
