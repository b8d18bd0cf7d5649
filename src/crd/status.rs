//! # Platform Status
//!
//! Status types for tracking reconciliation state, per-component readiness,
//! conditions, and rollback snapshots.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle phase of a Platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum PlatformPhase {
    #[default]
    Pending,
    Installing,
    Ready,
    Degraded,
    Failed,
    Upgrading,
    Deleting,
}

impl PlatformPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformPhase::Pending => "Pending",
            PlatformPhase::Installing => "Installing",
            PlatformPhase::Ready => "Ready",
            PlatformPhase::Degraded => "Degraded",
            PlatformPhase::Failed => "Failed",
            PlatformPhase::Upgrading => "Upgrading",
            PlatformPhase::Deleting => "Deleting",
        }
    }

    /// Total order used when aggregating component phases into the platform
    /// phase: `Ready < Degraded < Installing/Upgrading < Pending < Failed`.
    /// The platform phase is the worst (highest) component severity.
    #[must_use]
    pub fn severity(&self) -> u8 {
        match self {
            PlatformPhase::Ready => 0,
            PlatformPhase::Degraded => 1,
            PlatformPhase::Installing | PlatformPhase::Upgrading => 2,
            PlatformPhase::Pending => 3,
            PlatformPhase::Failed => 4,
            // Deleting never participates in aggregation
            PlatformPhase::Deleting => 5,
        }
    }

    /// Phases that still make progress without a spec change
    #[must_use]
    pub fn is_progressing(&self) -> bool {
        matches!(
            self,
            PlatformPhase::Pending | PlatformPhase::Installing | PlatformPhase::Upgrading
        )
    }
}

impl std::fmt::Display for PlatformPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of a single component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ComponentPhase {
    #[default]
    Pending,
    Installing,
    Upgrading,
    Ready,
    Degraded,
    Failed,
}

impl ComponentPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentPhase::Pending => "Pending",
            ComponentPhase::Installing => "Installing",
            ComponentPhase::Upgrading => "Upgrading",
            ComponentPhase::Ready => "Ready",
            ComponentPhase::Degraded => "Degraded",
            ComponentPhase::Failed => "Failed",
        }
    }

    /// Map into the platform-phase order for aggregation
    #[must_use]
    pub fn as_platform_phase(&self) -> PlatformPhase {
        match self {
            ComponentPhase::Pending => PlatformPhase::Pending,
            ComponentPhase::Installing => PlatformPhase::Installing,
            ComponentPhase::Upgrading => PlatformPhase::Upgrading,
            ComponentPhase::Ready => PlatformPhase::Ready,
            ComponentPhase::Degraded => PlatformPhase::Degraded,
            ComponentPhase::Failed => PlatformPhase::Failed,
        }
    }
}

impl std::fmt::Display for ComponentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents a status condition for the resource
///
/// One row per condition type, latest-wins. Conditions are never deleted,
/// only updated; transitions emit events.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Stable machine-readable reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Human message describing condition
    #[serde(default)]
    pub message: Option<String>,
}

/// Status derived for a single component from its live artifacts
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    /// Component phase
    #[serde(default)]
    pub phase: ComponentPhase,
    /// Deployed version
    #[serde(default)]
    pub version: Option<String>,
    /// Desired replicas
    #[serde(default)]
    pub replicas: Option<i32>,
    /// Replicas observed ready; never exceeds `replicas`
    #[serde(default)]
    pub ready_replicas: Option<i32>,
    /// Stable in-cluster URL other components consume
    #[serde(default)]
    pub service_url: Option<String>,
    /// Human message
    #[serde(default)]
    pub message: Option<String>,
}

/// A captured spec+status pair used for rollback
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollbackSnapshot {
    /// Snapshot identifier, unique within the Platform
    pub id: String,
    /// Git revision the snapshot was taken at
    pub revision: String,
    /// Capture time, RFC3339
    pub timestamp: String,
    /// Frozen spec as canonical JSON
    pub frozen_spec: serde_json::Value,
    /// Summary of the status at capture time
    #[serde(default)]
    pub frozen_status: Option<FrozenStatusSummary>,
}

/// Trimmed status captured alongside a snapshot
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FrozenStatusSummary {
    #[serde(default)]
    pub phase: Option<PlatformPhase>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub config_hash: Option<String>,
}

/// GitOps sync bookkeeping
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsStatus {
    /// Revision last rendered and applied
    #[serde(default)]
    pub last_synced_revision: Option<String>,
    /// Time of the last successful sync, RFC3339
    #[serde(default)]
    pub last_sync_time: Option<String>,
    /// Fingerprint of the rendered spec at the last sync
    #[serde(default)]
    pub last_synced_fingerprint: Option<String>,
    /// Whether the last drift pass found divergence
    #[serde(default)]
    pub drift_detected: Option<bool>,
    /// Consecutive health failures observed by the rollback policy
    #[serde(default)]
    pub health_failures: Option<u32>,
}

/// Status of the Platform resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatus {
    /// Current phase
    #[serde(default)]
    pub phase: PlatformPhase,
    /// Spec generation the controller has fully caught up to. Advances only
    /// when every enabled component reported Ready for the current
    /// generation; never exceeds `metadata.generation`.
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Fingerprint of the canonicalized spec
    #[serde(default)]
    pub config_hash: Option<String>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Per-component status, keyed by component name
    #[serde(default)]
    pub components: BTreeMap<String, ComponentStatus>,
    /// Validation errors surfaced by the last reconcile
    #[serde(default)]
    pub validation_errors: Vec<String>,
    /// Recorded rollback snapshots, oldest first, bounded history
    #[serde(default)]
    pub snapshots: Vec<RollbackSnapshot>,
    /// GitOps sync bookkeeping
    #[serde(default)]
    pub gitops: Option<GitOpsStatus>,
    /// Last reconciliation time, RFC3339
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
    /// Human-readable description of current state
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_severity_total_order() {
        // Ready < Degraded < Installing/Upgrading < Pending < Failed
        assert!(PlatformPhase::Ready.severity() < PlatformPhase::Degraded.severity());
        assert!(PlatformPhase::Degraded.severity() < PlatformPhase::Installing.severity());
        assert_eq!(
            PlatformPhase::Installing.severity(),
            PlatformPhase::Upgrading.severity()
        );
        assert!(PlatformPhase::Upgrading.severity() < PlatformPhase::Pending.severity());
        assert!(PlatformPhase::Pending.severity() < PlatformPhase::Failed.severity());
    }

    #[test]
    fn test_worst_component_phase_wins() {
        let phases = [
            ComponentPhase::Ready,
            ComponentPhase::Installing,
            ComponentPhase::Degraded,
        ];
        let worst = phases
            .iter()
            .map(ComponentPhase::as_platform_phase)
            .max_by_key(PlatformPhase::severity)
            .unwrap();
        assert_eq!(worst, PlatformPhase::Installing);
    }

    #[test]
    fn test_phase_serializes_as_pascal_case() {
        let s = serde_json::to_string(&PlatformPhase::Upgrading).unwrap();
        assert_eq!(s, "\"Upgrading\"");
        let p: PlatformPhase = serde_json::from_str("\"Degraded\"").unwrap();
        assert_eq!(p, PlatformPhase::Degraded);
    }

    #[test]
    fn test_progressing_phases() {
        assert!(PlatformPhase::Installing.is_progressing());
        assert!(PlatformPhase::Pending.is_progressing());
        assert!(!PlatformPhase::Ready.is_progressing());
        assert!(!PlatformPhase::Failed.is_progressing());
    }
}
