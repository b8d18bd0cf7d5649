//! # Status Aggregation
//!
//! Computes the platform phase from component phases, the canonical config
//! hash, and the observedGeneration advancement rule, then writes the
//! status subresource only when it actually changed. Conditions are
//! upserted latest-wins per type and never deleted; transitions emit
//! events.

use crate::components::common::merge::content_hash;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::events::{emit_event_best_effort, EVENT_NORMAL, EVENT_WARNING};
use crate::crd::{
    ComponentPhase, ComponentStatus, Condition, Platform, PlatformPhase, PlatformStatus,
};
use crate::observability::metrics;
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

/// Canonical fingerprint of the spec; stable under map key order
#[must_use]
pub fn config_hash(platform: &Platform) -> String {
    let value = serde_json::to_value(&platform.spec).unwrap_or_default();
    content_hash(&value)
}

/// Worst component phase under the documented total order
/// `Ready < Degraded < Installing/Upgrading < Pending < Failed`
#[must_use]
pub fn aggregate_phase(
    enabled: &[crate::crd::ComponentKind],
    statuses: &BTreeMap<String, ComponentStatus>,
) -> PlatformPhase {
    let mut worst = PlatformPhase::Ready;
    for kind in enabled {
        let phase = statuses
            .get(kind.as_str())
            .map_or(ComponentPhase::Pending, |s| s.phase)
            .as_platform_phase();
        if phase.severity() > worst.severity() {
            worst = phase;
        }
    }
    if enabled.is_empty() {
        PlatformPhase::Pending
    } else {
        worst
    }
}

/// Upsert a condition row, bumping lastTransitionTime only on a real
/// status change. One row per type, latest wins, never deleted.
pub fn upsert_condition(conditions: &mut Vec<Condition>, mut incoming: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.r#type == incoming.r#type) {
        Some(existing) => {
            let transitioned = existing.status != incoming.status;
            if !transitioned {
                incoming.last_transition_time = existing.last_transition_time.clone();
            }
            let changed = transitioned
                || existing.reason != incoming.reason
                || existing.message != incoming.message;
            *existing = incoming;
            changed
        }
        None => {
            conditions.push(incoming);
            true
        }
    }
}

/// Assemble the new status for a finished reconcile pass
#[must_use]
pub fn assemble_status(
    platform: &Platform,
    statuses: BTreeMap<String, ComponentStatus>,
    validation_errors: Vec<String>,
    message: Option<String>,
) -> PlatformStatus {
    let enabled = crate::controller::plan::plan_components(platform);
    let phase = if !validation_errors.is_empty() {
        PlatformPhase::Failed
    } else {
        aggregate_phase(&enabled, &statuses)
    };

    let previous = platform.status.clone().unwrap_or_default();
    let generation = platform.metadata.generation;

    // observedGeneration advances only when every enabled component
    // reported Ready for the current generation; it never exceeds
    // metadata.generation and never regresses
    let observed_generation = if phase == PlatformPhase::Ready {
        generation
    } else {
        previous.observed_generation
    };

    let mut conditions = previous.conditions.clone();
    let now = chrono::Utc::now().to_rfc3339();
    let (ready_status, ready_reason) = match phase {
        PlatformPhase::Ready => ("True", "ReconciliationSucceeded"),
        PlatformPhase::Failed => ("False", "ReconciliationFailed"),
        PlatformPhase::Degraded => ("False", "ComponentsDegraded"),
        _ => ("False", "ReconciliationInProgress"),
    };
    upsert_condition(
        &mut conditions,
        Condition {
            r#type: "Ready".to_string(),
            status: ready_status.to_string(),
            last_transition_time: Some(now.clone()),
            reason: Some(ready_reason.to_string()),
            message: message.clone(),
        },
    );
    upsert_condition(
        &mut conditions,
        Condition {
            r#type: "Validated".to_string(),
            status: if validation_errors.is_empty() { "True" } else { "False" }.to_string(),
            last_transition_time: Some(now.clone()),
            reason: Some(
                if validation_errors.is_empty() {
                    "SpecValid"
                } else {
                    "SpecInvalid"
                }
                .to_string(),
            ),
            message: validation_errors.first().cloned(),
        },
    );

    PlatformStatus {
        phase,
        observed_generation,
        config_hash: Some(config_hash(platform)),
        conditions,
        components: statuses,
        validation_errors,
        snapshots: previous.snapshots,
        gitops: previous.gitops,
        last_reconcile_time: Some(now),
        message,
    }
}

/// Write the status subresource when it differs from the live one, emitting
/// a phase-transition event and refreshing the readiness gauges
pub async fn write_status(ctx: &Context, platform: &Platform, status: PlatformStatus) -> Result<()> {
    let previous_phase = platform
        .status
        .as_ref()
        .map_or(PlatformPhase::Pending, |s| s.phase);

    for (component, component_status) in &status.components {
        metrics::set_component_ready(
            &platform.name_any(),
            component,
            component_status.phase == ComponentPhase::Ready,
        );
    }

    if !status_changed(platform.status.as_ref(), &status) {
        debug!("status unchanged for {}, skipping write", platform.key());
        return Ok(());
    }

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Platform> = Api::namespaced(ctx.client.clone(), &namespace);
    let new_phase = status.phase;
    let patch = serde_json::json!({"status": status});
    api.patch_status(
        &platform.name_any(),
        &PatchParams::apply(crate::constants::FIELD_MANAGER),
        &Patch::Merge(patch),
    )
    .await
    .map_err(Error::from)?;

    if new_phase != previous_phase {
        let event_type = match new_phase {
            PlatformPhase::Failed | PlatformPhase::Degraded => EVENT_WARNING,
            _ => EVENT_NORMAL,
        };
        emit_event_best_effort(
            &ctx.client,
            platform,
            event_type,
            &format!("Phase{new_phase}"),
            &format!("platform phase changed from {previous_phase} to {new_phase}"),
        )
        .await;
    }

    Ok(())
}

/// Whether the assembled status differs from the live one in anything but
/// timestamps. Skipping no-op writes keeps watch churn down.
fn status_changed(live: Option<&PlatformStatus>, assembled: &PlatformStatus) -> bool {
    let Some(live) = live else {
        return true;
    };
    if live.phase != assembled.phase
        || live.observed_generation != assembled.observed_generation
        || live.config_hash != assembled.config_hash
        || live.validation_errors != assembled.validation_errors
        || live.message != assembled.message
        || live.components != assembled.components
    {
        return true;
    }
    // Compare conditions without their transition timestamps
    let strip = |conditions: &[Condition]| -> Vec<(String, String, Option<String>, Option<String>)> {
        conditions
            .iter()
            .map(|c| (c.r#type.clone(), c.status.clone(), c.reason.clone(), c.message.clone()))
            .collect()
    };
    strip(&live.conditions) != strip(&assembled.conditions)
}
