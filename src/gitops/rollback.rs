//! # Rollback Snapshots
//!
//! A snapshot freezes the spec (and a status summary) before any
//! platform-changing sync. History is bounded; eviction is oldest-first.
//! Restoring pins the Git source to the snapshot's revision and re-applies
//! the frozen spec.

use crate::constants::DEFAULT_SNAPSHOT_HISTORY;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::crd::{FrozenStatusSummary, Platform, RollbackSnapshot};
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use tracing::info;

/// Build a snapshot of the platform as it stands
#[must_use]
pub fn capture_snapshot(platform: &Platform, revision: &str) -> RollbackSnapshot {
    let frozen_spec = serde_json::to_value(&platform.spec).unwrap_or_default();
    let status = platform.status.as_ref();
    RollbackSnapshot {
        id: format!("{}-{}", revision_short(revision), chrono::Utc::now().timestamp()),
        revision: revision.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        frozen_spec,
        frozen_status: status.map(|s| FrozenStatusSummary {
            phase: Some(s.phase),
            observed_generation: s.observed_generation,
            config_hash: s.config_hash.clone(),
        }),
    }
}

/// Append a snapshot under the bounded history, evicting oldest-first
#[must_use]
pub fn push_snapshot(
    mut snapshots: Vec<RollbackSnapshot>,
    snapshot: RollbackSnapshot,
    max_history: usize,
) -> Vec<RollbackSnapshot> {
    snapshots.push(snapshot);
    let excess = snapshots.len().saturating_sub(max_history.max(1));
    if excess > 0 {
        snapshots.drain(..excess);
    }
    snapshots
}

/// Record a snapshot on the Platform status before a platform-changing sync
pub async fn record_snapshot(ctx: &Context, platform: &Platform, revision: &str) -> Result<()> {
    let max_history = platform
        .spec
        .gitops
        .as_ref()
        .and_then(|g| g.rollback.as_ref())
        .and_then(|r| r.max_history)
        .map_or(DEFAULT_SNAPSHOT_HISTORY, |m| m as usize);

    let existing = platform
        .status
        .as_ref()
        .map(|s| s.snapshots.clone())
        .unwrap_or_default();
    let snapshots = push_snapshot(existing, capture_snapshot(platform, revision), max_history);

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Platform> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({"status": {"snapshots": snapshots}});
    api.patch_status(
        &platform.name_any(),
        &PatchParams::apply(crate::constants::FIELD_MANAGER),
        &Patch::Merge(patch),
    )
    .await
    .map_err(Error::from)?;
    Ok(())
}

/// Find the snapshot recorded for a revision, or the latest when the
/// revision is empty
#[must_use]
pub fn find_snapshot<'a>(
    snapshots: &'a [RollbackSnapshot],
    revision: &str,
) -> Option<&'a RollbackSnapshot> {
    if revision.is_empty() {
        snapshots.last()
    } else {
        snapshots.iter().rev().find(|s| s.revision == revision || s.id == revision)
    }
}

/// Restore a snapshot: re-apply the frozen spec. The caller pins the Git
/// source to the snapshot's revision and resyncs.
pub async fn restore_snapshot(
    ctx: &Context,
    platform: &Platform,
    snapshot: &RollbackSnapshot,
) -> Result<()> {
    info!(
        "restoring {} to snapshot {} (revision {})",
        platform.key(),
        snapshot.id,
        snapshot.revision
    );

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Platform> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({"spec": snapshot.frozen_spec});
    api.patch(
        &platform.name_any(),
        &PatchParams::apply(crate::constants::FIELD_MANAGER),
        &Patch::Merge(patch),
    )
    .await
    .map_err(Error::from)?;
    Ok(())
}

fn revision_short(revision: &str) -> &str {
    let hash = revision.rsplit(':').next().unwrap_or(revision);
    &hash[..hash.len().min(8)]
}
