//! # Finalizer & Deletion Flow
//!
//! The operator's finalizer blocks hard deletion until every owned artifact
//! is gone. Deletion runs the managers in reverse-dependency order,
//! tolerates not-found on every artifact, and only then clears the
//! finalizer so the Platform may disappear.

use crate::components::all_managers;
use crate::constants::PLATFORM_FINALIZER;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::events::{emit_event_best_effort, EVENT_NORMAL};
use crate::controller::plan::plan_components;
use crate::crd::Platform;
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use tracing::{debug, info};

/// Whether the operator's finalizer is present
#[must_use]
pub fn has_finalizer(platform: &Platform) -> bool {
    platform
        .metadata
        .finalizers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|f| f == PLATFORM_FINALIZER)
}

/// Ensure the operator's finalizer is present before any artifact exists
pub async fn ensure_finalizer(ctx: &Context, platform: &Platform) -> Result<()> {
    if has_finalizer(platform) {
        return Ok(());
    }

    let mut finalizers = platform.metadata.finalizers.clone().unwrap_or_default();
    finalizers.push(PLATFORM_FINALIZER.to_string());

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Platform> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({"metadata": {"finalizers": finalizers}});
    api.patch(
        &platform.name_any(),
        &PatchParams::apply(crate::constants::FIELD_MANAGER),
        &Patch::Merge(patch),
    )
    .await
    .map_err(Error::from)?;

    debug!("added finalizer to {}", platform.key());
    Ok(())
}

/// Run the deletion flow: tear down every component's artifacts in reverse
/// plan order, then release the finalizer. Safe to retry until empty.
pub async fn finalize_deletion(ctx: &Context, platform: &Platform) -> Result<()> {
    info!("deleting platform {}", platform.key());

    let managers = all_managers();
    let mut order = plan_components(platform);
    // Also sweep components that were disabled after artifacts were made
    for manager in &managers {
        if !order.contains(&manager.kind()) {
            order.push(manager.kind());
        }
    }
    order.reverse();

    for kind in order {
        if let Some(manager) = managers.iter().find(|m| m.kind() == kind) {
            manager.delete(ctx, platform).await?;
        }
    }

    if let Some(gitops) = &platform.spec.gitops {
        crate::gitops::source::delete_source_objects(ctx, platform, gitops).await?;
    }

    remove_finalizer(ctx, platform).await?;
    ctx.backoffs.forget(&platform.key());

    emit_event_best_effort(
        &ctx.client,
        platform,
        EVENT_NORMAL,
        "PlatformDeleted",
        "all owned artifacts removed, finalizer released",
    )
    .await;
    Ok(())
}

async fn remove_finalizer(ctx: &Context, platform: &Platform) -> Result<()> {
    if !has_finalizer(platform) {
        return Ok(());
    }

    let finalizers: Vec<String> = platform
        .metadata
        .finalizers
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|f| f != PLATFORM_FINALIZER)
        .collect();

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Platform> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({"metadata": {"finalizers": finalizers}});
    api.patch(
        &platform.name_any(),
        &PatchParams::apply(crate::constants::FIELD_MANAGER),
        &Patch::Merge(patch),
    )
    .await
    .map_err(Error::from)?;

    info!("released finalizer on {}", platform.key());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ComponentsSpec, PlatformSpec};

    #[test]
    fn test_finalizer_detection() {
        let mut p = Platform::new(
            "prod",
            PlatformSpec {
                components: ComponentsSpec::default(),
                paused: false,
                high_availability: None,
                backup: None,
                installer: None,
                image_registry: None,
                gitops: None,
                cost: None,
                tenant: None,
                service_mesh: None,
            },
        );
        assert!(!has_finalizer(&p));
        p.metadata.finalizers = Some(vec![PLATFORM_FINALIZER.to_string()]);
        assert!(has_finalizer(&p));
        p.metadata.finalizers = Some(vec!["other.io/finalizer".to_string()]);
        assert!(!has_finalizer(&p));
    }
}
