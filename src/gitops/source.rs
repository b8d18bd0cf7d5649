//! # Source Objects
//!
//! Pull-based bindings own a GitRepository source object and a deployment
//! object per Platform, managed dynamically against the GitOps toolchain's
//! CRDs. Application-based bindings clone directly and own nothing here.
//!
//! A sync must observe its own source reaching Ready before the deployment
//! object is reconciled; `wait_for_ready` polls up to a deadline.

use crate::client::owner_reference;
use crate::constants::{
    DEFAULT_DEPLOYMENT_READY_DEADLINE_SECS, DEFAULT_SOURCE_READY_DEADLINE_SECS,
};
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::crd::{GitOpsProvider, GitOpsSpec, Platform};
use kube::api::{Api, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::core::ApiResource;
use kube::ResourceExt;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

fn git_repository_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind {
        group: "source.toolkit.fluxcd.io".to_string(),
        version: "v1".to_string(),
        kind: "GitRepository".to_string(),
    })
}

fn kustomization_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind {
        group: "kustomize.toolkit.fluxcd.io".to_string(),
        version: "v1".to_string(),
        kind: "Kustomization".to_string(),
    })
}

/// Name of the owned source object
#[must_use]
pub fn source_name(platform: &Platform) -> String {
    format!("{}-source", platform.name_any())
}

/// Name of the owned deployment object
#[must_use]
pub fn deployment_name(platform: &Platform) -> String {
    format!("{}-deploy", platform.name_any())
}

/// Ensure the source and deployment objects exist and match the binding
pub async fn ensure_source_objects(
    ctx: &Context,
    platform: &Platform,
    gitops: &GitOpsSpec,
) -> Result<()> {
    if gitops.provider != GitOpsProvider::Flux {
        return Ok(());
    }

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());

    let source_api: Api<DynamicObject> =
        Api::namespaced_with(ctx.client.clone(), &namespace, &git_repository_resource());
    let mut source = DynamicObject::new(&source_name(platform), &git_repository_resource())
        .within(&namespace);
    source.metadata.owner_references = Some(vec![owner_reference(platform)]);
    source.data = json!({
        "spec": {
            "url": gitops.repository.url,
            "ref": {"branch": gitops.repository.branch},
            "interval": gitops.repository.poll_interval,
            "secretRef": gitops.repository.secret_ref.as_ref().map(|s| json!({"name": s})),
        },
    });
    ctx.cluster
        .apply(&source_api, &source_name(platform), &source)
        .await?;

    let deploy_api: Api<DynamicObject> =
        Api::namespaced_with(ctx.client.clone(), &namespace, &kustomization_resource());
    let mut deployment = DynamicObject::new(&deployment_name(platform), &kustomization_resource())
        .within(&namespace);
    deployment.metadata.owner_references = Some(vec![owner_reference(platform)]);
    deployment.data = json!({
        "spec": {
            "interval": gitops.repository.poll_interval,
            "path": gitops.repository.path.as_deref().unwrap_or("."),
            "prune": gitops.prune,
            "sourceRef": {"kind": "GitRepository", "name": source_name(platform)},
            "retryInterval": "2m",
            "healthChecks": [],
        },
    });
    ctx.cluster
        .apply(&deploy_api, &deployment_name(platform), &deployment)
        .await?;

    debug!("ensured source objects for {}", platform.key());
    Ok(())
}

/// Delete the owned source objects, tolerating their absence and missing
/// CRDs alike
pub async fn delete_source_objects(
    ctx: &Context,
    platform: &Platform,
    gitops: &GitOpsSpec,
) -> Result<()> {
    if gitops.provider != GitOpsProvider::Flux {
        return Ok(());
    }

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    for (ar, name) in [
        (kustomization_resource(), deployment_name(platform)),
        (git_repository_resource(), source_name(platform)),
    ] {
        let api: Api<DynamicObject> = Api::namespaced_with(ctx.client.clone(), &namespace, &ar);
        match api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(resp)) if resp.code == 404 => {}
            Err(e) => return Err(Error::from(e)),
        }
    }
    Ok(())
}

/// Whether a dynamic object reports the Ready=True condition
#[must_use]
pub fn is_ready(object: &DynamicObject) -> bool {
    object
        .data
        .get("status")
        .and_then(|s| s.get("conditions"))
        .and_then(|c| c.as_array())
        .and_then(|conditions| {
            conditions.iter().find(|c| {
                c.get("type").and_then(|t| t.as_str()) == Some("Ready")
            })
        })
        .and_then(|c| c.get("status"))
        .and_then(|s| s.as_str())
        == Some("True")
}

/// Revision the source object last fetched
#[must_use]
pub fn source_revision(object: &DynamicObject) -> Option<String> {
    object
        .data
        .get("status")
        .and_then(|s| s.get("artifact"))
        .and_then(|a| a.get("revision"))
        .and_then(|r| r.as_str())
        .map(String::from)
}

/// Poll the source object until Ready, up to the source deadline
pub async fn wait_for_source_ready(ctx: &Context, platform: &Platform) -> Result<DynamicObject> {
    wait_for_ready(
        ctx,
        platform,
        &git_repository_resource(),
        &source_name(platform),
        Duration::from_secs(DEFAULT_SOURCE_READY_DEADLINE_SECS),
    )
    .await
}

/// Poll the deployment object until Ready, up to the deployment deadline
pub async fn wait_for_deployment_ready(ctx: &Context, platform: &Platform) -> Result<DynamicObject> {
    wait_for_ready(
        ctx,
        platform,
        &kustomization_resource(),
        &deployment_name(platform),
        Duration::from_secs(DEFAULT_DEPLOYMENT_READY_DEADLINE_SECS),
    )
    .await
}

async fn wait_for_ready(
    ctx: &Context,
    platform: &Platform,
    ar: &ApiResource,
    name: &str,
    deadline: Duration,
) -> Result<DynamicObject> {
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<DynamicObject> = Api::namespaced_with(ctx.client.clone(), &namespace, ar);

    let started = std::time::Instant::now();
    loop {
        match api.get_opt(name).await.map_err(Error::from)? {
            Some(object) if is_ready(&object) => {
                info!("{name} is ready after {:.0?}", started.elapsed());
                return Ok(object);
            }
            Some(_) => debug!("{name} not ready yet"),
            None => debug!("{name} does not exist yet"),
        }

        if started.elapsed() >= deadline {
            return Err(Error::BackendUnavailable(format!(
                "{name} did not reach Ready within {}s",
                deadline.as_secs()
            )));
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

/// Force-annotate the source so the toolchain re-fetches immediately
pub async fn request_source_sync(ctx: &Context, platform: &Platform) -> Result<()> {
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<DynamicObject> =
        Api::namespaced_with(ctx.client.clone(), &namespace, &git_repository_resource());
    let patch = json!({
        "metadata": {
            "annotations": {
                "reconcile.fluxcd.io/requestedAt": chrono::Utc::now().to_rfc3339(),
            },
        },
    });
    api.patch(
        &source_name(platform),
        &PatchParams::apply(crate::constants::FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await
    .map_err(Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_with_status(status: serde_json::Value) -> DynamicObject {
        let mut object = DynamicObject::new("test", &git_repository_resource());
        object.data = json!({"status": status});
        object
    }

    #[test]
    fn test_ready_condition_probe() {
        let ready = object_with_status(json!({
            "conditions": [{"type": "Ready", "status": "True"}],
        }));
        assert!(is_ready(&ready));

        let not_ready = object_with_status(json!({
            "conditions": [{"type": "Ready", "status": "False", "reason": "Cloning"}],
        }));
        assert!(!is_ready(&not_ready));

        let no_status = DynamicObject::new("test", &git_repository_resource());
        assert!(!is_ready(&no_status));
    }

    #[test]
    fn test_source_revision_extraction() {
        let object = object_with_status(json!({
            "artifact": {"revision": "main@sha1:abc123"},
        }));
        assert_eq!(source_revision(&object).as_deref(), Some("main@sha1:abc123"));
        assert!(source_revision(&DynamicObject::new("x", &git_repository_resource())).is_none());
    }
}
