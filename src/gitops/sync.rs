//! # GitOps Sync Controller
//!
//! Binds Platforms to their Git source of truth. On each poll interval the
//! latest revision is fetched and the Platform spec is rendered from the
//! repository path. When the rendered content differs from the live spec by
//! fingerprint, a snapshot is recorded and the rendered spec is applied.
//! Drift detection and automatic rollback ride the same loop.

use crate::components::common::merge::content_hash;
use crate::constants::{
    DEFAULT_GIT_POLL_INTERVAL_SECS, PROMOTE_ANNOTATION, ROLLBACK_ANNOTATION, SYNC_ANNOTATION,
};
use crate::controller::context::Context;
use crate::controller::error::{Error, ErrorKind};
use crate::controller::events::{emit_event_best_effort, EVENT_NORMAL, EVENT_WARNING};
use crate::crd::{
    DriftAction, GitOpsProvider, GitOpsSpec, ImageAutomationSpec, Platform, PlatformPhase,
};
use crate::observability::metrics;
use crate::validation::Retention;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::drift::DriftReport;
use super::git::{GitCredentials, GitWorkspace};
use super::promotion::GateResult;
use super::rollback::{find_snapshot, record_snapshot, restore_snapshot};
use super::source;

/// GitOps reconcile entry point; runs as its own controller co-resident
/// with the platform reconciler
pub async fn reconcile_gitops(platform: Arc<Platform>, ctx: Arc<Context>) -> Result<Action, Error> {
    let Some(gitops) = platform.spec.gitops.clone() else {
        return Ok(Action::await_change());
    };
    let key = platform.key();
    let name = platform.name_any();

    // Operator-requested operations ride annotations, cleared after honoring
    if let Some(revision) = annotation(&platform, ROLLBACK_ANNOTATION) {
        handle_rollback(&ctx, &platform, &revision).await?;
        clear_annotation(&ctx, &platform, ROLLBACK_ANNOTATION).await;
        return Ok(Action::requeue(Duration::from_secs(5)));
    }
    if let Some(to_env) = annotation(&platform, PROMOTE_ANNOTATION) {
        match super::promotion::promote(&ctx, &platform, &to_env).await? {
            GateResult::Passed => {
                clear_annotation(&ctx, &platform, PROMOTE_ANNOTATION).await;
                emit_event_best_effort(
                    &ctx.client,
                    &platform,
                    EVENT_NORMAL,
                    "Promoted",
                    &format!("promoted to environment {to_env}"),
                )
                .await;
            }
            GateResult::Blocked(reason) => {
                // Gates still holding; keep the annotation and retry
                emit_event_best_effort(
                    &ctx.client,
                    &platform,
                    EVENT_NORMAL,
                    "PromotionBlocked",
                    &reason,
                )
                .await;
                return Ok(Action::requeue(Duration::from_secs(30)));
            }
        }
    }
    let forced_sync = annotation(&platform, SYNC_ANNOTATION).is_some();

    // Source objects for the pull-based flavor. A forced sync observes its
    // source reaching Ready before proceeding to the deployment object,
    // then holds until the deployment object is Ready too; each wait has
    // its own deadline.
    source::ensure_source_objects(&ctx, &platform, &gitops).await?;
    if forced_sync && gitops.provider == GitOpsProvider::Flux {
        source::request_source_sync(&ctx, &platform).await?;
        let _ = source::wait_for_source_ready(&ctx, &platform).await?;
        let _ = source::wait_for_deployment_ready(&ctx, &platform).await?;
    }

    // Fetch and render
    let credentials = resolve_credentials(&ctx, &platform, &gitops).await?;
    let workspace = GitWorkspace::clone(&gitops.repository.url, &gitops.repository.branch, credentials).await?;
    let revision = workspace.revision().await?;
    let rendered = render_platform_spec(&workspace, gitops.repository.path.as_deref())?;
    drop(workspace);

    let rendered_fingerprint = content_hash(&rendered);
    let live_spec = serde_json::to_value(&platform.spec).unwrap_or_default();
    let live_fingerprint = content_hash(&live_spec);

    let previous = platform
        .status
        .as_ref()
        .and_then(|s| s.gitops.clone())
        .unwrap_or_default();

    let mut drift_detected = false;

    if rendered_fingerprint == live_fingerprint {
        debug!("{key} matches rendered state at {revision}");
    } else if previous.last_synced_fingerprint.as_deref() == Some(rendered_fingerprint.as_str())
        && !forced_sync
    {
        // The rendered state was applied before and the live spec moved:
        // that is drift, not a new revision to roll out
        let ignore = gitops
            .drift
            .as_ref()
            .and_then(|d| d.ignore_paths.clone())
            .unwrap_or_default();
        let report = DriftReport::for_platform(&platform, &rendered, &live_spec, &ignore);
        drift_detected = !report.is_empty();

        // Version-only drift flows back to Git when image automation is
        // enabled: the live bump becomes a commit instead of a reversion
        let automation = gitops.image_automation.as_ref().filter(|a| {
            a.enabled && drift_detected && version_paths_only(&report.drifted_field_paths)
        });
        if let Some(automation) = automation {
            commit_image_updates(
                &ctx,
                &platform,
                &gitops,
                automation,
                &live_spec,
                &report.drifted_field_paths,
            )
            .await?;
            emit_event_best_effort(
                &ctx.client,
                &platform,
                EVENT_NORMAL,
                "ImageAutomationCommit",
                &format!("committed version changes to {}", automation.branch),
            )
            .await;
            metrics::set_gitops_drift(&name, false);
            drift_detected = false;
        } else if drift_detected {
            metrics::set_gitops_drift(&name, true);
            let action = gitops.drift.as_ref().map_or(DriftAction::Notify, |d| d.action);
            emit_event_best_effort(
                &ctx.client,
                &platform,
                EVENT_WARNING,
                "DriftDetected",
                &format!("drift from {revision} on {}", report.summary()),
            )
            .await;

            if action == DriftAction::Remediate {
                record_snapshot(&ctx, &platform, &revision).await?;
                apply_rendered_spec(&ctx, &platform, &rendered).await?;
                metrics::increment_gitops_sync(&name, "remediated");
                emit_event_best_effort(
                    &ctx.client,
                    &platform,
                    EVENT_NORMAL,
                    "DriftRemediated",
                    "re-applied rendered spec over out-of-band changes",
                )
                .await;
                drift_detected = false;
            }
        } else {
            metrics::set_gitops_drift(&name, false);
        }
    } else {
        // New rendered content: snapshot the current state, then apply
        info!("syncing {key} to revision {revision}");
        record_snapshot(&ctx, &platform, &revision).await?;
        apply_rendered_spec(&ctx, &platform, &rendered).await?;
        metrics::increment_gitops_sync(&name, "applied");
        emit_event_best_effort(
            &ctx.client,
            &platform,
            EVENT_NORMAL,
            "SyncApplied",
            &format!("applied rendered spec from {revision}"),
        )
        .await;
    }

    if forced_sync {
        clear_annotation(&ctx, &platform, SYNC_ANNOTATION).await;
    }

    let health_failures = evaluate_auto_rollback(&ctx, &platform, &gitops, previous.health_failures).await?;

    write_gitops_status(
        &ctx,
        &platform,
        crate::crd::GitOpsStatus {
            last_synced_revision: Some(revision),
            last_sync_time: Some(chrono::Utc::now().to_rfc3339()),
            last_synced_fingerprint: Some(rendered_fingerprint),
            drift_detected: Some(drift_detected),
            health_failures: Some(health_failures),
        },
    )
    .await?;

    Ok(Action::requeue(poll_interval(&gitops)))
}

/// Error policy for the GitOps controller: backend failures back off, the
/// rest ride the poll cadence
pub fn gitops_error_policy(platform: Arc<Platform>, error: &Error, ctx: Arc<Context>) -> Action {
    let key = format!("gitops:{}", platform.key());
    metrics::increment_gitops_sync(&platform.name_any(), "error");
    metrics::increment_error_kind(error.kind().as_str());

    match error.kind() {
        ErrorKind::ConfigInvalid | ErrorKind::VersionUnsupported => Action::await_change(),
        ErrorKind::BackendUnavailable | ErrorKind::Transient => {
            let delay = ctx.backoffs.next_delay(
                &key,
                ctx.config.backoff_base_secs,
                ctx.config.backoff_cap_secs,
            );
            warn!("gitops retry for {key} after {}s: {error}", delay.as_secs());
            Action::requeue(delay)
        }
        _ => Action::requeue(Duration::from_secs(DEFAULT_GIT_POLL_INTERVAL_SECS)),
    }
}

/// Resolve Git credentials from the referenced secret
pub async fn resolve_credentials(
    ctx: &Context,
    platform: &Platform,
    gitops: &GitOpsSpec,
) -> Result<GitCredentials, Error> {
    let Some(secret_name) = gitops.repository.secret_ref.as_deref() else {
        return Ok(GitCredentials::default());
    };

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Secret> = ctx.cluster.namespaced(&namespace);
    let secret = api
        .get_opt(secret_name)
        .await
        .map_err(Error::from)?
        .ok_or_else(|| {
            Error::ConfigInvalid(format!("git credentials secret '{secret_name}' not found"))
        })?;

    let get = |key: &str| -> Option<String> {
        secret
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .and_then(|v| String::from_utf8(v.0.clone()).ok())
    };

    Ok(GitCredentials {
        username: get("username"),
        password: get("password"),
        ssh_key: get("identity"),
    })
}

/// Render the Platform spec from the repository path. The file may hold a
/// full Platform manifest (its `spec` is taken) or a bare spec document.
pub fn render_platform_spec(
    workspace: &GitWorkspace,
    path: Option<&str>,
) -> Result<serde_json::Value, Error> {
    let content = workspace.fetch_file(&rendered_file_path(path))?;
    parse_rendered_spec(&content)
}

/// Parse rendered YAML into the spec document
pub fn parse_rendered_spec(content: &str) -> Result<serde_json::Value, Error> {
    let doc: serde_json::Value = serde_yaml::from_str(content)
        .map_err(|e| Error::ConfigInvalid(format!("unparseable rendered platform spec: {e}")))?;

    let spec = match doc.get("spec") {
        Some(spec) if doc.get("kind").is_some() => spec.clone(),
        _ => doc,
    };

    // Round-trip through the typed spec so invalid renders fail the sync
    // rather than landing on the cluster
    let typed: crate::crd::PlatformSpec = serde_json::from_value(spec.clone())
        .map_err(|e| Error::ConfigInvalid(format!("rendered spec does not validate: {e}")))?;
    let spec = serde_json::to_value(&typed).map_err(|e| Error::Transient(e.to_string()))?;

    // Apply the same defaults the mutating webhook injects; without this a
    // rendered spec that omits versions would look permanently drifted from
    // its defaulted live copy
    apply_operator_defaults(spec, typed)
}

fn apply_operator_defaults(
    spec: serde_json::Value,
    typed: crate::crd::PlatformSpec,
) -> Result<serde_json::Value, Error> {
    let rendered_platform = Platform::new("rendered", typed);
    let patch = json_patch::Patch(crate::admission::review::default_patches(&rendered_platform));
    if patch.0.is_empty() {
        return Ok(spec);
    }

    let mut doc = serde_json::json!({"spec": spec});
    json_patch::patch(&mut doc, &patch)
        .map_err(|e| Error::ConfigInvalid(format!("defaulting rendered spec failed: {e}")))?;
    Ok(doc
        .get_mut("spec")
        .map(serde_json::Value::take)
        .unwrap_or_default())
}

async fn apply_rendered_spec(
    ctx: &Context,
    platform: &Platform,
    rendered: &serde_json::Value,
) -> Result<(), Error> {
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Platform> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({"spec": rendered});
    api.patch(
        &platform.name_any(),
        &PatchParams::apply(crate::constants::FIELD_MANAGER),
        &Patch::Merge(patch),
    )
    .await
    .map_err(Error::from)?;
    Ok(())
}

async fn handle_rollback(ctx: &Context, platform: &Platform, revision: &str) -> Result<(), Error> {
    let snapshots = platform
        .status
        .as_ref()
        .map(|s| s.snapshots.clone())
        .unwrap_or_default();
    let Some(snapshot) = find_snapshot(&snapshots, revision) else {
        emit_event_best_effort(
            &ctx.client,
            platform,
            EVENT_WARNING,
            "RollbackFailed",
            &format!("no snapshot recorded for revision '{revision}'"),
        )
        .await;
        return Ok(());
    };

    restore_snapshot(ctx, platform, snapshot).await?;
    emit_event_best_effort(
        &ctx.client,
        platform,
        EVENT_NORMAL,
        "RolledBack",
        &format!("restored snapshot {} (revision {})", snapshot.id, snapshot.revision),
    )
    .await;
    Ok(())
}

/// Track consecutive health failures and fire the automatic rollback when
/// the threshold holds
async fn evaluate_auto_rollback(
    ctx: &Context,
    platform: &Platform,
    gitops: &GitOpsSpec,
    previous_failures: Option<u32>,
) -> Result<u32, Error> {
    let Some(policy) = gitops.rollback.as_ref().filter(|r| r.automatic) else {
        return Ok(0);
    };

    let phase = platform
        .status
        .as_ref()
        .map_or(PlatformPhase::Pending, |s| s.phase);
    let failing = matches!(phase, PlatformPhase::Failed | PlatformPhase::Degraded);
    if !failing {
        return Ok(0);
    }

    let failures = previous_failures.unwrap_or(0) + 1;
    if failures < policy.failure_threshold {
        debug!(
            "{} health failure {}/{} before automatic rollback",
            platform.key(),
            failures,
            policy.failure_threshold
        );
        return Ok(failures);
    }

    let snapshots = platform
        .status
        .as_ref()
        .map(|s| s.snapshots.clone())
        .unwrap_or_default();
    if let Some(snapshot) = find_snapshot(&snapshots, "") {
        warn!(
            "automatic rollback of {} after {failures} health failures",
            platform.key()
        );
        restore_snapshot(ctx, platform, snapshot).await?;
        emit_event_best_effort(
            &ctx.client,
            platform,
            EVENT_WARNING,
            "AutoRollback",
            &format!(
                "health failing for {failures} checks, restored snapshot {}",
                snapshot.id
            ),
        )
        .await;
    }
    Ok(0)
}

async fn write_gitops_status(
    ctx: &Context,
    platform: &Platform,
    status: crate::crd::GitOpsStatus,
) -> Result<(), Error> {
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Platform> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({"status": {"gitops": status}});
    api.patch_status(
        &platform.name_any(),
        &PatchParams::apply(crate::constants::FIELD_MANAGER),
        &Patch::Merge(patch),
    )
    .await
    .map_err(Error::from)?;
    Ok(())
}

/// Whether every drifted path is a component version field
#[must_use]
pub fn version_paths_only(drifted: &[String]) -> bool {
    !drifted.is_empty()
        && drifted
            .iter()
            .all(|p| p.starts_with("spec.components.") && p.ends_with(".version"))
}

/// Commit live component versions back to the automation branch. This is
/// the only push path; it uses the fixed author identity and the templated
/// message.
async fn commit_image_updates(
    ctx: &Context,
    platform: &Platform,
    gitops: &GitOpsSpec,
    automation: &ImageAutomationSpec,
    live_spec: &serde_json::Value,
    drifted: &[String],
) -> Result<(), Error> {
    let credentials = resolve_credentials(ctx, platform, gitops).await?;
    let workspace =
        GitWorkspace::clone(&gitops.repository.url, &automation.branch, credentials).await?;

    let rel_path = rendered_file_path(gitops.repository.path.as_deref());
    let content = workspace.fetch_file(&rel_path)?;
    let mut doc: serde_json::Value = serde_yaml::from_str(&content)
        .map_err(|e| Error::ConfigInvalid(format!("unparseable rendered platform spec: {e}")))?;

    let mut messages = Vec::new();
    for path in drifted {
        // spec.components.<name>.version
        let Some(component) = path
            .strip_prefix("spec.components.")
            .and_then(|p| p.strip_suffix(".version"))
        else {
            continue;
        };
        let Some(version) = live_spec
            .get("components")
            .and_then(|c| c.get(component))
            .and_then(|c| c.get("version"))
            .cloned()
        else {
            continue;
        };

        let target = if doc.get("kind").is_some() {
            doc.pointer_mut(&format!("/spec/components/{component}"))
        } else {
            doc.pointer_mut(&format!("/components/{component}"))
        };
        if let Some(target) = target {
            messages.push(
                automation
                    .message_template
                    .replace("{component}", component)
                    .replace("{version}", version.as_str().unwrap_or_default()),
            );
            target["version"] = version;
        }
    }

    if messages.is_empty() {
        return Ok(());
    }

    let updated = serde_yaml::to_string(&doc)
        .map_err(|e| Error::Transient(format!("unserializable rendered spec: {e}")))?;
    workspace.write_file(&rel_path, &updated)?;
    workspace
        .commit_and_push(&automation.branch, &automation.author, &messages.join("; "))
        .await?;

    info!(
        "image automation pushed {} update(s) for {}",
        messages.len(),
        platform.key()
    );
    Ok(())
}

/// Path of the rendered platform file within the repository
fn rendered_file_path(path: Option<&str>) -> String {
    let rel_path = path.unwrap_or("platform.yaml");
    if rel_path.ends_with(".yaml") || rel_path.ends_with(".yml") {
        rel_path.to_string()
    } else {
        format!("{}/platform.yaml", rel_path.trim_end_matches('/'))
    }
}

fn poll_interval(gitops: &GitOpsSpec) -> Duration {
    let poll = Retention::parse(&gitops.repository.poll_interval)
        .map(|r| r.as_duration())
        .unwrap_or(Duration::from_secs(DEFAULT_GIT_POLL_INTERVAL_SECS));
    let drift = gitops
        .drift
        .as_ref()
        .and_then(|d| Retention::parse(&d.interval).ok())
        .map(|r| r.as_duration());
    match drift {
        Some(drift) => poll.min(drift),
        None => poll,
    }
}

fn annotation(platform: &Platform, key: &str) -> Option<String> {
    platform
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .cloned()
}

async fn clear_annotation(ctx: &Context, platform: &Platform, key: &str) {
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Platform> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({"metadata": {"annotations": {key: null}}});
    if let Err(e) = api
        .patch(
            &platform.name_any(),
            &PatchParams::apply(crate::constants::FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await
    {
        warn!("failed to clear {key} on {}: {e}", platform.key());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rendered_full_manifest() {
        let manifest = r#"
apiVersion: observability.io/v1beta1
kind: Platform
metadata:
  name: prod
spec:
  components:
    metrics:
      enabled: true
      version: v2.48.0
      replicas: 1
"#;
        let spec = parse_rendered_spec(manifest).expect("parses");
        assert_eq!(spec["components"]["metrics"]["version"], "v2.48.0");
    }

    #[test]
    fn test_parse_rendered_bare_spec() {
        let bare = r#"
components:
  metrics:
    enabled: true
    version: v2.48.0
"#;
        let spec = parse_rendered_spec(bare).expect("parses");
        assert_eq!(spec["components"]["metrics"]["enabled"], true);
    }

    #[test]
    fn test_parse_rendered_rejects_garbage() {
        assert!(parse_rendered_spec(":::not yaml").is_err());
        // Structurally wrong specs fail the typed round-trip
        assert!(parse_rendered_spec("components: 5").is_err());
    }

    #[test]
    fn test_fingerprint_skip_semantics() {
        // Equal rendered and live content hashes mean the sync is a no-op;
        // the comparison is on canonical hashes, not raw text
        let a = parse_rendered_spec("components: {metrics: {enabled: true}}").unwrap();
        let b = parse_rendered_spec("components:\n  metrics:\n    enabled: true").unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_parse_rendered_applies_operator_defaults() {
        let spec = parse_rendered_spec("components: {metrics: {enabled: true}}").unwrap();
        assert_eq!(spec["components"]["metrics"]["version"], "v2.48.0");
        assert_eq!(spec["components"]["metrics"]["replicas"], 1);
    }

    #[test]
    fn test_version_paths_only() {
        assert!(version_paths_only(&[
            "spec.components.metrics.version".to_string(),
            "spec.components.logs.version".to_string(),
        ]));
        assert!(!version_paths_only(&[
            "spec.components.metrics.version".to_string(),
            "spec.components.metrics.replicas".to_string(),
        ]));
        assert!(!version_paths_only(&[]));
    }

    #[test]
    fn test_rendered_file_path_resolution() {
        assert_eq!(rendered_file_path(None), "platform.yaml");
        assert_eq!(rendered_file_path(Some("envs/prod.yaml")), "envs/prod.yaml");
        assert_eq!(rendered_file_path(Some("envs/prod/")), "envs/prod/platform.yaml");
    }

    #[test]
    fn test_poll_interval_takes_min_with_drift() {
        let gitops: GitOpsSpec = serde_yaml::from_str(
            r#"
provider: flux
repository:
  url: https://git.example.com/repo.git
  pollInterval: 5m
drift:
  interval: 1m
  action: remediate
"#,
        )
        .unwrap();
        assert_eq!(poll_interval(&gitops), Duration::from_secs(60));
    }
}
