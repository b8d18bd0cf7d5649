//! # Helm-mode Adapter
//!
//! Alternative to the native-manifest flow: each component is delegated to
//! a Helm release named `<platform>-<component>`. The contract is
//! unchanged; internals resolve the chart version, build values from the
//! same spec, install-or-upgrade with a bounded retry, and map release
//! status back to component status. Uninstall is unconditional on delete.

use crate::components::common::labels::artifact_name;
use crate::components::ComponentManager;
use crate::constants::DEFAULT_HELM_RETRIES;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::crd::{ComponentKind, ComponentPhase, ComponentStatus, Platform};
use crate::validation::image_tag;
use kube::ResourceExt;
use serde_json::json;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Chart name for a component in the configured repository
#[must_use]
pub fn chart_name(kind: ComponentKind) -> &'static str {
    match kind {
        ComponentKind::Metrics => "prometheus",
        ComponentKind::Dashboards => "grafana",
        ComponentKind::Logs => "loki",
        ComponentKind::Traces => "tempo",
        ComponentKind::Collector => "opentelemetry-collector",
    }
}

/// Release name: `<platform>-<component>`
#[must_use]
pub fn release_name(platform: &Platform, kind: ComponentKind) -> String {
    artifact_name(platform, kind)
}

/// Install or upgrade the component's release and map its status
pub async fn reconcile_release<M: ComponentManager + ?Sized>(
    ctx: &Context,
    platform: &Platform,
    manager: &M,
    version: &str,
) -> Result<ComponentStatus> {
    let kind = manager.kind();
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let release = release_name(platform, kind);
    let repo = chart_repository(ctx, platform);

    let resolved = if version.eq_ignore_ascii_case("latest") {
        resolve_latest_version(&repo, chart_name(kind)).await?
    } else {
        image_tag(version, false)
    };

    let values = build_values(platform, manager, version);
    let values_file = write_values_file(&values)?;

    let mut last_err = None;
    for attempt in 1..=DEFAULT_HELM_RETRIES {
        let output = run_helm(&[
            "upgrade",
            "--install",
            &release,
            chart_name(kind),
            "--repo",
            &repo,
            "--version",
            &resolved,
            "--namespace",
            &namespace,
            "--create-namespace",
            "--values",
            values_file.path().to_str().unwrap_or_default(),
            "--output",
            "json",
        ])
        .await;

        match output {
            Ok(_) => {
                last_err = None;
                break;
            }
            Err(e) => {
                warn!(
                    "helm upgrade of {release} failed (attempt {attempt}/{DEFAULT_HELM_RETRIES}): {e}"
                );
                last_err = Some(e);
                tokio::time::sleep(Duration::from_secs(2 * u64::from(attempt))).await;
            }
        }
    }
    if let Some(e) = last_err {
        return Err(e);
    }

    info!("helm release {release} at chart version {resolved}");
    release_status(platform, kind, &namespace, &resolved).await
}

/// Uninstall the component's release, tolerating absence
pub async fn uninstall_release(
    _ctx: &Context,
    platform: &Platform,
    kind: ComponentKind,
) -> Result<()> {
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let release = release_name(platform, kind);

    match run_helm(&["uninstall", &release, "--namespace", &namespace]).await {
        Ok(_) => Ok(()),
        Err(Error::BackendUnavailable(msg)) if msg.contains("not found") => Ok(()),
        Err(e) => Err(e),
    }
}

/// Map the live release state onto the component contract
async fn release_status(
    platform: &Platform,
    kind: ComponentKind,
    namespace: &str,
    version: &str,
) -> Result<ComponentStatus> {
    let release = release_name(platform, kind);
    let output = run_helm(&["status", &release, "--namespace", namespace, "--output", "json"]).await?;
    let parsed: serde_json::Value = serde_json::from_str(&output)
        .map_err(|e| Error::Transient(format!("unparseable helm status for {release}: {e}")))?;

    let status = parsed
        .get("info")
        .and_then(|i| i.get("status"))
        .and_then(|s| s.as_str())
        .unwrap_or("unknown");

    let desired_replicas = platform
        .spec
        .components
        .common(kind)
        .and_then(|c| c.replicas)
        .unwrap_or(1);

    let phase = match status {
        "deployed" => ComponentPhase::Ready,
        "pending-install" => ComponentPhase::Installing,
        "pending-upgrade" | "pending-rollback" => ComponentPhase::Upgrading,
        "failed" => ComponentPhase::Failed,
        "uninstalling" => ComponentPhase::Pending,
        _ => ComponentPhase::Pending,
    };

    Ok(ComponentStatus {
        phase,
        version: Some(version.to_string()),
        replicas: Some(desired_replicas),
        ready_replicas: (phase == ComponentPhase::Ready).then_some(desired_replicas),
        service_url: Some(crate::components::common::service::service_url(platform, kind)),
        message: Some(format!("helm release {release} is {status}")),
    })
}

/// Resolve `latest` to the repository's newest stable chart tag
async fn resolve_latest_version(repo: &str, chart: &str) -> Result<String> {
    let output = run_helm(&["search", "repo", chart, "--repo", repo, "--output", "json"]).await?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&output)
        .map_err(|e| Error::BackendUnavailable(format!("unparseable helm search output: {e}")))?;

    pick_latest_stable(&entries).ok_or_else(|| {
        Error::BackendUnavailable(format!("no stable chart version found for {chart} in {repo}"))
    })
}

/// Newest entry whose version carries no pre-release tag
fn pick_latest_stable(entries: &[serde_json::Value]) -> Option<String> {
    entries
        .iter()
        .filter_map(|e| e.get("version").and_then(|v| v.as_str()))
        .find(|v| !v.contains('-'))
        .map(String::from)
}

/// Values constructed from the same spec the native flow renders
#[must_use]
pub fn build_values<M: ComponentManager + ?Sized>(
    platform: &Platform,
    manager: &M,
    version: &str,
) -> serde_json::Value {
    let kind = manager.kind();
    let common = platform.spec.components.common(kind);

    let mut values = json!({
        "fullnameOverride": release_name(platform, kind),
        "replicaCount": common.and_then(|c| c.replicas).unwrap_or(1),
        "image": {"tag": image_tag(version, kind.tags_with_v_prefix())},
        "config": manager.render_defaults(platform),
    });

    if let Some(resources) = common.and_then(|c| c.resources.as_ref()) {
        values["resources"] = json!({
            "requests": resources.requests,
            "limits": resources.limits,
        });
    }

    if let Some(storage) = common.and_then(|c| c.storage.as_ref()) {
        values["persistence"] = json!({
            "enabled": true,
            "size": storage.size.as_deref().unwrap_or("10Gi"),
            "storageClassName": storage.class,
        });
    }

    if let Some(ingress) = common.and_then(|c| c.ingress.as_ref()) {
        if ingress.enabled {
            values["ingress"] = json!({
                "enabled": true,
                "hosts": [ingress.host],
                "className": ingress.class_name,
                "annotations": ingress.annotations,
            });
        }
    }

    values
}

fn chart_repository(ctx: &Context, platform: &Platform) -> String {
    platform
        .spec
        .installer
        .as_ref()
        .and_then(|i| i.chart_repository.clone())
        .unwrap_or_else(|| ctx.config.chart_repository.clone())
}

fn write_values_file(values: &serde_json::Value) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()
        .map_err(|e| Error::Transient(format!("failed to create values file: {e}")))?;
    let rendered = serde_yaml::to_string(values)
        .map_err(|e| Error::ConfigInvalid(format!("unserializable helm values: {e}")))?;
    file.write_all(rendered.as_bytes())
        .map_err(|e| Error::Transient(format!("failed to write values file: {e}")))?;
    Ok(file)
}

/// Run one helm invocation, mapping failure modes into the taxonomy
async fn run_helm(args: &[&str]) -> Result<String> {
    debug!("running helm {}", args.join(" "));
    let output = Command::new("helm")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::BackendUnavailable(format!("failed to execute helm: {e}")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        Err(Error::BackendUnavailable(format!(
            "helm {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::metrics::MetricsManager;
    use crate::crd::components::{CommonComponentSpec, ComponentsSpec, MetricsSpec};
    use crate::crd::PlatformSpec;
    use serde_json::json;

    fn platform() -> Platform {
        Platform::new(
            "prod",
            PlatformSpec {
                components: ComponentsSpec {
                    metrics: Some(MetricsSpec {
                        common: CommonComponentSpec {
                            enabled: true,
                            version: Some("v2.48.0".to_string()),
                            replicas: Some(3),
                            ..CommonComponentSpec::default()
                        },
                        ..MetricsSpec::default()
                    }),
                    ..ComponentsSpec::default()
                },
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
        )
    }

    #[test]
    fn test_release_names() {
        assert_eq!(
            release_name(&platform(), ComponentKind::Metrics),
            "prod-metrics"
        );
        assert_eq!(chart_name(ComponentKind::Collector), "opentelemetry-collector");
    }

    #[test]
    fn test_values_built_from_spec() {
        let values = build_values(&platform(), &MetricsManager, "v2.48.0");
        assert_eq!(values["replicaCount"], 3);
        assert_eq!(values["image"]["tag"], "v2.48.0");
        assert_eq!(values["fullnameOverride"], "prod-metrics");
    }

    #[test]
    fn test_pick_latest_stable_skips_prereleases() {
        let entries = vec![
            json!({"version": "3.0.0-rc.1"}),
            json!({"version": "2.9.4"}),
            json!({"version": "2.9.3"}),
        ];
        assert_eq!(pick_latest_stable(&entries).as_deref(), Some("2.9.4"));
    }

    #[test]
    fn test_pick_latest_stable_empty() {
        assert!(pick_latest_stable(&[]).is_none());
        let only_pre = vec![json!({"version": "1.0.0-beta"})];
        assert!(pick_latest_stable(&only_pre).is_none());
    }
}
