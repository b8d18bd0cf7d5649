//! # Structural Rules
//!
//! Whole-spec checks applied on create and update. Every violation becomes
//! a `FieldCause` with the dotted path of the offending field.

use super::{cron, network, quantity, retention, version, CauseKind, FieldCause};
use crate::crd::components::SUPPORTED_SCHEMA_VERSIONS;
use crate::crd::{ComponentKind, ObjectStoreSpec, Platform};

/// Run all structural checks, appending causes and warnings
pub fn check_structure(platform: &Platform, causes: &mut Vec<FieldCause>, warnings: &mut Vec<String>) {
    let components = &platform.spec.components;

    if components.enabled_kinds().is_empty() {
        causes.push(FieldCause::new(
            "spec.components",
            CauseKind::Invalid,
            "at least one component must be enabled",
        ));
    }

    for kind in ComponentKind::ALL {
        let Some(common) = components.common(kind) else {
            continue;
        };
        if !common.enabled {
            continue;
        }
        check_component(platform, kind, causes);
    }

    check_backup(platform, causes);
    check_gitops(platform, causes);
    check_cost(platform, causes);
    check_installer(platform, causes, warnings);
}

fn check_component(platform: &Platform, kind: ComponentKind, causes: &mut Vec<FieldCause>) {
    let path = |field: &str| format!("spec.components.{kind}.{field}");
    let common = platform
        .spec
        .components
        .common(kind)
        .expect("caller checked presence");

    if let Some(v) = common.version.as_deref() {
        if !version::is_valid_version(v) {
            causes.push(FieldCause::new(
                path("version"),
                CauseKind::Invalid,
                format!("version '{v}' must match v<major>.<minor>.<patch>[-pre]"),
            ));
        }
    }

    if let Some(replicas) = common.replicas {
        if replicas < 0 {
            causes.push(FieldCause::new(
                path("replicas"),
                CauseKind::Invalid,
                "replicas must not be negative",
            ));
        } else if platform.ha_enabled() && replicas < 2 {
            causes.push(FieldCause::new(
                path("replicas"),
                CauseKind::Invalid,
                format!("{kind} needs at least 2 replicas when HA is enabled"),
            ));
        }
    } else if platform.ha_enabled() {
        // Unset replicas default to 1, which HA forbids
        causes.push(FieldCause::new(
            path("replicas"),
            CauseKind::Invalid,
            format!("{kind} needs at least 2 replicas when HA is enabled"),
        ));
    }

    if let Some(resources) = &common.resources {
        for (section, entries) in [
            ("requests", resources.requests.as_ref()),
            ("limits", resources.limits.as_ref()),
        ] {
            let Some(entries) = entries else { continue };
            for (resource, value) in entries {
                if !quantity::is_valid_quantity(value) {
                    causes.push(FieldCause::new(
                        path(&format!("resources.{section}.{resource}")),
                        CauseKind::Invalid,
                        format!("'{value}' is not a valid quantity"),
                    ));
                }
            }
        }

        if let (Some(requests), Some(limits)) = (&resources.requests, &resources.limits) {
            for (resource, request) in requests {
                if let Some(limit) = limits.get(resource) {
                    if quantity::request_exceeds_limit(request, limit) {
                        causes.push(FieldCause::new(
                            path(&format!("resources.requests.{resource}")),
                            CauseKind::Invalid,
                            format!("request '{request}' exceeds limit '{limit}'"),
                        ));
                    }
                }
            }
        }
    }

    if let Some(storage) = &common.storage {
        if let Some(size) = storage.size.as_deref() {
            if !quantity::is_valid_quantity(size) {
                causes.push(FieldCause::new(
                    path("storage.size"),
                    CauseKind::Invalid,
                    format!("'{size}' is not a valid quantity"),
                ));
            }
        }
        if let Some(r) = storage.retention.as_deref() {
            if !retention::is_valid_retention(r) {
                causes.push(FieldCause::new(
                    path("storage.retention"),
                    CauseKind::Invalid,
                    format!("retention '{r}' must match <number><unit> with unit one of s, m, h, d, w, y"),
                ));
            }
        }
        if let Some(backend) = &storage.backend {
            check_object_store(backend, &path("storage.backend"), causes);
        }
    }

    if let Some(ingress) = &common.ingress {
        if ingress.enabled {
            match ingress.host.as_deref() {
                None | Some("") => causes.push(FieldCause::new(
                    path("ingress.host"),
                    CauseKind::Required,
                    "host is required when ingress is enabled",
                )),
                Some(host) if !network::is_valid_dns_name(host) => {
                    causes.push(FieldCause::new(
                        path("ingress.host"),
                        CauseKind::Invalid,
                        format!("'{host}' is not a valid DNS name"),
                    ));
                }
                Some(_) => {}
            }

            if let Some(tls) = &ingress.tls {
                if tls.enabled && tls.secret_name.is_none() && tls.cert_manager_issuer.is_none() {
                    causes.push(FieldCause::new(
                        path("ingress.tls"),
                        CauseKind::Required,
                        "TLS requires either secretName or certManagerIssuer",
                    ));
                }
            }
        }
    }

    // Kind-specific sub-blocks
    if kind == ComponentKind::Logs {
        if let Some(logs) = &platform.spec.components.logs {
            for (i, period) in logs.schema.as_deref().unwrap_or_default().iter().enumerate() {
                if !SUPPORTED_SCHEMA_VERSIONS.contains(&period.version.as_str()) {
                    causes.push(FieldCause::new(
                        format!("spec.components.logs.schema[{i}].version"),
                        CauseKind::NotSupported,
                        format!(
                            "schema version '{}' is not supported (expected one of {})",
                            period.version,
                            SUPPORTED_SCHEMA_VERSIONS.join(", ")
                        ),
                    ));
                }
            }
        }
    }

    if let Some(autoscaling) = &common.autoscaling {
        if let Some(h) = &autoscaling.horizontal {
            if h.min_replicas < 1 || h.max_replicas < h.min_replicas {
                causes.push(FieldCause::new(
                    path("autoscaling.horizontal"),
                    CauseKind::Invalid,
                    format!(
                        "minReplicas {} and maxReplicas {} must satisfy 1 <= min <= max",
                        h.min_replicas, h.max_replicas
                    ),
                ));
            }
        }
        if let Some(p) = &autoscaling.predictive {
            if !(0.0..=1.0).contains(&p.confidence_floor) {
                causes.push(FieldCause::new(
                    path("autoscaling.predictive.confidenceFloor"),
                    CauseKind::Invalid,
                    "confidence floor must be between 0.0 and 1.0",
                ));
            }
            if !retention::is_valid_retention(&p.training_window) {
                causes.push(FieldCause::new(
                    path("autoscaling.predictive.trainingWindow"),
                    CauseKind::Invalid,
                    format!("'{}' is not a valid duration", p.training_window),
                ));
            }
        }
    }
}

fn check_object_store(backend: &ObjectStoreSpec, path: &str, causes: &mut Vec<FieldCause>) {
    match backend {
        ObjectStoreSpec::S3 { bucket, region, .. } => {
            if bucket.is_empty() {
                causes.push(FieldCause::new(
                    format!("{path}.bucket"),
                    CauseKind::Required,
                    "bucket is required for the s3 backend",
                ));
            }
            if region.is_empty() {
                causes.push(FieldCause::new(
                    format!("{path}.region"),
                    CauseKind::Required,
                    "region is required for the s3 backend",
                ));
            }
        }
        ObjectStoreSpec::Gcs { bucket, .. } => {
            if bucket.is_empty() {
                causes.push(FieldCause::new(
                    format!("{path}.bucket"),
                    CauseKind::Required,
                    "bucket is required for the gcs backend",
                ));
            }
        }
        ObjectStoreSpec::Azure { container, account, .. } => {
            if container.is_empty() {
                causes.push(FieldCause::new(
                    format!("{path}.container"),
                    CauseKind::Required,
                    "container is required for the azure backend",
                ));
            }
            if account.is_empty() {
                causes.push(FieldCause::new(
                    format!("{path}.account"),
                    CauseKind::Required,
                    "account is required for the azure backend",
                ));
            }
        }
        ObjectStoreSpec::Filesystem { .. } => {}
    }
}

fn check_backup(platform: &Platform, causes: &mut Vec<FieldCause>) {
    let Some(backup) = &platform.spec.backup else {
        return;
    };
    if !backup.enabled {
        return;
    }

    match backup.schedule.as_deref() {
        None | Some("") => causes.push(FieldCause::new(
            "spec.backup.schedule",
            CauseKind::Required,
            "schedule is required when backups are enabled",
        )),
        Some(schedule) => {
            if let Err(e) = cron::validate_cron(schedule) {
                causes.push(FieldCause::new(
                    "spec.backup.schedule",
                    CauseKind::Invalid,
                    e.to_string(),
                ));
            }
        }
    }

    match backup.retention {
        None => causes.push(FieldCause::new(
            "spec.backup.retention",
            CauseKind::Required,
            "retention is required when backups are enabled",
        )),
        Some(r) if r < 1 => causes.push(FieldCause::new(
            "spec.backup.retention",
            CauseKind::Invalid,
            "retention must be at least 1 when a schedule is set",
        )),
        Some(_) => {}
    }

    if let Some(destination) = &backup.destination {
        check_object_store(destination, "spec.backup.destination", causes);
    }
}

fn check_gitops(platform: &Platform, causes: &mut Vec<FieldCause>) {
    let Some(gitops) = &platform.spec.gitops else {
        return;
    };

    if gitops.repository.url.is_empty() {
        causes.push(FieldCause::new(
            "spec.gitops.repository.url",
            CauseKind::Required,
            "repository URL is required",
        ));
    }

    if !retention::is_valid_retention(&gitops.repository.poll_interval) {
        causes.push(FieldCause::new(
            "spec.gitops.repository.pollInterval",
            CauseKind::Invalid,
            format!(
                "'{}' is not a valid interval",
                gitops.repository.poll_interval
            ),
        ));
    }

    if let Some(drift) = &gitops.drift {
        if !retention::is_valid_retention(&drift.interval) {
            causes.push(FieldCause::new(
                "spec.gitops.drift.interval",
                CauseKind::Invalid,
                format!("'{}' is not a valid interval", drift.interval),
            ));
        }
    }

    if let Some(promotion) = &gitops.promotion {
        for (i, env) in promotion.environments.iter().enumerate() {
            if env.name.is_empty() {
                causes.push(FieldCause::new(
                    format!("spec.gitops.promotion.environments[{i}].name"),
                    CauseKind::Required,
                    "environment name is required",
                ));
            }
            if env.branch.is_empty() {
                causes.push(FieldCause::new(
                    format!("spec.gitops.promotion.environments[{i}].branch"),
                    CauseKind::Required,
                    "environment branch is required",
                ));
            }
        }
    }
}

fn check_cost(platform: &Platform, causes: &mut Vec<FieldCause>) {
    let Some(cost) = &platform.spec.cost else {
        return;
    };

    let known: Vec<&str> = ComponentKind::ALL.iter().map(ComponentKind::as_str).collect();
    for (component, budget) in &cost.budgets {
        if !known.contains(&component.as_str()) {
            causes.push(FieldCause::new(
                format!("spec.cost.budgets.{component}"),
                CauseKind::NotSupported,
                format!("unknown component '{component}'"),
            ));
        }
        if budget.monthly_usd <= 0.0 {
            causes.push(FieldCause::new(
                format!("spec.cost.budgets.{component}.monthlyUsd"),
                CauseKind::Invalid,
                "monthly budget must be positive",
            ));
        }
        for (i, t) in budget.thresholds.iter().enumerate() {
            if t.percent <= 0.0 {
                causes.push(FieldCause::new(
                    format!("spec.cost.budgets.{component}.thresholds[{i}].percent"),
                    CauseKind::Invalid,
                    "threshold percent must be positive",
                ));
            }
        }
    }
}

fn check_installer(platform: &Platform, causes: &mut Vec<FieldCause>, _warnings: &mut Vec<String>) {
    let Some(installer) = &platform.spec.installer else {
        return;
    };
    if installer.mode == crate::crd::InstallerMode::Helm
        && installer.chart_repository.as_deref().unwrap_or("").is_empty()
    {
        causes.push(FieldCause::new(
            "spec.installer.chartRepository",
            CauseKind::Required,
            "chart repository is required in Helm mode",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::components::{CommonComponentSpec, ComponentsSpec, MetricsSpec};
    use crate::crd::{BackupSpec, HighAvailabilitySpec, PlatformSpec};
    use crate::validation::{validate_create, AdmissionError};

    fn platform_with(spec: PlatformSpec) -> Platform {
        Platform::new("test", spec)
    }

    fn metrics_only(common: CommonComponentSpec) -> PlatformSpec {
        PlatformSpec {
            components: ComponentsSpec {
                metrics: Some(MetricsSpec {
                    common,
                    ..MetricsSpec::default()
                }),
                ..ComponentsSpec::default()
            },
            ..minimal_spec()
        }
    }

    fn minimal_spec() -> PlatformSpec {
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
        }
    }

    #[test]
    fn test_minimal_valid_spec_is_accepted_without_warnings() {
        let mut requests = std::collections::BTreeMap::new();
        requests.insert("cpu".to_string(), "100m".to_string());
        requests.insert("memory".to_string(), "256Mi".to_string());
        let mut limits = std::collections::BTreeMap::new();
        limits.insert("cpu".to_string(), "500m".to_string());
        limits.insert("memory".to_string(), "1Gi".to_string());

        let platform = platform_with(metrics_only(CommonComponentSpec {
            enabled: true,
            version: Some("v2.48.0".to_string()),
            replicas: Some(1),
            resources: Some(crate::crd::ResourceBudget {
                requests: Some(requests),
                limits: Some(limits),
            }),
            ..CommonComponentSpec::default()
        }));

        let warnings = validate_create(&platform).expect("spec should be accepted");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_no_components_enabled_is_rejected_with_single_cause() {
        let platform = platform_with(minimal_spec());
        let err = validate_create(&platform).unwrap_err();
        let AdmissionError::Invalid(causes) = err else {
            panic!("expected Invalid");
        };
        assert_eq!(causes.len(), 1);
        assert!(causes[0].message.contains("at least one component must be enabled"));
    }

    #[test]
    fn test_invalid_version_cause_carries_field_path() {
        let platform = platform_with(metrics_only(CommonComponentSpec {
            enabled: true,
            version: Some("invalid-version".to_string()),
            replicas: Some(1),
            ..CommonComponentSpec::default()
        }));
        let err = validate_create(&platform).unwrap_err();
        assert_eq!(err.causes().len(), 1);
        assert_eq!(err.causes()[0].path, "spec.components.metrics.version");
    }

    #[test]
    fn test_requests_exceeding_limits_rejected() {
        let mut requests = std::collections::BTreeMap::new();
        requests.insert("cpu".to_string(), "2".to_string());
        requests.insert("memory".to_string(), "2Gi".to_string());
        let mut limits = std::collections::BTreeMap::new();
        limits.insert("cpu".to_string(), "1".to_string());
        limits.insert("memory".to_string(), "1Gi".to_string());

        let platform = platform_with(metrics_only(CommonComponentSpec {
            enabled: true,
            version: Some("v2.48.0".to_string()),
            replicas: Some(1),
            resources: Some(crate::crd::ResourceBudget {
                requests: Some(requests),
                limits: Some(limits),
            }),
            ..CommonComponentSpec::default()
        }));

        let err = validate_create(&platform).unwrap_err();
        assert_eq!(err.causes().len(), 2, "one cause per exceeded resource kind");
    }

    #[test]
    fn test_ha_with_single_replica_is_rejected() {
        let mut spec = metrics_only(CommonComponentSpec {
            enabled: true,
            version: Some("v2.48.0".to_string()),
            replicas: Some(1),
            ..CommonComponentSpec::default()
        });
        spec.high_availability = Some(HighAvailabilitySpec { enabled: true });
        let platform = platform_with(spec);

        let err = validate_create(&platform).unwrap_err();
        assert!(err.causes()[0]
            .message
            .contains("at least 2 replicas when HA is enabled"));
    }

    #[test]
    fn test_backup_invalid_cron_and_zero_retention_yield_two_causes() {
        let mut spec = metrics_only(CommonComponentSpec {
            enabled: true,
            version: Some("v2.48.0".to_string()),
            replicas: Some(1),
            ..CommonComponentSpec::default()
        });
        spec.backup = Some(BackupSpec {
            enabled: true,
            schedule: Some("not-a-cron".to_string()),
            retention: Some(0),
            destination: None,
        });
        let platform = platform_with(spec);

        let err = validate_create(&platform).unwrap_err();
        let causes = err.causes();
        assert!(causes.len() >= 2);
        assert!(causes.iter().any(|c| c.path == "spec.backup.schedule"));
        assert!(causes.iter().any(|c| c.path == "spec.backup.retention"));
    }

    #[test]
    fn test_ingress_requires_valid_host() {
        let platform = platform_with(metrics_only(CommonComponentSpec {
            enabled: true,
            version: Some("v2.48.0".to_string()),
            replicas: Some(1),
            ingress: Some(crate::crd::ComponentIngressSpec {
                enabled: true,
                host: Some("Not_A_Host!".to_string()),
                ..crate::crd::ComponentIngressSpec::default()
            }),
            ..CommonComponentSpec::default()
        }));

        let err = validate_create(&platform).unwrap_err();
        assert_eq!(err.causes()[0].path, "spec.components.metrics.ingress.host");
    }
}
