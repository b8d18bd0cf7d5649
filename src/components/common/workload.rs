//! # Workloads
//!
//! Deployment builders for stateless components and StatefulSet builders
//! (ordered, with per-replica volume claims) for stateful ones. Pod
//! security defaults: non-root, a fixed component uid, no privilege
//! escalation, read-only root filesystem when the component does not need
//! local writes. Resource budgets are copied verbatim; absent limits stay
//! absent.

use crate::client::owner_reference;
use crate::components::common::configmap::config_bundle_name;
use crate::components::common::labels::{artifact_labels, artifact_name, selector_labels};
use crate::components::common::service::headless_service_name;
use crate::constants::CONFIG_HASH_ANNOTATION;
use crate::crd::{ComponentKind, Platform, ResourceBudget};
use crate::validation::image_tag;
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec,
};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PodSecurityContext, PodSpec, PodTemplateSpec, Probe,
    SecurityContext, Volume, VolumeMount, VolumeResourceRequirements, HTTPGetAction,
    ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Default per-replica volume size when storage is enabled without one
const DEFAULT_STORAGE_SIZE: &str = "10Gi";

/// Desired replica count after enforcement clamps: a cost-guard scale-down
/// pins the component to one replica until released
#[must_use]
pub fn effective_replicas(platform: &Platform, kind: ComponentKind) -> i32 {
    let requested = platform
        .spec
        .components
        .common(kind)
        .and_then(|c| c.replicas)
        .unwrap_or(1);
    if crate::cost::scale_down_active(platform, kind) {
        requested.min(1)
    } else {
        requested
    }
}

/// Image reference for a component: `<registry>/<name>:<tag>` with the
/// version normalized per the component's tag policy
#[must_use]
pub fn image_reference(platform: &Platform, kind: ComponentKind, version: &str) -> String {
    let tag = image_tag(version, kind.tags_with_v_prefix());
    match platform.spec.image_registry.as_deref() {
        Some(registry) if !registry.is_empty() => {
            format!("{registry}/{}:{tag}", kind.image_name())
        }
        _ => format!("{}:{tag}", kind.image_name()),
    }
}

/// Resource budget copied verbatim into requirements; absent sections are
/// never invented
#[must_use]
pub fn to_resource_requirements(budget: Option<&ResourceBudget>) -> Option<ResourceRequirements> {
    let budget = budget?;
    let convert = |entries: &BTreeMap<String, String>| -> BTreeMap<String, Quantity> {
        entries
            .iter()
            .map(|(k, v)| (k.clone(), Quantity(v.clone())))
            .collect()
    };
    Some(ResourceRequirements {
        requests: budget.requests.as_ref().map(convert),
        limits: budget.limits.as_ref().map(convert),
        ..ResourceRequirements::default()
    })
}

/// Pod template shared by both workload shapes
fn build_pod_template(
    platform: &Platform,
    kind: ComponentKind,
    version: &str,
    config_hash: &str,
    env: Vec<EnvVar>,
    mounts_data_volume: bool,
) -> PodTemplateSpec {
    let common = platform.spec.components.common(kind);
    let mut annotations = BTreeMap::new();
    annotations.insert(CONFIG_HASH_ANNOTATION.to_string(), config_hash.to_string());

    let mut volume_mounts = vec![VolumeMount {
        name: "config".to_string(),
        mount_path: format!("/etc/{}", kind.as_str()),
        read_only: Some(true),
        ..VolumeMount::default()
    }];
    if mounts_data_volume {
        volume_mounts.push(VolumeMount {
            name: "data".to_string(),
            mount_path: format!("/var/lib/{}", kind.as_str()),
            ..VolumeMount::default()
        });
    }

    let mut volumes = vec![Volume {
        name: "config".to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_bundle_name(platform, kind),
            ..ConfigMapVolumeSource::default()
        }),
        ..Volume::default()
    }];
    if mounts_data_volume && !kind.is_stateful() {
        // Stateless components with local scratch use an ephemeral volume;
        // stateful ones get claims from the volume claim template instead
        volumes.push(Volume {
            name: "data".to_string(),
            empty_dir: Some(Default::default()),
            ..Volume::default()
        });
    }

    // Read-only rootfs only where the component writes nothing outside its
    // mounted volumes
    let read_only_root = !mounts_data_volume || kind.is_stateful();

    let container = Container {
        name: kind.as_str().to_string(),
        image: Some(image_reference(platform, kind, version)),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: kind.port(),
            ..ContainerPort::default()
        }]),
        env: if env.is_empty() { None } else { Some(env) },
        resources: to_resource_requirements(common.and_then(|c| c.resources.as_ref())),
        volume_mounts: Some(volume_mounts),
        readiness_probe: Some(http_probe(kind, 5)),
        liveness_probe: Some(http_probe(kind, 15)),
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(false),
            read_only_root_filesystem: Some(read_only_root),
            run_as_user: Some(kind.run_as_user()),
            ..SecurityContext::default()
        }),
        ..Container::default()
    };

    let mut pod_labels = selector_labels(platform, kind);
    if platform
        .spec
        .service_mesh
        .as_ref()
        .is_some_and(|m| m.enabled)
    {
        pod_labels.insert("sidecar.istio.io/inject".to_string(), "true".to_string());
    }

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(pod_labels),
            annotations: Some(annotations),
            ..ObjectMeta::default()
        }),
        spec: Some(PodSpec {
            containers: vec![container],
            service_account_name: Some(artifact_name(platform, kind)),
            security_context: Some(PodSecurityContext {
                run_as_non_root: Some(true),
                run_as_user: Some(kind.run_as_user()),
                fs_group: Some(kind.run_as_user()),
                ..PodSecurityContext::default()
            }),
            volumes: Some(volumes),
            ..PodSpec::default()
        }),
    }
}

fn http_probe(kind: ComponentKind, initial_delay: i32) -> Probe {
    let path = match kind {
        ComponentKind::Metrics => "/-/ready",
        ComponentKind::Dashboards => "/api/health",
        ComponentKind::Logs | ComponentKind::Traces => "/ready",
        ComponentKind::Collector => "/",
    };
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(kind.port()),
            ..HTTPGetAction::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(10),
        ..Probe::default()
    }
}

/// Stateless replicated workload
#[must_use]
pub fn build_deployment(
    platform: &Platform,
    kind: ComponentKind,
    version: &str,
    config_hash: &str,
    env: Vec<EnvVar>,
) -> Deployment {
    let replicas = effective_replicas(platform, kind);
    let wants_scratch = matches!(kind, ComponentKind::Dashboards);

    Deployment {
        metadata: ObjectMeta {
            name: Some(artifact_name(platform, kind)),
            namespace: platform.namespace(),
            labels: Some(artifact_labels(platform, kind)),
            owner_references: Some(vec![owner_reference(platform)]),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(platform, kind)),
                ..LabelSelector::default()
            },
            template: build_pod_template(platform, kind, version, config_hash, env, wants_scratch),
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

/// Ordered replicated workload with per-replica persistent volume claims
#[must_use]
pub fn build_stateful_set(
    platform: &Platform,
    kind: ComponentKind,
    version: &str,
    config_hash: &str,
    env: Vec<EnvVar>,
) -> StatefulSet {
    let common = platform.spec.components.common(kind);
    let replicas = effective_replicas(platform, kind);
    let storage = common.and_then(|c| c.storage.as_ref());
    let size = storage
        .and_then(|s| s.size.as_deref())
        .unwrap_or(DEFAULT_STORAGE_SIZE);

    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(size.to_string()));

    let claim = PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some("data".to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: storage.and_then(|s| s.class.clone()),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..VolumeResourceRequirements::default()
            }),
            ..PersistentVolumeClaimSpec::default()
        }),
        ..PersistentVolumeClaim::default()
    };

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(artifact_name(platform, kind)),
            namespace: platform.namespace(),
            labels: Some(artifact_labels(platform, kind)),
            owner_references: Some(vec![owner_reference(platform)]),
            ..ObjectMeta::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(replicas),
            service_name: Some(headless_service_name(platform, kind)),
            selector: LabelSelector {
                match_labels: Some(selector_labels(platform, kind)),
                ..LabelSelector::default()
            },
            template: build_pod_template(platform, kind, version, config_hash, env, true),
            volume_claim_templates: Some(vec![claim]),
            ..StatefulSetSpec::default()
        }),
        ..StatefulSet::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::components::{CommonComponentSpec, ComponentsSpec, MetricsSpec, StorageSpec};
    use crate::crd::PlatformSpec;

    fn platform(registry: Option<&str>) -> Platform {
        let mut p = Platform::new(
            "prod",
            PlatformSpec {
                components: ComponentsSpec {
                    metrics: Some(MetricsSpec {
                        common: CommonComponentSpec {
                            enabled: true,
                            version: Some("v2.48.0".to_string()),
                            replicas: Some(2),
                            resources: Some(ResourceBudget {
                                requests: Some(
                                    [("cpu".to_string(), "100m".to_string())].into(),
                                ),
                                limits: None,
                            }),
                            storage: Some(StorageSpec {
                                size: Some("50Gi".to_string()),
                                class: Some("fast-ssd".to_string()),
                                ..StorageSpec::default()
                            }),
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
                image_registry: registry.map(String::from),
                gitops: None,
                cost: None,
                tenant: None,
                service_mesh: None,
            },
        );
        p.metadata.namespace = Some("monitoring".to_string());
        p
    }

    #[test]
    fn test_image_reference_keeps_v_prefix_for_metrics() {
        let p = platform(None);
        assert_eq!(
            image_reference(&p, ComponentKind::Metrics, "v2.48.0"),
            "prom/prometheus:v2.48.0"
        );
        assert_eq!(
            image_reference(&p, ComponentKind::Dashboards, "v10.2.0"),
            "grafana/grafana:10.2.0"
        );
    }

    #[test]
    fn test_image_registry_override() {
        let p = platform(Some("registry.internal"));
        assert_eq!(
            image_reference(&p, ComponentKind::Metrics, "v2.48.0"),
            "registry.internal/prom/prometheus:v2.48.0"
        );
    }

    #[test]
    fn test_absent_limits_stay_absent() {
        let p = platform(None);
        let sts = build_stateful_set(&p, ComponentKind::Metrics, "v2.48.0", "hash", Vec::new());
        let resources = sts
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|s| s.containers.first())
            .and_then(|c| c.resources.as_ref())
            .expect("resources");
        assert!(resources.requests.is_some());
        assert!(resources.limits.is_none(), "limits must never be invented");
    }

    #[test]
    fn test_stateful_set_claims_and_headless_service() {
        let p = platform(None);
        let sts = build_stateful_set(&p, ComponentKind::Metrics, "v2.48.0", "hash", Vec::new());
        let spec = sts.spec.expect("spec");
        assert_eq!(spec.service_name, Some("prod-metrics-headless".to_string()));
        assert_eq!(spec.replicas, Some(2));

        let claim = spec
            .volume_claim_templates
            .as_ref()
            .and_then(|c| c.first())
            .expect("claim template");
        assert_eq!(
            claim
                .spec
                .as_ref()
                .and_then(|s| s.storage_class_name.as_deref()),
            Some("fast-ssd")
        );
        let size = claim
            .spec
            .as_ref()
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .and_then(|r| r.get("storage"))
            .expect("storage request");
        assert_eq!(size.0, "50Gi");
    }

    #[test]
    fn test_pod_security_defaults() {
        let p = platform(None);
        let sts = build_stateful_set(&p, ComponentKind::Metrics, "v2.48.0", "hash", Vec::new());
        let pod = sts
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .expect("pod spec");
        assert_eq!(
            pod.security_context.as_ref().and_then(|s| s.run_as_non_root),
            Some(true)
        );
        let container_sc = pod.containers[0].security_context.as_ref().expect("sc");
        assert_eq!(container_sc.allow_privilege_escalation, Some(false));
        assert_eq!(container_sc.run_as_user, Some(65534));
    }

    #[test]
    fn test_config_hash_annotation_rolls_pods() {
        let p = platform(None);
        let a = build_stateful_set(&p, ComponentKind::Metrics, "v2.48.0", "hash-a", Vec::new());
        let b = build_stateful_set(&p, ComponentKind::Metrics, "v2.48.0", "hash-b", Vec::new());
        let annotation = |sts: &StatefulSet| {
            sts.spec
                .as_ref()
                .and_then(|s| s.template.metadata.as_ref())
                .and_then(|m| m.annotations.as_ref())
                .and_then(|a| a.get(CONFIG_HASH_ANNOTATION))
                .cloned()
        };
        assert_ne!(annotation(&a), annotation(&b));
    }
}
