//! # Autoscaling Overlays
//!
//! Translates per-component autoscaling policies into scaling artifacts:
//! a horizontal autoscaler targeting the workload, a vertical sizing object
//! (the VPA CRD, handled dynamically), and a model descriptor ConfigMap for
//! the external predictive trainer.

use crate::client::owner_reference;
use crate::components::common::labels::{artifact_labels, artifact_name};
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::crd::autoscaling::{HorizontalPolicySpec, PredictivePolicySpec, VerticalPolicySpec};
use crate::crd::{ComponentKind, Platform};
use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HPAScalingPolicy, HPAScalingRules, HorizontalPodAutoscaler,
    HorizontalPodAutoscalerBehavior, HorizontalPodAutoscalerSpec, MetricIdentifier, MetricSpec,
    MetricTarget, PodsMetricSource, ResourceMetricSource,
};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, DynamicObject, GroupVersionKind, ObjectMeta};
use kube::core::ApiResource;
use kube::ResourceExt;
use serde_json::json;
use std::collections::BTreeMap;

/// GVK of the vertical sizing CRD
fn vpa_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind {
        group: "autoscaling.k8s.io".to_string(),
        version: "v1".to_string(),
        kind: "VerticalPodAutoscaler".to_string(),
    })
}

/// Apply or remove the component's scaling artifacts to match its policy
pub async fn apply_overlays(ctx: &Context, platform: &Platform, kind: ComponentKind) -> Result<()> {
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let name = artifact_name(platform, kind);
    let policy = platform
        .spec
        .components
        .common(kind)
        .and_then(|c| c.autoscaling.as_ref());

    let hpa_api: Api<HorizontalPodAutoscaler> = ctx.cluster.namespaced(&namespace);
    match policy.and_then(|p| p.horizontal.as_ref()) {
        Some(horizontal) => {
            let desired = build_hpa(platform, kind, horizontal);
            ctx.cluster
                .create_or_update(&hpa_api, &name, |_| desired.clone())
                .await?;
        }
        None => ctx.cluster.delete_if_exists(&hpa_api, &name).await?,
    }

    let vpa_api: Api<DynamicObject> =
        Api::namespaced_with(ctx.client.clone(), &namespace, &vpa_resource());
    match policy.and_then(|p| p.vertical.as_ref()) {
        Some(vertical) => {
            let desired = build_vpa(platform, kind, vertical);
            ctx.cluster.apply(&vpa_api, &name, &desired).await?;
        }
        None => delete_dynamic(&vpa_api, &name).await?,
    }

    let cm_api: Api<ConfigMap> = ctx.cluster.namespaced(&namespace);
    let model_name = model_configmap_name(platform, kind);
    match policy.and_then(|p| p.predictive.as_ref()) {
        Some(predictive) => {
            let desired = build_model_configmap(platform, kind, predictive);
            ctx.cluster
                .create_or_update(&cm_api, &model_name, |_| desired.clone())
                .await?;
        }
        None => ctx.cluster.delete_if_exists(&cm_api, &model_name).await?,
    }

    Ok(())
}

/// Remove every scaling artifact for the component
pub async fn delete_overlays(ctx: &Context, platform: &Platform, kind: ComponentKind) -> Result<()> {
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let name = artifact_name(platform, kind);

    let hpa_api: Api<HorizontalPodAutoscaler> = ctx.cluster.namespaced(&namespace);
    ctx.cluster.delete_if_exists(&hpa_api, &name).await?;

    let vpa_api: Api<DynamicObject> =
        Api::namespaced_with(ctx.client.clone(), &namespace, &vpa_resource());
    delete_dynamic(&vpa_api, &name).await?;

    let cm_api: Api<ConfigMap> = ctx.cluster.namespaced(&namespace);
    ctx.cluster
        .delete_if_exists(&cm_api, &model_configmap_name(platform, kind))
        .await?;
    Ok(())
}

async fn delete_dynamic(api: &Api<DynamicObject>, name: &str) -> Result<()> {
    match api.delete(name, &kube::api::DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
        // The VPA CRD may simply not be installed; treat that as absent
        Err(kube::Error::Api(resp)) if resp.code == 405 || resp.code == 501 => Ok(()),
        Err(e) => Err(Error::from(e)),
    }
}

/// Horizontal scaling object targeting the component's workload
#[must_use]
pub fn build_hpa(
    platform: &Platform,
    kind: ComponentKind,
    policy: &HorizontalPolicySpec,
) -> HorizontalPodAutoscaler {
    let mut metrics = Vec::new();
    if let Some(cpu) = policy.target_cpu_percent {
        metrics.push(resource_metric("cpu", cpu));
    }
    if let Some(memory) = policy.target_memory_percent {
        metrics.push(resource_metric("memory", memory));
    }
    if let Some(custom) = &policy.custom_metric {
        metrics.push(MetricSpec {
            type_: "Pods".to_string(),
            pods: Some(PodsMetricSource {
                metric: MetricIdentifier {
                    name: custom.name.clone(),
                    selector: None,
                },
                target: MetricTarget {
                    type_: "AverageValue".to_string(),
                    average_value: Some(Quantity(custom.target_average_value.clone())),
                    ..MetricTarget::default()
                },
            }),
            ..MetricSpec::default()
        });
    }

    let behavior = policy.behavior.as_ref().map(|b| HorizontalPodAutoscalerBehavior {
        scale_up: b.scale_up.as_ref().map(scaling_rules),
        scale_down: b.scale_down.as_ref().map(scaling_rules),
    });

    HorizontalPodAutoscaler {
        metadata: ObjectMeta {
            name: Some(artifact_name(platform, kind)),
            namespace: platform.namespace(),
            labels: Some(artifact_labels(platform, kind)),
            owner_references: Some(vec![owner_reference(platform)]),
            ..ObjectMeta::default()
        },
        spec: Some(HorizontalPodAutoscalerSpec {
            min_replicas: Some(policy.min_replicas),
            max_replicas: policy.max_replicas,
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: if kind.is_stateful() {
                    "StatefulSet".to_string()
                } else {
                    "Deployment".to_string()
                },
                name: artifact_name(platform, kind),
            },
            metrics: if metrics.is_empty() { None } else { Some(metrics) },
            behavior,
        }),
        ..HorizontalPodAutoscaler::default()
    }
}

fn resource_metric(resource: &str, utilization: i32) -> MetricSpec {
    MetricSpec {
        type_: "Resource".to_string(),
        resource: Some(ResourceMetricSource {
            name: resource.to_string(),
            target: MetricTarget {
                type_: "Utilization".to_string(),
                average_utilization: Some(utilization),
                ..MetricTarget::default()
            },
        }),
        ..MetricSpec::default()
    }
}

fn scaling_rules(rules: &crate::crd::autoscaling::ScalingRulesSpec) -> HPAScalingRules {
    let mut policies = Vec::new();
    if let Some(percent) = rules.percent {
        policies.push(HPAScalingPolicy {
            type_: "Percent".to_string(),
            value: percent,
            period_seconds: rules.period_seconds.unwrap_or(60),
        });
    }
    if let Some(pods) = rules.pods {
        policies.push(HPAScalingPolicy {
            type_: "Pods".to_string(),
            value: pods,
            period_seconds: rules.period_seconds.unwrap_or(60),
        });
    }
    HPAScalingRules {
        stabilization_window_seconds: rules.stabilization_window_seconds,
        policies: if policies.is_empty() { None } else { Some(policies) },
        select_policy: None,
    }
}

/// Vertical sizing object, rendered dynamically against the VPA CRD
#[must_use]
pub fn build_vpa(
    platform: &Platform,
    kind: ComponentKind,
    policy: &VerticalPolicySpec,
) -> DynamicObject {
    let container_policies: Vec<serde_json::Value> = policy
        .container_policies
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|band| {
            let mut entry = json!({"containerName": band.container_name});
            if let Some(min) = &band.min_allowed {
                entry["minAllowed"] = json!(min);
            }
            if let Some(max) = &band.max_allowed {
                entry["maxAllowed"] = json!(max);
            }
            entry
        })
        .collect();

    let mut object = DynamicObject::new(&artifact_name(platform, kind), &vpa_resource())
        .within(&platform.namespace().unwrap_or_else(|| "default".to_string()));
    object.metadata.labels = Some(artifact_labels(platform, kind));
    object.metadata.owner_references = Some(vec![owner_reference(platform)]);
    object.data = json!({
        "spec": {
            "targetRef": {
                "apiVersion": "apps/v1",
                "kind": if kind.is_stateful() { "StatefulSet" } else { "Deployment" },
                "name": artifact_name(platform, kind),
            },
            "updatePolicy": {"updateMode": policy.update_mode.as_str()},
            "resourcePolicy": {"containerPolicies": container_policies},
        },
    });
    object
}

/// Model descriptor stored for the external predictive trainer. The
/// operator stores artifacts and references them by name; training itself
/// happens elsewhere.
#[must_use]
pub fn build_model_configmap(
    platform: &Platform,
    kind: ComponentKind,
    policy: &PredictivePolicySpec,
) -> ConfigMap {
    let descriptor = json!({
        "model": policy.model.as_str(),
        "trainingWindow": policy.training_window,
        "horizon": policy.horizon,
        "confidenceFloor": policy.confidence_floor,
        "retrainInterval": policy.retrain_interval,
        "target": artifact_name(platform, kind),
    });

    let mut data = BTreeMap::new();
    data.insert(
        "model.json".to_string(),
        serde_json::to_string_pretty(&descriptor).unwrap_or_default(),
    );

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(model_configmap_name(platform, kind)),
            namespace: platform.namespace(),
            labels: Some(artifact_labels(platform, kind)),
            owner_references: Some(vec![owner_reference(platform)]),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..ConfigMap::default()
    }
}

/// Name of the predictive model artifact
#[must_use]
pub fn model_configmap_name(platform: &Platform, kind: ComponentKind) -> String {
    format!("{}-scaling-model", artifact_name(platform, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::autoscaling::{
        CustomMetricSpec, PredictiveModelKind, ScalingBehaviorSpec, ScalingRulesSpec,
    };
    use crate::crd::{ComponentsSpec, PlatformSpec};

    fn platform() -> Platform {
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
        p.metadata.namespace = Some("monitoring".to_string());
        p
    }

    #[test]
    fn test_hpa_targets_stateful_set_for_stateful_components() {
        let policy = HorizontalPolicySpec {
            min_replicas: 2,
            max_replicas: 10,
            target_cpu_percent: Some(70),
            target_memory_percent: None,
            custom_metric: None,
            behavior: None,
        };
        let hpa = build_hpa(&platform(), ComponentKind::Metrics, &policy);
        let spec = hpa.spec.expect("spec");
        assert_eq!(spec.scale_target_ref.kind, "StatefulSet");
        assert_eq!(spec.min_replicas, Some(2));
        assert_eq!(spec.max_replicas, 10);
    }

    #[test]
    fn test_hpa_behavior_shaping() {
        let policy = HorizontalPolicySpec {
            min_replicas: 1,
            max_replicas: 5,
            target_cpu_percent: Some(80),
            target_memory_percent: None,
            custom_metric: Some(CustomMetricSpec {
                name: "ingest_rate".to_string(),
                target_average_value: "1000".to_string(),
            }),
            behavior: Some(ScalingBehaviorSpec {
                scale_up: Some(ScalingRulesSpec {
                    stabilization_window_seconds: Some(60),
                    percent: Some(100),
                    pods: None,
                    period_seconds: Some(30),
                }),
                scale_down: Some(ScalingRulesSpec {
                    stabilization_window_seconds: Some(300),
                    percent: None,
                    pods: Some(1),
                    period_seconds: None,
                }),
            }),
        };
        let hpa = build_hpa(&platform(), ComponentKind::Collector, &policy);
        let spec = hpa.spec.expect("spec");
        assert_eq!(spec.scale_target_ref.kind, "Deployment");
        assert_eq!(spec.metrics.as_ref().map(Vec::len), Some(2));

        let behavior = spec.behavior.expect("behavior");
        let up = behavior.scale_up.expect("scale up");
        assert_eq!(up.stabilization_window_seconds, Some(60));
        assert_eq!(up.policies.as_ref().and_then(|p| p.first()).map(|p| p.value), Some(100));
        let down = behavior.scale_down.expect("scale down");
        assert_eq!(down.stabilization_window_seconds, Some(300));
    }

    #[test]
    fn test_vpa_update_mode_rendered() {
        let policy = VerticalPolicySpec {
            update_mode: crate::crd::VerticalUpdateMode::Auto,
            container_policies: None,
        };
        let vpa = build_vpa(&platform(), ComponentKind::Logs, &policy);
        assert_eq!(vpa.data["spec"]["updatePolicy"]["updateMode"], "Auto");
        assert_eq!(vpa.data["spec"]["targetRef"]["kind"], "StatefulSet");
    }

    #[test]
    fn test_model_descriptor_round_trips() {
        let policy = PredictivePolicySpec {
            model: PredictiveModelKind::Seasonal,
            training_window: "7d".to_string(),
            horizon: "1h".to_string(),
            confidence_floor: 0.9,
            retrain_interval: "24h".to_string(),
        };
        let cm = build_model_configmap(&platform(), ComponentKind::Metrics, &policy);
        assert_eq!(cm.metadata.name.as_deref(), Some("prod-metrics-scaling-model"));
        let body = cm.data.as_ref().and_then(|d| d.get("model.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(parsed["model"], "seasonal");
        assert_eq!(parsed["confidenceFloor"], 0.9);
    }
}
