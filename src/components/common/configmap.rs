//! # Config Bundles
//!
//! Rendered component configuration, content-addressed so workload pods
//! roll only on substantive change. The advanced config bag is merged after
//! operator defaults; the resulting hash rides on both the ConfigMap and
//! the pod template annotation.

use crate::client::owner_reference;
use crate::components::common::labels::{artifact_labels, artifact_name};
use crate::components::common::merge::{content_hash, deep_merge};
use crate::constants::CONFIG_HASH_ANNOTATION;
use crate::crd::{ComponentKind, Platform};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// A rendered config bundle plus its content hash
#[derive(Debug, Clone)]
pub struct RenderedConfig {
    pub config_map: ConfigMap,
    pub hash: String,
}

/// Merge the advanced config bag over operator defaults and wrap the result
/// in a content-addressed ConfigMap named `<platform>-<component>-config`.
#[must_use]
pub fn render_config_bundle(
    platform: &Platform,
    kind: ComponentKind,
    defaults: serde_json::Value,
    file_name: &str,
) -> RenderedConfig {
    let overlay = platform
        .spec
        .components
        .common(kind)
        .and_then(|c| c.extra_config.as_ref())
        .map(|bag| serde_json::Value::Object(bag.clone().into_iter().collect()))
        .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

    let merged = deep_merge(defaults, overlay);
    let hash = content_hash(&merged);

    let rendered = serde_yaml::to_string(&merged).unwrap_or_default();
    let mut data = BTreeMap::new();
    data.insert(file_name.to_string(), rendered);

    let mut annotations = BTreeMap::new();
    annotations.insert(CONFIG_HASH_ANNOTATION.to_string(), hash.clone());

    let config_map = ConfigMap {
        metadata: ObjectMeta {
            name: Some(config_bundle_name(platform, kind)),
            namespace: platform.namespace(),
            labels: Some(artifact_labels(platform, kind)),
            annotations: Some(annotations),
            owner_references: Some(vec![owner_reference(platform)]),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..ConfigMap::default()
    };

    RenderedConfig { config_map, hash }
}

/// Name of the component's config bundle
#[must_use]
pub fn config_bundle_name(platform: &Platform, kind: ComponentKind) -> String {
    format!("{}-config", artifact_name(platform, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::components::{CommonComponentSpec, ComponentsSpec, MetricsSpec};
    use crate::crd::PlatformSpec;
    use serde_json::json;

    fn platform_with_extra(extra: Option<BTreeMap<String, serde_json::Value>>) -> Platform {
        Platform::new(
            "prod",
            PlatformSpec {
                components: ComponentsSpec {
                    metrics: Some(MetricsSpec {
                        common: CommonComponentSpec {
                            enabled: true,
                            extra_config: extra,
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
    fn test_bag_overrides_defaults() {
        let mut extra = BTreeMap::new();
        extra.insert("global".to_string(), json!({"scrape_interval": "15s"}));

        let rendered = render_config_bundle(
            &platform_with_extra(Some(extra)),
            ComponentKind::Metrics,
            json!({"global": {"scrape_interval": "30s", "evaluation_interval": "30s"}}),
            "prometheus.yml",
        );

        let body = rendered
            .config_map
            .data
            .as_ref()
            .and_then(|d| d.get("prometheus.yml"))
            .expect("rendered file");
        assert!(body.contains("scrape_interval: 15s"));
        assert!(body.contains("evaluation_interval: 30s"));
    }

    #[test]
    fn test_hash_stable_without_bag() {
        let defaults = json!({"a": 1});
        let r1 = render_config_bundle(
            &platform_with_extra(None),
            ComponentKind::Metrics,
            defaults.clone(),
            "config.yml",
        );
        let r2 = render_config_bundle(
            &platform_with_extra(None),
            ComponentKind::Metrics,
            defaults,
            "config.yml",
        );
        assert_eq!(r1.hash, r2.hash);
    }

    #[test]
    fn test_bundle_carries_owner_and_hash_annotation() {
        let rendered = render_config_bundle(
            &platform_with_extra(None),
            ComponentKind::Metrics,
            json!({}),
            "config.yml",
        );
        let meta = &rendered.config_map.metadata;
        assert_eq!(meta.name.as_deref(), Some("prod-metrics-config"));
        assert!(meta.owner_references.as_ref().is_some_and(|o| o.len() == 1));
        assert_eq!(
            meta.annotations
                .as_ref()
                .and_then(|a| a.get(CONFIG_HASH_ANNOTATION)),
            Some(&rendered.hash)
        );
    }
}
