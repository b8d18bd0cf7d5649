//! # Rendering Property Tests
//!
//! Ownership closure, selector labels, disruption-budget arithmetic, image
//! references, and configuration fingerprint stability across the artifact
//! builders.

use platform_operator::components::common::configmap::render_config_bundle;
use platform_operator::components::common::labels::{artifact_labels, selector_labels};
use platform_operator::components::common::merge::{content_hash, deep_merge};
use platform_operator::components::common::pdb::{build_pdb, min_available};
use platform_operator::components::common::service::{build_headless_service, build_service};
use platform_operator::components::common::workload::{
    build_deployment, build_stateful_set, image_reference,
};
use platform_operator::crd::{ComponentKind, Platform, PlatformSpec};
use serde_json::json;

fn platform() -> Platform {
    let spec: PlatformSpec = serde_yaml::from_str(
        r#"
components:
  metrics:
    enabled: true
    version: v2.48.0
    replicas: 2
    resources:
      requests: {cpu: 100m, memory: 256Mi}
      limits: {cpu: 500m, memory: 1Gi}
    storage:
      size: 50Gi
      retention: 15d
  dashboards:
    enabled: true
    version: 10.2.0
    replicas: 1
  collector:
    enabled: true
    version: 0.91.0
    replicas: 2
"#,
    )
    .expect("test spec parses");
    let mut p = Platform::new("prod", spec);
    p.metadata.namespace = Some("monitoring".to_string());
    p.metadata.uid = Some("uid-prod-1".to_string());
    p
}

#[test]
fn test_every_artifact_carries_an_owner_reference() {
    let p = platform();
    let rendered = render_config_bundle(&p, ComponentKind::Metrics, json!({}), "prometheus.yml");

    let owners = [
        build_service(&p, ComponentKind::Metrics).metadata.owner_references,
        build_headless_service(&p, ComponentKind::Metrics).metadata.owner_references,
        build_stateful_set(&p, ComponentKind::Metrics, "v2.48.0", "h", Vec::new())
            .metadata
            .owner_references,
        build_deployment(&p, ComponentKind::Dashboards, "10.2.0", "h", Vec::new())
            .metadata
            .owner_references,
        build_pdb(&p, ComponentKind::Metrics, 2).unwrap().metadata.owner_references,
        rendered.config_map.metadata.owner_references,
    ];

    for owner_refs in owners {
        let owner_refs = owner_refs.expect("owner references present");
        assert_eq!(owner_refs.len(), 1, "exactly one Platform owner");
        assert_eq!(owner_refs[0].kind, "Platform");
        assert_eq!(owner_refs[0].uid, "uid-prod-1");
        assert_eq!(owner_refs[0].controller, Some(true));
    }
}

#[test]
fn test_selector_labels_are_the_component_triple() {
    let p = platform();
    let selector = selector_labels(&p, ComponentKind::Metrics);
    assert_eq!(selector.len(), 3);
    assert_eq!(
        selector.get("app.kubernetes.io/instance").map(String::as_str),
        Some("prod")
    );
    assert_eq!(
        selector.get("app.kubernetes.io/component").map(String::as_str),
        Some("metrics")
    );

    // Artifact labels extend the selector with the managed-by set
    let full = artifact_labels(&p, ComponentKind::Metrics);
    assert!(full.len() > selector.len());
    for (k, v) in &selector {
        assert_eq!(full.get(k), Some(v));
    }
}

#[test]
fn test_workload_selector_matches_pod_labels() {
    let p = platform();
    let sts = build_stateful_set(&p, ComponentKind::Metrics, "v2.48.0", "h", Vec::new());
    let spec = sts.spec.expect("spec");
    let match_labels = spec.selector.match_labels.expect("match labels");
    let pod_labels = spec
        .template
        .metadata
        .as_ref()
        .and_then(|m| m.labels.clone())
        .expect("pod labels");

    for (k, v) in &match_labels {
        assert_eq!(pod_labels.get(k), Some(v), "selector key {k} must match pods");
    }
}

#[test]
fn test_disruption_budget_arithmetic() {
    assert_eq!(min_available(2), 1);
    assert_eq!(min_available(3), 1);
    assert_eq!(min_available(4), 2);
    assert_eq!(min_available(6), 3);

    let p = platform();
    assert!(build_pdb(&p, ComponentKind::Dashboards, 1).is_none());
    assert!(build_pdb(&p, ComponentKind::Metrics, 2).is_some());
}

#[test]
fn test_image_reference_tag_policy() {
    let p = platform();
    // Metrics upstream tags with the v prefix, dashboards without
    assert_eq!(
        image_reference(&p, ComponentKind::Metrics, "v2.48.0"),
        "prom/prometheus:v2.48.0"
    );
    assert_eq!(
        image_reference(&p, ComponentKind::Dashboards, "v10.2.0"),
        "grafana/grafana:10.2.0"
    );
    assert_eq!(
        image_reference(&p, ComponentKind::Collector, "0.91.0"),
        "otel/opentelemetry-collector-contrib:0.91.0"
    );
}

#[test]
fn test_config_hash_stable_under_key_order() {
    let a: serde_json::Value =
        serde_json::from_str(r#"{"global": {"b": 1, "a": 2}, "scrape": []}"#).unwrap();
    let b: serde_json::Value =
        serde_json::from_str(r#"{"scrape": [], "global": {"a": 2, "b": 1}}"#).unwrap();
    assert_eq!(content_hash(&a), content_hash(&b));
}

#[test]
fn test_advanced_config_merge_semantics() {
    let defaults = json!({
        "scalar": 1,
        "list": [1, 2, 3],
        "nested": {"keep": true, "override": "old"},
    });
    let bag = json!({
        "scalar": 2,
        "list": [9],
        "nested": {"override": "new"},
    });

    let merged = deep_merge(defaults, bag);
    assert_eq!(merged["scalar"], 2, "scalars override");
    assert_eq!(merged["list"], json!([9]), "lists replace");
    assert_eq!(merged["nested"]["keep"], true, "maps overlay");
    assert_eq!(merged["nested"]["override"], "new");
}

#[test]
fn test_identical_specs_render_identical_bundles() {
    let p = platform();
    let defaults = json!({"global": {"scrape_interval": "30s"}});
    let a = render_config_bundle(&p, ComponentKind::Metrics, defaults.clone(), "prometheus.yml");
    let b = render_config_bundle(&p, ComponentKind::Metrics, defaults, "prometheus.yml");
    assert_eq!(a.hash, b.hash);
    assert_eq!(a.config_map.data, b.config_map.data);
}

#[test]
fn test_stateful_components_get_stateful_sets() {
    for kind in ComponentKind::ALL {
        let expects_claims = kind.is_stateful();
        if expects_claims {
            let sts = build_stateful_set(&platform(), kind, "2.0.0", "h", Vec::new());
            assert!(
                sts.spec
                    .and_then(|s| s.volume_claim_templates)
                    .is_some_and(|c| !c.is_empty()),
                "{kind} should carry volume claim templates"
            );
        }
    }
}
