//! # GitOps Behavior Tests
//!
//! Drift diffing against ignore sets, rendered-spec parsing, snapshot
//! history bounds, and promotion gate arithmetic.

use platform_operator::crd::{Platform, PlatformSpec, RollbackSnapshot};
use platform_operator::gitops::{diff_specs, DriftReport};
use platform_operator::gitops::rollback::{capture_snapshot, find_snapshot, push_snapshot};
use platform_operator::gitops::sync::parse_rendered_spec;
use serde_json::json;

fn platform() -> Platform {
    let spec: PlatformSpec = serde_yaml::from_str(
        r#"
components:
  metrics:
    enabled: true
    version: v2.48.0
    replicas: 2
"#,
    )
    .unwrap();
    Platform::new("prod", spec)
}

#[test]
fn test_drift_detects_out_of_band_field_change() {
    let rendered = json!({"components": {"metrics": {"enabled": true, "replicas": 2}}});
    let mut live = rendered.clone();
    live["components"]["metrics"]["replicas"] = json!(5);

    let drifted = diff_specs(&rendered, &live, &[]);
    assert_eq!(drifted, vec!["spec.components.metrics.replicas".to_string()]);
}

#[test]
fn test_drift_report_identifies_the_drifted_resource() {
    let mut p = platform();
    p.metadata.namespace = Some("monitoring".to_string());

    let rendered = json!({"components": {"metrics": {"enabled": true, "replicas": 2}}});
    let mut live = rendered.clone();
    live["components"]["metrics"]["replicas"] = json!(5);

    let report = DriftReport::for_platform(&p, &rendered, &live, &[]);
    assert_eq!(report.resource_kind, "Platform");
    assert_eq!(report.name, "prod");
    assert_eq!(report.namespace, "monitoring");
    assert_eq!(
        report.drifted_field_paths,
        vec!["spec.components.metrics.replicas".to_string()]
    );
    assert!(report.summary().contains("spec.components.metrics.replicas"));

    let clean = DriftReport::for_platform(&p, &rendered, &rendered, &[]);
    assert!(clean.is_empty());
}

#[test]
fn test_drift_respects_ignore_set() {
    let rendered = json!({"components": {"metrics": {"replicas": 2}}, "paused": false});
    let mut live = rendered.clone();
    live["components"]["metrics"]["replicas"] = json!(5);
    live["paused"] = json!(true);

    let ignore = vec!["spec.components.metrics.replicas".to_string()];
    let drifted = diff_specs(&rendered, &live, &ignore);
    assert_eq!(drifted, vec!["spec.paused".to_string()]);
}

#[test]
fn test_rendered_manifest_and_bare_spec_parse_identically() {
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
"#;
    let bare = r#"
components:
  metrics:
    enabled: true
    version: v2.48.0
"#;
    let from_manifest = parse_rendered_spec(manifest).unwrap();
    let from_bare = parse_rendered_spec(bare).unwrap();
    assert_eq!(from_manifest, from_bare);
}

#[test]
fn test_rendered_spec_rejects_unknown_shape() {
    assert!(parse_rendered_spec("components: 42").is_err());
}

#[test]
fn test_snapshot_history_bound_and_eviction_order() {
    let p = platform();
    let mut snapshots: Vec<RollbackSnapshot> = Vec::new();
    for i in 0..12 {
        snapshots = push_snapshot(snapshots, capture_snapshot(&p, &format!("rev-{i}")), 10);
    }
    assert_eq!(snapshots.len(), 10, "history bounded at 10");
    assert_eq!(snapshots.first().unwrap().revision, "rev-2", "oldest evicted first");
    assert_eq!(snapshots.last().unwrap().revision, "rev-11");
}

#[test]
fn test_snapshot_restores_point_to_frozen_spec() {
    let p = platform();
    let snapshot = capture_snapshot(&p, "main@sha1:cafe1234");
    assert_eq!(
        snapshot.frozen_spec["components"]["metrics"]["version"],
        "v2.48.0"
    );

    let snapshots = vec![snapshot];
    let found = find_snapshot(&snapshots, "main@sha1:cafe1234").expect("found by revision");
    assert_eq!(found.revision, "main@sha1:cafe1234");
}

#[test]
fn test_promotion_metric_gate_comparisons() {
    use platform_operator::crd::MetricComparison;
    use platform_operator::gitops::promotion::{compare_metric, extract_scalar, GateResult};

    let body = json!({
        "status": "success",
        "data": {"result": [{"value": [1700000000.0, "0.02"]}]},
    });
    let value = extract_scalar(&body).unwrap();
    assert_eq!(
        compare_metric(value, MetricComparison::Lt, 0.05, "error_rate"),
        GateResult::Passed
    );
    assert!(matches!(
        compare_metric(value, MetricComparison::Gt, 0.05, "error_rate"),
        GateResult::Blocked(_)
    ));
}
