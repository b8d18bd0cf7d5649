//! # Admission Scenario Tests
//!
//! End-to-end validation scenarios driven through the same hooks the
//! webhook and the reconciler share.

use platform_operator::crd::{Platform, PlatformSpec};
use platform_operator::validation::{
    validate_create, validate_delete, validate_update, AdmissionError,
};

fn platform_from_yaml(spec_yaml: &str) -> Platform {
    let spec: PlatformSpec = serde_yaml::from_str(spec_yaml).expect("test spec yaml parses");
    Platform::new("test-platform", spec)
}

const MINIMAL_METRICS: &str = r#"
components:
  metrics:
    enabled: true
    version: v2.48.0
    replicas: 1
    resources:
      requests: {cpu: 100m, memory: 256Mi}
      limits: {cpu: 500m, memory: 1Gi}
"#;

#[test]
fn test_accept_minimal_spec() {
    let platform = platform_from_yaml(MINIMAL_METRICS);
    let warnings = validate_create(&platform).expect("minimal spec is accepted");
    assert!(warnings.is_empty(), "no warnings expected: {warnings:?}");
}

#[test]
fn test_reject_no_components_enabled() {
    let platform = platform_from_yaml(
        r#"
components:
  metrics:
    enabled: false
  dashboards:
    enabled: false
"#,
    );
    let err = validate_create(&platform).unwrap_err();
    let AdmissionError::Invalid(causes) = err else {
        panic!("expected Invalid, got {err:?}");
    };
    assert_eq!(causes.len(), 1);
    assert!(causes[0]
        .message
        .contains("at least one component must be enabled"));
}

#[test]
fn test_reject_invalid_version() {
    let platform = platform_from_yaml(
        r#"
components:
  metrics:
    enabled: true
    version: invalid-version
    replicas: 1
"#,
    );
    let err = validate_create(&platform).unwrap_err();
    assert_eq!(err.causes().len(), 1);
    assert_eq!(err.causes()[0].path, "spec.components.metrics.version");
}

#[test]
fn test_reject_requests_exceeding_limits() {
    let platform = platform_from_yaml(
        r#"
components:
  metrics:
    enabled: true
    version: v2.48.0
    replicas: 1
    resources:
      requests: {cpu: "2", memory: 2Gi}
      limits: {cpu: "1", memory: 1Gi}
"#,
    );
    assert!(validate_create(&platform).is_err());
}

#[test]
fn test_reject_ha_with_single_replica() {
    let platform = platform_from_yaml(
        r#"
components:
  metrics:
    enabled: true
    version: v2.48.0
    replicas: 1
highAvailability:
  enabled: true
"#,
    );
    let err = validate_create(&platform).unwrap_err();
    assert!(
        err.causes()
            .iter()
            .any(|c| c.message.contains("at least 2 replicas when HA is enabled")),
        "causes: {:?}",
        err.causes()
    );
}

#[test]
fn test_ha_with_two_replicas_is_accepted() {
    let platform = platform_from_yaml(
        r#"
components:
  metrics:
    enabled: true
    version: v2.48.0
    replicas: 2
highAvailability:
  enabled: true
"#,
    );
    assert!(validate_create(&platform).is_ok());
}

#[test]
fn test_reject_backup_with_invalid_cron_and_zero_retention() {
    let platform = platform_from_yaml(
        r#"
components:
  metrics:
    enabled: true
    version: v2.48.0
    replicas: 1
backup:
  enabled: true
  schedule: not-a-cron
  retention: 0
"#,
    );
    let err = validate_create(&platform).unwrap_err();
    let causes = err.causes();
    assert!(causes.len() >= 2, "expected two causes, got {causes:?}");
    assert!(causes.iter().any(|c| c.path == "spec.backup.schedule"));
    assert!(causes.iter().any(|c| c.path == "spec.backup.retention"));
}

#[test]
fn test_version_downgrade_warns_but_succeeds() {
    let old = platform_from_yaml(MINIMAL_METRICS);
    let new = platform_from_yaml(
        r#"
components:
  metrics:
    enabled: true
    version: v2.47.0
    replicas: 1
    resources:
      requests: {cpu: 100m, memory: 256Mi}
      limits: {cpu: 500m, memory: 1Gi}
"#,
    );

    let warnings = validate_update(&old, &new).expect("downgrade must not block");
    let downgrade_warnings: Vec<&String> = warnings
        .iter()
        .filter(|w| w.contains("version downgrade detected"))
        .collect();
    assert_eq!(downgrade_warnings.len(), 1, "exactly one downgrade warning");
}

#[test]
fn test_monotonic_upgrade_has_no_warnings() {
    let old = platform_from_yaml(MINIMAL_METRICS);
    let new = platform_from_yaml(
        r#"
components:
  metrics:
    enabled: true
    version: v2.49.0
    replicas: 1
    resources:
      requests: {cpu: 100m, memory: 256Mi}
      limits: {cpu: 500m, memory: 1Gi}
"#,
    );
    let warnings = validate_update(&old, &new).unwrap();
    assert!(warnings.is_empty());
}

#[test]
fn test_s3_backend_requires_bucket_and_region() {
    let platform = platform_from_yaml(
        r#"
components:
  logs:
    enabled: true
    version: 2.9.4
    replicas: 1
    storage:
      backend:
        type: s3
        bucket: ""
        region: ""
"#,
    );
    let err = validate_create(&platform).unwrap_err();
    let causes = err.causes();
    assert!(causes.iter().any(|c| c.path.ends_with("bucket")));
    assert!(causes.iter().any(|c| c.path.ends_with("region")));
}

#[test]
fn test_retention_union_grammar() {
    for (retention, ok) in [
        ("30s", true),
        ("15m", true),
        ("24h", true),
        ("15d", true),
        ("4w", true),
        ("1y", true),
        ("15", false),
        ("d", false),
        ("15D", false),
    ] {
        let yaml = format!(
            r#"
components:
  metrics:
    enabled: true
    version: v2.48.0
    replicas: 1
    storage:
      retention: "{retention}"
"#
        );
        let platform = platform_from_yaml(&yaml);
        let result = validate_create(&platform);
        assert_eq!(
            result.is_ok(),
            ok,
            "retention '{retention}' expected ok={ok}, got {result:?}"
        );
    }
}

#[test]
fn test_unsupported_log_schema_version_rejected() {
    let platform = platform_from_yaml(
        r#"
components:
  logs:
    enabled: true
    version: 2.9.4
    replicas: 1
    schema:
      - version: v10
        from: "2024-01-01"
"#,
    );
    let err = validate_create(&platform).unwrap_err();
    assert!(err.causes()[0].path.contains("schema[0].version"));
}

#[test]
fn test_delete_refused_with_foreign_finalizers() {
    let mut platform = platform_from_yaml(MINIMAL_METRICS);
    platform.metadata.finalizers = Some(vec![
        "observability.io/platform-protection".to_string(),
        "backup.example.com/hold".to_string(),
    ]);

    let err = validate_delete(&platform).unwrap_err();
    assert!(matches!(err, AdmissionError::Forbidden(_)));
    assert!(err.to_string().contains("backup.example.com/hold"));
}

#[test]
fn test_delete_allowed_with_only_own_finalizer() {
    let mut platform = platform_from_yaml(MINIMAL_METRICS);
    platform.metadata.finalizers =
        Some(vec!["observability.io/platform-protection".to_string()]);
    assert!(validate_delete(&platform).is_ok());
}

#[test]
fn test_ingress_tls_requires_secret_or_issuer() {
    let platform = platform_from_yaml(
        r#"
components:
  dashboards:
    enabled: true
    version: 10.2.0
    replicas: 1
    ingress:
      enabled: true
      host: grafana.example.com
      tls:
        enabled: true
"#,
    );
    let err = validate_create(&platform).unwrap_err();
    assert!(err.causes()[0].path.ends_with("ingress.tls"));

    let platform = platform_from_yaml(
        r#"
components:
  dashboards:
    enabled: true
    version: 10.2.0
    replicas: 1
    ingress:
      enabled: true
      host: grafana.example.com
      tls:
        enabled: true
        secretName: grafana-tls
"#,
    );
    assert!(validate_create(&platform).is_ok());
}
