//! # Drift Detection
//!
//! Compares the rendered expected spec against the live spec, ignoring the
//! configured field paths. Drift is divergence between rendered expected
//! state and observed live state; the action taken is `notify` (condition
//! plus event) or `remediate` (re-apply the rendered spec).

use crate::crd::Platform;
use kube::{Resource, ResourceExt};
use serde_json::Value;

/// Where and what drifted on one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub resource_kind: String,
    pub name: String,
    pub namespace: String,
    /// Dotted paths of the drifted fields
    pub drifted_field_paths: Vec<String>,
}

impl DriftReport {
    /// Diff the rendered expected spec against the live spec of a Platform
    #[must_use]
    pub fn for_platform(
        platform: &Platform,
        expected: &Value,
        live: &Value,
        ignore_paths: &[String],
    ) -> Self {
        Self {
            resource_kind: Platform::kind(&()).to_string(),
            name: platform.name_any(),
            namespace: platform.namespace().unwrap_or_else(|| "default".to_string()),
            drifted_field_paths: diff_specs(expected, live, ignore_paths),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drifted_field_paths.is_empty()
    }

    /// One-line rendering for events and logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}/{} {}: {}",
            self.namespace,
            self.name,
            self.resource_kind,
            self.drifted_field_paths.join(", ")
        )
    }
}

/// Diff two spec documents, returning the dotted paths whose values differ.
/// Paths with a prefix in `ignore_paths` are excluded. Arrays compare as
/// whole values (rendered lists replace, so index-level diffs carry no
/// meaning).
#[must_use]
pub fn diff_specs(expected: &Value, live: &Value, ignore_paths: &[String]) -> Vec<String> {
    let mut drifted = Vec::new();
    diff_value("spec", expected, live, ignore_paths, &mut drifted);
    drifted
}

fn diff_value(
    path: &str,
    expected: &Value,
    live: &Value,
    ignore_paths: &[String],
    drifted: &mut Vec<String>,
) {
    if is_ignored(path, ignore_paths) {
        return;
    }

    match (expected, live) {
        (Value::Object(expected), Value::Object(live)) => {
            for (key, expected_value) in expected {
                let child = format!("{path}.{key}");
                match live.get(key) {
                    Some(live_value) => {
                        diff_value(&child, expected_value, live_value, ignore_paths, drifted);
                    }
                    None if !expected_value.is_null() => drifted.push(child),
                    None => {}
                }
            }
            // Fields present live but absent from the rendered state are
            // drift too (out-of-band additions)
            for key in live.keys() {
                if !expected.contains_key(key) {
                    let child = format!("{path}.{key}");
                    if !is_ignored(&child, ignore_paths) && !live[key].is_null() {
                        drifted.push(child);
                    }
                }
            }
        }
        (expected, live) => {
            if expected != live {
                drifted.push(path.to_string());
            }
        }
    }
}

fn is_ignored(path: &str, ignore_paths: &[String]) -> bool {
    ignore_paths
        .iter()
        .any(|ignored| path == ignored || path.starts_with(&format!("{ignored}.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_specs_have_no_drift() {
        let spec = json!({"components": {"metrics": {"replicas": 2}}});
        assert!(diff_specs(&spec, &spec.clone(), &[]).is_empty());
    }

    #[test]
    fn test_scalar_drift_reports_dotted_path() {
        let expected = json!({"components": {"metrics": {"replicas": 2}}});
        let live = json!({"components": {"metrics": {"replicas": 5}}});
        assert_eq!(
            diff_specs(&expected, &live, &[]),
            vec!["spec.components.metrics.replicas".to_string()]
        );
    }

    #[test]
    fn test_out_of_band_additions_count_as_drift() {
        let expected = json!({"components": {"metrics": {"replicas": 2}}});
        let live = json!({"components": {"metrics": {"replicas": 2, "version": "v9.9.9"}}});
        assert_eq!(
            diff_specs(&expected, &live, &[]),
            vec!["spec.components.metrics.version".to_string()]
        );
    }

    #[test]
    fn test_ignored_prefixes_are_skipped() {
        let expected = json!({"components": {"metrics": {"replicas": 2}}, "paused": false});
        let live = json!({"components": {"metrics": {"replicas": 5}}, "paused": true});
        let ignore = vec!["spec.components".to_string()];
        assert_eq!(diff_specs(&expected, &live, &ignore), vec!["spec.paused".to_string()]);
    }

    #[test]
    fn test_missing_field_is_drift() {
        let expected = json!({"components": {"metrics": {"replicas": 2}}});
        let live = json!({"components": {}});
        assert_eq!(
            diff_specs(&expected, &live, &[]),
            vec!["spec.components.metrics".to_string()]
        );
    }

    #[test]
    fn test_lists_compare_as_whole_values() {
        let expected = json!({"schema": [{"from": "2024-01-01"}]});
        let live = json!({"schema": [{"from": "2024-01-01"}, {"from": "2024-06-01"}]});
        assert_eq!(diff_specs(&expected, &live, &[]), vec!["spec.schema".to_string()]);
    }

    #[test]
    fn test_report_for_platform_carries_identity_and_paths() {
        let mut platform = Platform::new(
            "prod",
            crate::crd::PlatformSpec {
                components: crate::crd::ComponentsSpec::default(),
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
        platform.metadata.namespace = Some("monitoring".to_string());

        let expected = json!({"components": {"metrics": {"replicas": 2}}});
        let live = json!({"components": {"metrics": {"replicas": 5}}});
        let report = DriftReport::for_platform(&platform, &expected, &live, &[]);

        assert_eq!(report.resource_kind, "Platform");
        assert_eq!(report.name, "prod");
        assert_eq!(report.namespace, "monitoring");
        assert!(!report.is_empty());
        assert_eq!(
            report.drifted_field_paths,
            vec!["spec.components.metrics.replicas".to_string()]
        );
        assert!(report.summary().contains("monitoring/prod"));

        let clean = DriftReport::for_platform(&platform, &expected, &expected, &[]);
        assert!(clean.is_empty());
    }
}
