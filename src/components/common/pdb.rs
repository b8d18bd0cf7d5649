//! # Disruption Budgets
//!
//! A PodDisruptionBudget is created iff the component runs at least 2
//! replicas, with `minAvailable = max(1, replicas/2)`.

use crate::client::owner_reference;
use crate::components::common::labels::{artifact_labels, artifact_name, selector_labels};
use crate::crd::{ComponentKind, Platform};
use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;

/// Minimum available pods for a replica count
#[must_use]
pub fn min_available(replicas: i32) -> i32 {
    (replicas / 2).max(1)
}

/// Render the disruption budget, or None below the replica threshold
#[must_use]
pub fn build_pdb(platform: &Platform, kind: ComponentKind, replicas: i32) -> Option<PodDisruptionBudget> {
    if replicas < 2 {
        return None;
    }

    Some(PodDisruptionBudget {
        metadata: ObjectMeta {
            name: Some(artifact_name(platform, kind)),
            namespace: platform.namespace(),
            labels: Some(artifact_labels(platform, kind)),
            owner_references: Some(vec![owner_reference(platform)]),
            ..ObjectMeta::default()
        },
        spec: Some(PodDisruptionBudgetSpec {
            min_available: Some(IntOrString::Int(min_available(replicas))),
            selector: Some(LabelSelector {
                match_labels: Some(selector_labels(platform, kind)),
                ..LabelSelector::default()
            }),
            ..PodDisruptionBudgetSpec::default()
        }),
        ..PodDisruptionBudget::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ComponentsSpec, PlatformSpec};

    fn platform() -> Platform {
        Platform::new(
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
        )
    }

    #[test]
    fn test_min_available_arithmetic() {
        assert_eq!(min_available(2), 1);
        assert_eq!(min_available(3), 1);
        assert_eq!(min_available(4), 2);
        assert_eq!(min_available(5), 2);
        assert_eq!(min_available(6), 3);
        // Floor of 1 even for degenerate inputs
        assert_eq!(min_available(1), 1);
        assert_eq!(min_available(0), 1);
    }

    #[test]
    fn test_single_replica_gets_no_budget() {
        assert!(build_pdb(&platform(), ComponentKind::Metrics, 1).is_none());
    }

    #[test]
    fn test_budget_selector_and_min_available() {
        let pdb = build_pdb(&platform(), ComponentKind::Metrics, 4).unwrap();
        let spec = pdb.spec.expect("spec");
        assert_eq!(spec.min_available, Some(IntOrString::Int(2)));
        assert_eq!(
            spec.selector
                .as_ref()
                .and_then(|s| s.match_labels.as_ref())
                .map(std::collections::BTreeMap::len),
            Some(3)
        );
    }
}
