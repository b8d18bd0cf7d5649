//! # Shared Artifact Builders
//!
//! The artifact set every component manager composes from: credentials
//! secrets, content-addressed config bundles, services, workloads, ingress
//! rules, disruption budgets, and service accounts.

pub mod configmap;
pub mod ingress;
pub mod labels;
pub mod merge;
pub mod pdb;
pub mod secrets;
pub mod service;
pub mod workload;

use crate::client::owner_reference;
use crate::crd::{ComponentKind, Platform};
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::ObjectMeta;
use kube::ResourceExt;

/// Service account the component's pods run as
#[must_use]
pub fn build_service_account(platform: &Platform, kind: ComponentKind) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(labels::artifact_name(platform, kind)),
            namespace: platform.namespace(),
            labels: Some(labels::artifact_labels(platform, kind)),
            owner_references: Some(vec![owner_reference(platform)]),
            ..ObjectMeta::default()
        },
        ..ServiceAccount::default()
    }
}
