//! # Services
//!
//! Stable ClusterIP services per component, plus a headless service for
//! stateful components so the ordered workload gets stable pod DNS.

use crate::client::owner_reference;
use crate::components::common::labels::{artifact_labels, artifact_name, selector_labels};
use crate::crd::{ComponentKind, Platform};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;

/// ClusterIP service for the component
#[must_use]
pub fn build_service(platform: &Platform, kind: ComponentKind) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(service_name(platform, kind)),
            namespace: platform.namespace(),
            labels: Some(artifact_labels(platform, kind)),
            owner_references: Some(vec![owner_reference(platform)]),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(platform, kind)),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: kind.port(),
                target_port: Some(IntOrString::Int(kind.port())),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

/// Headless service backing a stateful workload
#[must_use]
pub fn build_headless_service(platform: &Platform, kind: ComponentKind) -> Service {
    let mut service = build_service(platform, kind);
    service.metadata.name = Some(headless_service_name(platform, kind));
    if let Some(spec) = service.spec.as_mut() {
        spec.cluster_ip = Some("None".to_string());
    }
    service
}

/// Name of the component's ClusterIP service
#[must_use]
pub fn service_name(platform: &Platform, kind: ComponentKind) -> String {
    artifact_name(platform, kind)
}

/// Name of the component's headless service
#[must_use]
pub fn headless_service_name(platform: &Platform, kind: ComponentKind) -> String {
    format!("{}-headless", artifact_name(platform, kind))
}

/// Stable in-cluster URL other components consume
#[must_use]
pub fn service_url(platform: &Platform, kind: ComponentKind) -> String {
    format!(
        "http://{}.{}.svc.cluster.local:{}",
        service_name(platform, kind),
        platform.namespace().unwrap_or_else(|| "default".to_string()),
        kind.port()
    )
}
