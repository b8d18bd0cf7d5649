//! # Ingress
//!
//! Ingress rendering with TLS wiring. User-supplied annotations merge after
//! operator defaults, so users can override anything the operator sets.

use crate::client::owner_reference;
use crate::components::common::labels::{artifact_labels, artifact_name};
use crate::components::common::service::service_name;
use crate::crd::{ComponentIngressSpec, ComponentKind, Platform};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Render the component's Ingress, or None when not enabled
#[must_use]
pub fn build_ingress(
    platform: &Platform,
    kind: ComponentKind,
    spec: &ComponentIngressSpec,
) -> Option<Ingress> {
    if !spec.enabled {
        return None;
    }
    let host = spec.host.as_deref()?;

    let mut annotations: BTreeMap<String, String> = BTreeMap::new();
    let tls_enabled = spec.tls.as_ref().is_some_and(|t| t.enabled);
    if tls_enabled {
        annotations.insert(
            "nginx.ingress.kubernetes.io/ssl-redirect".to_string(),
            "true".to_string(),
        );
        if let Some(issuer) = spec.tls.as_ref().and_then(|t| t.cert_manager_issuer.as_deref()) {
            annotations.insert("cert-manager.io/cluster-issuer".to_string(), issuer.to_string());
        }
    }
    // User annotations merge after operator defaults
    if let Some(user) = &spec.annotations {
        for (k, v) in user {
            annotations.insert(k.clone(), v.clone());
        }
    }

    let tls = tls_enabled.then(|| {
        let secret_name = spec
            .tls
            .as_ref()
            .and_then(|t| t.secret_name.clone())
            .unwrap_or_else(|| format!("{}-tls", artifact_name(platform, kind)));
        vec![IngressTLS {
            hosts: Some(vec![host.to_string()]),
            secret_name: Some(secret_name),
        }]
    });

    Some(Ingress {
        metadata: ObjectMeta {
            name: Some(artifact_name(platform, kind)),
            namespace: platform.namespace(),
            labels: Some(artifact_labels(platform, kind)),
            annotations: Some(annotations),
            owner_references: Some(vec![owner_reference(platform)]),
            ..ObjectMeta::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: spec.class_name.clone(),
            rules: Some(vec![IngressRule {
                host: Some(host.to_string()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(spec.path.clone().unwrap_or_else(|| "/".to_string())),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: service_name(platform, kind),
                                port: Some(ServiceBackendPort {
                                    number: Some(kind.port()),
                                    ..ServiceBackendPort::default()
                                }),
                            }),
                            ..IngressBackend::default()
                        },
                    }],
                }),
            }]),
            tls,
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    })
}
