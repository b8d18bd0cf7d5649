//! # Admission Review Handling
//!
//! Maps the validation hooks onto the cluster's admission-review envelope.
//! `validate` returns allowed/denied with warnings and structured causes;
//! `mutate` injects operator defaults as a JSON patch.

use crate::crd::{ComponentKind, Platform};
use crate::validation::{validate_create, validate_delete, validate_update, AdmissionError};
use json_patch::{AddOperation, Patch, PatchOperation};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::response::{Status, StatusDetails, StatusSummary};
use tracing::{debug, warn};

/// Handle one validating admission review
#[must_use]
pub fn handle_validate(review: AdmissionReview<Platform>) -> AdmissionReview<kube::core::DynamicObject> {
    let req: AdmissionRequest<Platform> = match review.try_into() {
        Ok(req) => req,
        Err(err) => {
            warn!("invalid admission request: {err}");
            return AdmissionResponse::invalid(format!("invalid request: {err}")).into_review();
        }
    };

    let mut response = AdmissionResponse::from(&req);

    let outcome = match req.operation {
        Operation::Create => match &req.object {
            Some(platform) => validate_create(platform),
            None => return AdmissionResponse::invalid("no object in request").into_review(),
        },
        Operation::Update => match (&req.old_object, &req.object) {
            (Some(old), Some(new)) => validate_update(old, new),
            _ => return AdmissionResponse::invalid("update request missing objects").into_review(),
        },
        Operation::Delete => match &req.old_object {
            Some(platform) => validate_delete(platform),
            None => Ok(Vec::new()),
        },
        Operation::Connect => Ok(Vec::new()),
    };

    match outcome {
        Ok(warnings) => {
            if !warnings.is_empty() {
                debug!("admission warnings: {warnings:?}");
                response.warnings = Some(warnings);
            }
            response.into_review()
        }
        Err(err) => deny_with_causes(response, &err).into_review(),
    }
}

/// Handle one mutating admission review: inject defaults the operator would
/// otherwise fill at render time
#[must_use]
pub fn handle_mutate(review: AdmissionReview<Platform>) -> AdmissionReview<kube::core::DynamicObject> {
    let req: AdmissionRequest<Platform> = match review.try_into() {
        Ok(req) => req,
        Err(err) => {
            warn!("invalid admission request: {err}");
            return AdmissionResponse::invalid(format!("invalid request: {err}")).into_review();
        }
    };

    let response = AdmissionResponse::from(&req);
    let Some(platform) = &req.object else {
        return response.into_review();
    };

    let patch = Patch(default_patches(platform));
    if patch.0.is_empty() {
        return response.into_review();
    }

    match response.with_patch(patch) {
        Ok(patched) => patched.into_review(),
        Err(err) => {
            warn!("failed to serialize mutation patch: {err}");
            AdmissionResponse::invalid(format!("patch serialization failed: {err}")).into_review()
        }
    }
}

/// Default injections: versions and replica counts for enabled components
/// that left them unset
#[must_use]
pub fn default_patches(platform: &Platform) -> Vec<PatchOperation> {
    let mut patches = Vec::new();

    for kind in ComponentKind::ALL {
        let Some(common) = platform.spec.components.common(kind) else {
            continue;
        };
        if !common.enabled {
            continue;
        }

        if common.version.is_none() {
            let default_version = crate::components::all_managers()
                .iter()
                .find(|m| m.kind() == kind)
                .map(|m| m.default_version().to_string())
                .unwrap_or_default();
            patches.push(add_op(
                &format!("/spec/components/{kind}/version"),
                serde_json::Value::String(default_version),
            ));
        }
        if common.replicas.is_none() {
            patches.push(add_op(
                &format!("/spec/components/{kind}/replicas"),
                serde_json::Value::from(1),
            ));
        }
    }

    patches
}

fn add_op(path: &str, value: serde_json::Value) -> PatchOperation {
    PatchOperation::Add(AddOperation {
        path: path.parse().expect("static pointer paths are valid"),
        value,
    })
}

/// Deny with the typed error mapped into status causes
fn deny_with_causes(response: AdmissionResponse, err: &AdmissionError) -> AdmissionResponse {
    let mut response = response.deny(err.to_string());

    let causes: Vec<kube::core::response::StatusCause> = err
        .causes()
        .iter()
        .map(|c| kube::core::response::StatusCause {
            reason: c.kind.as_str().to_string(),
            message: c.message.clone(),
            field: c.path.clone(),
        })
        .collect();

    let reason = match err {
        AdmissionError::Invalid(_) => "Invalid",
        AdmissionError::Conflict(_) => "Conflict",
        AdmissionError::Forbidden(_) => "Forbidden",
    };

    response.result = Status {
        status: Some(StatusSummary::Failure),
        code: 422,
        message: err.to_string(),
        reason: reason.to_string(),
        details: (!causes.is_empty()).then(|| StatusDetails {
            name: String::new(),
            group: String::new(),
            kind: String::new(),
            uid: String::new(),
            causes,
            retry_after_seconds: 0,
        }),
    };
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::components::{CommonComponentSpec, ComponentsSpec, MetricsSpec};
    use crate::crd::PlatformSpec;

    fn platform(version: Option<&str>, replicas: Option<i32>) -> Platform {
        Platform::new(
            "test",
            PlatformSpec {
                components: ComponentsSpec {
                    metrics: Some(MetricsSpec {
                        common: CommonComponentSpec {
                            enabled: true,
                            version: version.map(String::from),
                            replicas,
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
    fn test_defaults_injected_for_missing_fields() {
        let patches = default_patches(&platform(None, None));
        assert_eq!(patches.len(), 2);
    }

    #[test]
    fn test_no_patch_when_fields_set() {
        let patches = default_patches(&platform(Some("v2.48.0"), Some(2)));
        assert!(patches.is_empty());
    }

    #[test]
    fn test_patch_applies_cleanly() {
        let p = platform(None, None);
        let mut doc = serde_json::to_value(&p).unwrap();
        let patch = Patch(default_patches(&p));
        json_patch::patch(&mut doc, &patch).expect("patch applies");
        assert_eq!(doc["spec"]["components"]["metrics"]["version"], "v2.48.0");
        assert_eq!(doc["spec"]["components"]["metrics"]["replicas"], 1);
    }
}
