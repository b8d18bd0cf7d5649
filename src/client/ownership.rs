//! # Ownership
//!
//! Controller references from artifacts to their Platform. Every artifact
//! is reachable from exactly one Platform; deleting the Platform cascades
//! to all artifacts through these references.

use crate::crd::Platform;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

/// Controller reference pointing an artifact at its owning Platform
#[must_use]
pub fn owner_reference(platform: &Platform) -> OwnerReference {
    OwnerReference {
        api_version: Platform::api_version(&()).to_string(),
        kind: Platform::kind(&()).to_string(),
        name: platform.name_any(),
        uid: platform.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Whether the object already carries a controller reference to this
/// Platform. Cross-platform sharing is disallowed; an artifact owned by a
/// different Platform is never adopted.
#[must_use]
pub fn is_owned_by(owner_refs: &[OwnerReference], platform: &Platform) -> bool {
    let uid = platform.uid().unwrap_or_default();
    owner_refs
        .iter()
        .any(|r| r.controller == Some(true) && r.uid == uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ComponentsSpec, PlatformSpec};

    fn platform() -> Platform {
        let mut p = Platform::new(
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
        );
        p.metadata.uid = Some("abc-123".to_string());
        p
    }

    #[test]
    fn test_owner_reference_is_controller() {
        let owner = owner_reference(&platform());
        assert_eq!(owner.kind, "Platform");
        assert_eq!(owner.name, "prod");
        assert_eq!(owner.uid, "abc-123");
        assert_eq!(owner.controller, Some(true));
    }

    #[test]
    fn test_ownership_check_matches_on_uid() {
        let p = platform();
        let owner = owner_reference(&p);
        assert!(is_owned_by(&[owner.clone()], &p));

        let mut other = owner;
        other.uid = "different".to_string();
        assert!(!is_owned_by(&[other], &p));
    }
}
