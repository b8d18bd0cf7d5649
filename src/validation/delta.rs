//! # Delta Rules
//!
//! Update-time rules comparing the incoming spec with the prior accepted
//! object. Monotonic upgrades pass silently; downgrades and risky storage
//! changes warn; backend-family changes on populated components require an
//! explicit migration acknowledgement.

use super::{version, CauseKind, FieldCause};
use crate::constants::MIGRATION_ACK_ANNOTATION;
use crate::crd::{ComponentKind, Platform};

/// Run all delta checks, appending causes and warnings
pub fn check_delta(
    old: &Platform,
    new: &Platform,
    causes: &mut Vec<FieldCause>,
    warnings: &mut Vec<String>,
) {
    for kind in ComponentKind::ALL {
        let (Some(old_common), Some(new_common)) = (
            old.spec.components.common(kind),
            new.spec.components.common(kind),
        ) else {
            continue;
        };

        // Downgrades are permitted but warn; exactly one warning per component
        if let (Some(old_v), Some(new_v)) =
            (old_common.version.as_deref(), new_common.version.as_deref())
        {
            if version::is_downgrade(old_v, new_v) {
                warnings.push(format!(
                    "version downgrade detected for {kind}: {old_v} -> {new_v}"
                ));
            }
        }

        let old_storage = old_common.storage.as_ref();
        let new_storage = new_common.storage.as_ref();

        if kind.is_stateful() {
            let old_class = old_storage.and_then(|s| s.class.as_deref());
            let new_class = new_storage.and_then(|s| s.class.as_deref());
            if old_class.is_some() && new_class.is_some() && old_class != new_class {
                warnings.push(format!(
                    "storage class change for {kind} ({} -> {}): existing volumes keep their class",
                    old_class.unwrap_or("<none>"),
                    new_class.unwrap_or("<none>")
                ));
            }
        }

        // Backend family changes risk data loss; only allowed with zero
        // replicas or an explicit acknowledgement annotation
        let old_family = old_storage.and_then(|s| s.backend.as_ref()).map(|b| b.family());
        let new_family = new_storage.and_then(|s| s.backend.as_ref()).map(|b| b.family());
        if let (Some(old_family), Some(new_family)) = (old_family, new_family) {
            if old_family != new_family {
                let replicas = old_common.replicas.unwrap_or(1);
                let acknowledged = new
                    .metadata
                    .annotations
                    .as_ref()
                    .is_some_and(|a| a.contains_key(MIGRATION_ACK_ANNOTATION));
                if replicas > 0 && !acknowledged {
                    causes.push(FieldCause::new(
                        format!("spec.components.{kind}.storage.backend"),
                        CauseKind::Forbidden,
                        format!(
                            "changing the storage backend family ({old_family} -> {new_family}) requires zero replicas or the {MIGRATION_ACK_ANNOTATION} annotation"
                        ),
                    ));
                }
            }
        }
    }

    // Cost guards may freeze rollouts; version changes wait until released
    if crate::cost::deployments_frozen(old) {
        for kind in ComponentKind::ALL {
            let old_v = old.spec.components.common(kind).and_then(|c| c.version.as_deref());
            let new_v = new.spec.components.common(kind).and_then(|c| c.version.as_deref());
            if old_v.is_some() && new_v.is_some() && old_v != new_v {
                causes.push(FieldCause::new(
                    format!("spec.components.{kind}.version"),
                    CauseKind::Forbidden,
                    "new deployments are frozen by cost guards",
                ));
            }
        }
    }

    // Tenant identity is immutable: artifacts are already stamped with it
    let old_tenant = old.spec.tenant.as_ref().map(|t| t.name.as_str());
    let new_tenant = new.spec.tenant.as_ref().map(|t| t.name.as_str());
    if old_tenant.is_some() && old_tenant != new_tenant {
        causes.push(FieldCause::new(
            "spec.tenant.name",
            CauseKind::Forbidden,
            "tenant name is immutable",
        ));
    }
}
