//! # Labels
//!
//! The managed-by label set carried by every artifact, and the selector
//! triple used for pod matching. The selector intersects `{name, instance,
//! component}`, enough to disambiguate multiple Platforms in one namespace.

use crate::constants::{
    FIELD_MANAGER, LABEL_COMPONENT, LABEL_INSTANCE, LABEL_MANAGED_BY, LABEL_NAME, LABEL_PLATFORM,
};
use crate::crd::{ComponentKind, Platform};
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Full label set stamped onto every artifact of a component
#[must_use]
pub fn artifact_labels(platform: &Platform, kind: ComponentKind) -> BTreeMap<String, String> {
    let mut labels = selector_labels(platform, kind);
    labels.insert(LABEL_MANAGED_BY.to_string(), FIELD_MANAGER.to_string());
    labels.insert(LABEL_PLATFORM.to_string(), platform.name_any());
    if let Some(tenant) = &platform.spec.tenant {
        labels.insert("observability.io/tenant".to_string(), tenant.name.clone());
    }
    labels
}

/// Selector triple; pod-level selectors are exactly this intersection
#[must_use]
pub fn selector_labels(platform: &Platform, kind: ComponentKind) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_NAME.to_string(), component_app_name(kind));
    labels.insert(LABEL_INSTANCE.to_string(), platform.name_any());
    labels.insert(LABEL_COMPONENT.to_string(), kind.as_str().to_string());
    labels
}

/// Application name label value for a component
#[must_use]
pub fn component_app_name(kind: ComponentKind) -> String {
    match kind {
        ComponentKind::Metrics => "prometheus".to_string(),
        ComponentKind::Dashboards => "grafana".to_string(),
        ComponentKind::Logs => "loki".to_string(),
        ComponentKind::Traces => "tempo".to_string(),
        ComponentKind::Collector => "otel-collector".to_string(),
    }
}

/// Base name for the component's artifacts: `<platform>-<component>`
#[must_use]
pub fn artifact_name(platform: &Platform, kind: ComponentKind) -> String {
    format!("{}-{}", platform.name_any(), kind.as_str())
}
