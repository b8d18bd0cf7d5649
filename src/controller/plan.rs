//! # Reconcile Plan
//!
//! Dependency ordering of enabled components. Within one component the
//! manager already sequences its artifacts (secrets/config, then services,
//! then workloads, then overlays); across components the plan guarantees a
//! dependent never runs before its dependencies reported a usable endpoint.

use crate::crd::{ComponentKind, ComponentPhase, ComponentStatus, Platform};
use std::collections::BTreeMap;

/// Fixed dispatch order satisfying every dependency edge: stores first,
/// then the collector fanning out to them, then dashboards reading from
/// them
const PLAN_ORDER: [ComponentKind; 5] = [
    ComponentKind::Metrics,
    ComponentKind::Logs,
    ComponentKind::Traces,
    ComponentKind::Collector,
    ComponentKind::Dashboards,
];

/// Enabled components in dispatch order. Cost guards may mask non-essential
/// components; a masked component is treated as disabled.
#[must_use]
pub fn plan_components(platform: &Platform) -> Vec<ComponentKind> {
    PLAN_ORDER
        .into_iter()
        .filter(|kind| platform.spec.components.is_enabled(*kind))
        .filter(|kind| !crate::cost::component_disabled(platform, *kind))
        .collect()
}

/// Dependencies of `kind` that are enabled but have not reported Ready.
/// The reconciler skips the dependent and requeues fast while any remain.
#[must_use]
pub fn unready_dependencies(
    platform: &Platform,
    kind: ComponentKind,
    statuses: &BTreeMap<String, ComponentStatus>,
) -> Vec<ComponentKind> {
    kind.dependencies()
        .iter()
        .copied()
        .filter(|dep| platform.spec.components.is_enabled(*dep))
        .filter(|dep| {
            statuses
                .get(dep.as_str())
                .map_or(true, |s| s.phase != ComponentPhase::Ready)
        })
        .collect()
}
