//! # Cost Guards
//!
//! Budget enforcement per component. A cost reporter (external) publishes
//! monthly estimates into `<platform>-cost-estimate`; this module compares
//! them against the configured budgets, applies threshold actions
//! idempotently, and reverses them once the estimate falls back below the
//! threshold minus the hysteresis band.
//!
//! Enforcement is annotation-driven so it survives restarts and stays
//! idempotent: `scaleDown` clamps the component's effective replicas,
//! `disableNonEssential` masks non-essential components in the plan, and
//! `preventNewDeployments` gates version changes at admission.

use crate::constants::DEPLOY_FREEZE_ANNOTATION;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::crd::autoscaling::{ComponentBudgetSpec, CostAction, CostChannelSpec, CostGuardSpec};
use crate::crd::{ComponentKind, Platform};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::Api;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Annotation prefix marking an active scale-down clamp for a component
pub const SCALE_DOWN_ANNOTATION_PREFIX: &str = "observability.io/cost-scale-down.";

/// Annotation prefix masking a non-essential component
pub const DISABLED_ANNOTATION_PREFIX: &str = "observability.io/cost-disabled.";

/// Name of the ConfigMap the external cost reporter publishes estimates to
#[must_use]
pub fn estimate_configmap_name(platform: &Platform) -> String {
    format!("{}-cost-estimate", platform.name_any())
}

/// A threshold transition produced by one evaluation pass
#[derive(Debug, Clone, PartialEq)]
pub struct CostTransition {
    pub component: String,
    pub percent: f64,
    pub estimate_percent: f64,
    pub actions: Vec<CostAction>,
    /// true when the actions are being applied, false when reversed
    pub engage: bool,
}

/// Evaluate one component's thresholds against its latest estimate.
/// `active` holds the threshold percentages currently engaged; hysteresis
/// keeps an engaged threshold active until the estimate falls below
/// `percent - hysteresis`.
#[must_use]
pub fn evaluate_thresholds(
    component: &str,
    budget: &ComponentBudgetSpec,
    estimate_usd: f64,
    hysteresis_percent: f64,
    active: &[f64],
) -> Vec<CostTransition> {
    let estimate_percent = if budget.monthly_usd > 0.0 {
        estimate_usd / budget.monthly_usd * 100.0
    } else {
        0.0
    };

    let mut transitions = Vec::new();
    for threshold in &budget.thresholds {
        let engaged = active.iter().any(|a| (a - threshold.percent).abs() < f64::EPSILON);
        if !engaged && estimate_percent >= threshold.percent {
            transitions.push(CostTransition {
                component: component.to_string(),
                percent: threshold.percent,
                estimate_percent,
                actions: threshold.actions.clone(),
                engage: true,
            });
        } else if engaged && estimate_percent < threshold.percent - hysteresis_percent {
            transitions.push(CostTransition {
                component: component.to_string(),
                percent: threshold.percent,
                estimate_percent,
                actions: threshold.actions.clone(),
                engage: false,
            });
        }
    }
    transitions
}

/// Run the cost guards for a Platform: read estimates, evaluate thresholds,
/// and project the resulting actions into annotations. Returns the
/// transitions for event emission.
pub async fn reconcile_cost_guards(ctx: &Context, platform: &Platform) -> Result<Vec<CostTransition>> {
    let Some(cost) = &platform.spec.cost else {
        return Ok(Vec::new());
    };

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let cm_api: Api<ConfigMap> = ctx.cluster.namespaced(&namespace);
    let estimates = match cm_api
        .get_opt(&estimate_configmap_name(platform))
        .await
        .map_err(Error::from)?
    {
        Some(cm) => parse_estimates(cm.data.as_ref()),
        None => {
            debug!("no cost estimate published for {}", platform.key());
            return Ok(Vec::new());
        }
    };

    let mut transitions = Vec::new();
    for (component, budget) in &cost.budgets {
        let Some(estimate) = estimates.get(component) else {
            continue;
        };
        let active = active_thresholds(platform, component);
        transitions.extend(evaluate_thresholds(
            component,
            budget,
            *estimate,
            cost.hysteresis_percent,
            &active,
        ));
    }

    if transitions.is_empty() {
        return Ok(Vec::new());
    }

    apply_transitions(ctx, platform, &transitions).await?;
    Ok(transitions)
}

/// Project transitions into Platform annotations, the idempotent carrier
/// for enforcement state
async fn apply_transitions(
    ctx: &Context,
    platform: &Platform,
    transitions: &[CostTransition],
) -> Result<()> {
    let mut annotations: BTreeMap<String, Option<String>> = BTreeMap::new();

    for t in transitions {
        // Track engaged thresholds per component
        let key = format!("observability.io/cost-active.{}", t.component);
        let mut active = active_thresholds(platform, &t.component);
        if t.engage {
            if !active.contains(&t.percent) {
                active.push(t.percent);
            }
        } else {
            active.retain(|p| (p - t.percent).abs() >= f64::EPSILON);
        }
        active.sort_by(f64::total_cmp);
        let rendered = active
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        annotations.insert(key, (!rendered.is_empty()).then_some(rendered));

        for action in &t.actions {
            match action {
                CostAction::Alert => {}
                CostAction::ScaleDown => {
                    let key = format!("{SCALE_DOWN_ANNOTATION_PREFIX}{}", t.component);
                    annotations.insert(key, t.engage.then(|| "true".to_string()));
                }
                CostAction::DisableNonEssential => {
                    for kind in [ComponentKind::Dashboards] {
                        let key = format!("{DISABLED_ANNOTATION_PREFIX}{kind}");
                        annotations.insert(key, t.engage.then(|| "true".to_string()));
                    }
                }
                CostAction::PreventNewDeployments => {
                    annotations.insert(
                        DEPLOY_FREEZE_ANNOTATION.to_string(),
                        t.engage.then(|| "true".to_string()),
                    );
                }
            }
        }

        info!(
            "cost guard {} threshold {}% for {} (estimate at {:.1}%)",
            if t.engage { "engaged" } else { "released" },
            t.percent,
            t.component,
            t.estimate_percent
        );
    }

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Platform> = ctx.cluster.namespaced(&namespace);
    let patch = serde_json::json!({"metadata": {"annotations": annotations}});
    ctx.cluster.patch_merge(&api, &platform.name_any(), &patch).await
}

/// Push a transition to the configured channels. Webhook and chat channels
/// receive a JSON payload; email delivery is owned by an external notifier
/// watching the emitted events, so email channels only log here.
pub async fn notify_channels(cost: &CostGuardSpec, platform_name: &str, transition: &CostTransition) {
    for channel in cost.channels.as_deref().unwrap_or_default() {
        match channel {
            CostChannelSpec::Email { address } => {
                info!(
                    "cost alert for {platform_name}/{} routed to {address} via the event notifier",
                    transition.component
                );
            }
            CostChannelSpec::Webhook { url } | CostChannelSpec::Chat { url, .. } => {
                let payload = serde_json::json!({
                    "platform": platform_name,
                    "component": transition.component,
                    "thresholdPercent": transition.percent,
                    "estimatePercent": transition.estimate_percent,
                    "engaged": transition.engage,
                });
                if let Err(e) = reqwest::Client::new().post(url).json(&payload).send().await {
                    tracing::warn!("cost channel {url} unreachable: {e}");
                }
            }
        }
    }
}

/// Threshold percentages currently engaged for a component
#[must_use]
pub fn active_thresholds(platform: &Platform, component: &str) -> Vec<f64> {
    platform
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(&format!("observability.io/cost-active.{component}")))
        .map(|v| v.split(',').filter_map(|p| p.parse().ok()).collect())
        .unwrap_or_default()
}

/// Whether a scale-down clamp is active for the component
#[must_use]
pub fn scale_down_active(platform: &Platform, kind: ComponentKind) -> bool {
    platform
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(&format!("{SCALE_DOWN_ANNOTATION_PREFIX}{kind}")))
}

/// Whether the component is masked as non-essential
#[must_use]
pub fn component_disabled(platform: &Platform, kind: ComponentKind) -> bool {
    platform
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(&format!("{DISABLED_ANNOTATION_PREFIX}{kind}")))
}

/// Whether new rollouts are frozen
#[must_use]
pub fn deployments_frozen(platform: &Platform) -> bool {
    platform
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(DEPLOY_FREEZE_ANNOTATION))
}

fn parse_estimates(data: Option<&BTreeMap<String, String>>) -> BTreeMap<String, f64> {
    data.map(|d| {
        d.iter()
            .filter_map(|(k, v)| v.trim().parse().ok().map(|f| (k.clone(), f)))
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::autoscaling::CostThresholdSpec;

    fn budget() -> ComponentBudgetSpec {
        ComponentBudgetSpec {
            monthly_usd: 1000.0,
            thresholds: vec![
                CostThresholdSpec {
                    percent: 80.0,
                    actions: vec![CostAction::Alert],
                },
                CostThresholdSpec {
                    percent: 100.0,
                    actions: vec![CostAction::ScaleDown, CostAction::PreventNewDeployments],
                },
            ],
        }
    }

    #[test]
    fn test_thresholds_engage_on_crossing() {
        let transitions = evaluate_thresholds("metrics", &budget(), 850.0, 5.0, &[]);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].percent, 80.0);
        assert!(transitions[0].engage);
        assert_eq!(transitions[0].actions, vec![CostAction::Alert]);
    }

    #[test]
    fn test_both_thresholds_engage_at_once() {
        let transitions = evaluate_thresholds("metrics", &budget(), 1200.0, 5.0, &[]);
        assert_eq!(transitions.len(), 2);
        assert!(transitions.iter().all(|t| t.engage));
    }

    #[test]
    fn test_engaged_threshold_is_idempotent() {
        // Already engaged at 80; estimate still above: no new transition
        let transitions = evaluate_thresholds("metrics", &budget(), 850.0, 5.0, &[80.0]);
        assert!(transitions.is_empty());
    }

    #[test]
    fn test_hysteresis_blocks_premature_release() {
        // 80% threshold engaged, estimate at 78%: inside the 5-point band
        let transitions = evaluate_thresholds("metrics", &budget(), 780.0, 5.0, &[80.0]);
        assert!(transitions.is_empty());

        // Below 75%: released
        let transitions = evaluate_thresholds("metrics", &budget(), 740.0, 5.0, &[80.0]);
        assert_eq!(transitions.len(), 1);
        assert!(!transitions[0].engage);
    }

    #[test]
    fn test_estimate_parsing_ignores_garbage() {
        let mut data = BTreeMap::new();
        data.insert("metrics".to_string(), "123.45".to_string());
        data.insert("logs".to_string(), "not-a-number".to_string());
        let estimates = parse_estimates(Some(&data));
        assert_eq!(estimates.get("metrics"), Some(&123.45));
        assert!(!estimates.contains_key("logs"));
    }
}
