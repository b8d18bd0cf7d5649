//! # Autoscaling and Cost Guard Specs
//!
//! Policies translated into horizontal/vertical scaling artifacts and
//! budget-enforcement actions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Autoscaling policies for one component's workload
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentAutoscalingSpec {
    /// Horizontal scaling policy, rendered as a scaling object targeting
    /// the component's workload
    #[serde(default)]
    pub horizontal: Option<HorizontalPolicySpec>,
    /// Vertical sizing policy
    #[serde(default)]
    pub vertical: Option<VerticalPolicySpec>,
    /// Predictive model descriptor consumed by an external trainer
    #[serde(default)]
    pub predictive: Option<PredictivePolicySpec>,
}

/// Horizontal scaling policy
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HorizontalPolicySpec {
    /// Minimum replicas
    pub min_replicas: i32,
    /// Maximum replicas
    pub max_replicas: i32,
    /// Target average CPU utilization percentage
    #[serde(default)]
    pub target_cpu_percent: Option<i32>,
    /// Target average memory utilization percentage
    #[serde(default)]
    pub target_memory_percent: Option<i32>,
    /// Custom metric target
    #[serde(default)]
    pub custom_metric: Option<CustomMetricSpec>,
    /// Scaling behavior shaping
    #[serde(default)]
    pub behavior: Option<ScalingBehaviorSpec>,
}

/// A custom metric target for horizontal scaling
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomMetricSpec {
    /// Metric name as exposed to the cluster metrics pipeline
    pub name: String,
    /// Target average value, quantity string
    pub target_average_value: String,
}

/// Up/down scaling behavior shaping
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScalingBehaviorSpec {
    /// Policy applied when scaling up
    #[serde(default)]
    pub scale_up: Option<ScalingRulesSpec>,
    /// Policy applied when scaling down
    #[serde(default)]
    pub scale_down: Option<ScalingRulesSpec>,
}

/// One direction's scaling rules
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScalingRulesSpec {
    /// Stabilization window in seconds
    #[serde(default)]
    pub stabilization_window_seconds: Option<i32>,
    /// Maximum percentage step per period
    #[serde(default)]
    pub percent: Option<i32>,
    /// Maximum absolute pod step per period
    #[serde(default)]
    pub pods: Option<i32>,
    /// Period the step caps apply to, seconds
    #[serde(default)]
    pub period_seconds: Option<i32>,
}

/// Vertical sizing policy
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerticalPolicySpec {
    /// Update mode for the sizing controller
    #[serde(default)]
    pub update_mode: VerticalUpdateMode,
    /// Per-container resource bands
    #[serde(default)]
    pub container_policies: Option<Vec<ContainerResourceBandSpec>>,
}

/// Vertical update modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum VerticalUpdateMode {
    Off,
    #[default]
    Initial,
    Recreate,
    Auto,
}

impl VerticalUpdateMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalUpdateMode::Off => "Off",
            VerticalUpdateMode::Initial => "Initial",
            VerticalUpdateMode::Recreate => "Recreate",
            VerticalUpdateMode::Auto => "Auto",
        }
    }
}

/// Resource band for one container
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerResourceBandSpec {
    /// Container name, "*" for all
    pub container_name: String,
    /// Lower bound, quantity strings per resource kind
    #[serde(default)]
    pub min_allowed: Option<BTreeMap<String, String>>,
    /// Upper bound
    #[serde(default)]
    pub max_allowed: Option<BTreeMap<String, String>>,
}

/// Predictive scaling model descriptor
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictivePolicySpec {
    /// Model kind
    pub model: PredictiveModelKind,
    /// Training window, e.g. "7d"
    pub training_window: String,
    /// Prediction horizon, e.g. "1h"
    pub horizon: String,
    /// Minimum confidence before predictions are acted on, 0.0-1.0
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
    /// Retrain interval, e.g. "24h"
    #[serde(default = "default_retrain_interval")]
    pub retrain_interval: String,
}

fn default_confidence_floor() -> f64 {
    0.8
}

fn default_retrain_interval() -> String {
    "24h".to_string()
}

/// Supported predictive model kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PredictiveModelKind {
    Linear,
    Exponential,
    Seasonal,
    Ml,
}

impl PredictiveModelKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictiveModelKind::Linear => "linear",
            PredictiveModelKind::Exponential => "exponential",
            PredictiveModelKind::Seasonal => "seasonal",
            PredictiveModelKind::Ml => "ml",
        }
    }
}

/// Cost guard configuration for the whole Platform
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostGuardSpec {
    /// Monthly budget in USD per component, keyed by component name
    pub budgets: BTreeMap<String, ComponentBudgetSpec>,
    /// Notification channels for threshold alerts
    #[serde(default)]
    pub channels: Option<Vec<CostChannelSpec>>,
    /// Percentage points the estimate must fall below a threshold before
    /// its actions are reversed
    #[serde(default = "default_hysteresis")]
    pub hysteresis_percent: f64,
}

fn default_hysteresis() -> f64 {
    5.0
}

/// Budget and threshold actions for one component
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBudgetSpec {
    /// Monthly budget, USD
    pub monthly_usd: f64,
    /// Threshold/action pairs, evaluated against the latest cost estimate
    pub thresholds: Vec<CostThresholdSpec>,
}

/// One cost threshold and the actions applied on crossing it
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostThresholdSpec {
    /// Percentage of the monthly budget
    pub percent: f64,
    /// Actions applied idempotently when the estimate crosses the
    /// threshold, reversed with hysteresis when it falls back
    pub actions: Vec<CostAction>,
}

/// Budget-enforcement actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CostAction {
    /// Notify the configured channels
    Alert,
    /// Reduce replicas toward the component minimum
    ScaleDown,
    /// Disable components not marked essential
    DisableNonEssential,
    /// Freeze new workload rollouts via the deploy-freeze annotation
    PreventNewDeployments,
}

/// A notification channel for cost alerts
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum CostChannelSpec {
    Email {
        address: String,
    },
    Webhook {
        url: String,
    },
    Chat {
        /// Webhook URL of the chat integration
        url: String,
        #[serde(default)]
        channel: Option<String>,
    },
}
