//! # Promotion
//!
//! Copies rendered state from the source environment branch to a target
//! environment branch, gated per environment: replica availability, health
//! duration, metric thresholds, and manual approval. Promotion blocks until
//! every gate passes; manual-approval gates block indefinitely pending the
//! acknowledgement object.

use crate::components::common::service::service_url;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::crd::{ComponentKind, EnvironmentSpec, GateSpec, MetricComparison, Platform};
use crate::validation::Retention;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::Api;
use kube::ResourceExt;
use tracing::{debug, info};

/// Outcome of evaluating an environment's gates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResult {
    Passed,
    /// Human-readable reason the gate is holding promotion
    Blocked(String),
}

/// Evaluate every gate of the environment; the first blocker wins
pub async fn evaluate_gates(
    ctx: &Context,
    platform: &Platform,
    env: &EnvironmentSpec,
) -> Result<GateResult> {
    for gate in env.gates.as_deref().unwrap_or_default() {
        let result = match gate {
            GateSpec::Availability { min_percent } => availability_gate(platform, *min_percent),
            GateSpec::HealthDuration { duration } => health_duration_gate(platform, duration)?,
            GateSpec::Metric {
                query,
                comparison,
                threshold,
            } => metric_gate(platform, query, *comparison, *threshold).await?,
            GateSpec::ManualApproval { approval_object } => {
                manual_approval_gate(ctx, platform, env, approval_object.as_deref()).await?
            }
        };
        if let GateResult::Blocked(reason) = result {
            return Ok(GateResult::Blocked(reason));
        }
    }
    Ok(GateResult::Passed)
}

/// Required ready-replica availability percentage across enabled components
fn availability_gate(platform: &Platform, min_percent: u8) -> GateResult {
    let statuses = platform
        .status
        .as_ref()
        .map(|s| &s.components)
        .cloned()
        .unwrap_or_default();

    let (mut desired, mut ready) = (0i64, 0i64);
    for status in statuses.values() {
        desired += i64::from(status.replicas.unwrap_or(0));
        ready += i64::from(status.ready_replicas.unwrap_or(0));
    }

    if desired == 0 {
        return GateResult::Blocked("no replicas observed yet".to_string());
    }
    let percent = ready * 100 / desired;
    if percent >= i64::from(min_percent) {
        GateResult::Passed
    } else {
        GateResult::Blocked(format!(
            "availability {percent}% below required {min_percent}%"
        ))
    }
}

/// Health checks must have held Ready for the full duration
fn health_duration_gate(platform: &Platform, duration: &str) -> Result<GateResult> {
    let required = Retention::parse(duration)
        .map_err(|e| Error::ConfigInvalid(e.to_string()))?
        .as_duration();

    let ready_since = platform
        .status
        .as_ref()
        .and_then(|s| s.conditions.iter().find(|c| c.r#type == "Ready"))
        .filter(|c| c.status == "True")
        .and_then(|c| c.last_transition_time.as_deref())
        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok());

    match ready_since {
        Some(since) => {
            let held = chrono::Utc::now().signed_duration_since(since);
            if held.num_seconds() >= required.as_secs() as i64 {
                Ok(GateResult::Passed)
            } else {
                Ok(GateResult::Blocked(format!(
                    "healthy for {}s, gate requires {}s",
                    held.num_seconds(),
                    required.as_secs()
                )))
            }
        }
        None => Ok(GateResult::Blocked("platform is not Ready".to_string())),
    }
}

/// Compare a metric query result against the threshold
async fn metric_gate(
    platform: &Platform,
    query: &str,
    comparison: MetricComparison,
    threshold: f64,
) -> Result<GateResult> {
    let base = service_url(platform, ComponentKind::Metrics);
    let url = format!("{base}/api/v1/query");

    let response = reqwest::Client::new()
        .get(&url)
        .query(&[("query", query)])
        .send()
        .await
        .map_err(|e| Error::BackendUnavailable(format!("metric query failed: {e}")))?;
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| Error::BackendUnavailable(format!("unparseable metric response: {e}")))?;

    let value = extract_scalar(&body).ok_or_else(|| {
        Error::BackendUnavailable(format!("metric query '{query}' returned no samples"))
    })?;

    Ok(compare_metric(value, comparison, threshold, query))
}

/// Pure comparison step, factored out for tests
#[must_use]
pub fn compare_metric(
    value: f64,
    comparison: MetricComparison,
    threshold: f64,
    query: &str,
) -> GateResult {
    let passed = match comparison {
        MetricComparison::Lt => value < threshold,
        MetricComparison::Le => value <= threshold,
        MetricComparison::Gt => value > threshold,
        MetricComparison::Ge => value >= threshold,
    };
    if passed {
        GateResult::Passed
    } else {
        GateResult::Blocked(format!(
            "metric gate '{query}' observed {value}, threshold {threshold}"
        ))
    }
}

/// First sample value from a range/instant query response
#[must_use]
pub fn extract_scalar(body: &serde_json::Value) -> Option<f64> {
    body.get("data")?
        .get("result")?
        .as_array()?
        .first()?
        .get("value")?
        .as_array()?
        .get(1)?
        .as_str()?
        .parse()
        .ok()
}

/// Manual approval: the acknowledgement object must name this environment
async fn manual_approval_gate(
    ctx: &Context,
    platform: &Platform,
    env: &EnvironmentSpec,
    approval_object: Option<&str>,
) -> Result<GateResult> {
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let name = approval_object
        .map(String::from)
        .unwrap_or_else(|| format!("{}-promotion-approvals", platform.name_any()));

    let api: Api<ConfigMap> = ctx.cluster.namespaced(&namespace);
    let approved = api
        .get_opt(&name)
        .await
        .map_err(Error::from)?
        .and_then(|cm| cm.data)
        .and_then(|data| data.get(&env.name).cloned())
        .is_some_and(|v| v.eq_ignore_ascii_case("approved"));

    if approved {
        Ok(GateResult::Passed)
    } else {
        // Blocks indefinitely pending the external acknowledgement
        Ok(GateResult::Blocked(format!(
            "waiting for manual approval of environment '{}' in {name}",
            env.name
        )))
    }
}

/// Promote rendered artifacts from the source branch into the target
/// environment branch, then request a sync
pub async fn promote(ctx: &Context, platform: &Platform, to_env: &str) -> Result<GateResult> {
    let gitops = platform
        .spec
        .gitops
        .as_ref()
        .ok_or_else(|| Error::ConfigInvalid("platform has no GitOps binding".to_string()))?;
    let promotion = gitops
        .promotion
        .as_ref()
        .ok_or_else(|| Error::ConfigInvalid("platform has no promotion pipeline".to_string()))?;
    let env = promotion
        .environments
        .iter()
        .find(|e| e.name == to_env)
        .ok_or_else(|| Error::ConfigInvalid(format!("unknown promotion environment '{to_env}'")))?;

    match evaluate_gates(ctx, platform, env).await? {
        GateResult::Blocked(reason) => {
            debug!("promotion of {} to {to_env} blocked: {reason}", platform.key());
            return Ok(GateResult::Blocked(reason));
        }
        GateResult::Passed => {}
    }

    let credentials = super::sync::resolve_credentials(ctx, platform, gitops).await?;
    let rendered_path = gitops
        .repository
        .path
        .clone()
        .unwrap_or_else(|| "platform.yaml".to_string());

    // Read the rendered state from the source environment branch
    let source = super::git::GitWorkspace::clone(
        &gitops.repository.url,
        &gitops.repository.branch,
        credentials.clone(),
    )
    .await?;
    let rendered = source.fetch_file(&rendered_path)?;

    // Copy into the target branch and push
    let target =
        super::git::GitWorkspace::clone(&gitops.repository.url, &env.branch, credentials).await?;
    target.write_file(&rendered_path, &rendered)?;
    target
        .commit_and_push(
            &env.branch,
            "platform-operator <automation@observability.io>",
            &format!("promote {} to {to_env}", platform.name_any()),
        )
        .await?;

    super::source::request_source_sync(ctx, platform).await?;
    info!("promoted {} to environment {to_env}", platform.key());
    Ok(GateResult::Passed)
}
