//! # Reconciliation Logic
//!
//! The outer control loop over a single Platform: load, validate, handle
//! the finalizer, plan enabled components in dependency order, dispatch
//! their managers sequentially, aggregate status, and requeue. Partial
//! failure of siblings never aborts the pass; the aggregation rule decides
//! the overall phase.

use crate::components::all_managers;
use crate::constants::RECONCILE_ANNOTATION;
use crate::controller::context::Context;
use crate::controller::error::{Error, ErrorKind, Result};
use crate::controller::events::{emit_event_best_effort, EVENT_NORMAL, EVENT_WARNING};
use crate::controller::finalize::{ensure_finalizer, finalize_deletion};
use crate::controller::plan::{plan_components, unready_dependencies};
use crate::controller::status::{assemble_status, write_status};
use crate::crd::{ComponentPhase, ComponentStatus, Platform};
use crate::observability::metrics;
use crate::validation::{validate_create, AdmissionError};
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const QUEUE_NAME: &str = "platform";

/// Main reconciliation entry point, invoked by the controller runtime
pub async fn reconcile(platform: Arc<Platform>, ctx: Arc<Context>) -> Result<Action, Error> {
    metrics::add_workqueue_depth(QUEUE_NAME, 1);
    let permit = ctx
        .reconcile_permits
        .acquire()
        .await
        .map_err(|_| Error::Transient("reconcile gate closed during shutdown".to_string()))?;
    metrics::add_workqueue_depth(QUEUE_NAME, -1);

    let deadline = Duration::from_secs(ctx.config.reconcile_deadline_secs);
    let result = tokio::time::timeout(deadline, reconcile_inner(&platform, &ctx)).await;
    drop(permit);

    match result {
        Ok(inner) => inner,
        Err(_) => Err(Error::Transient(format!(
            "reconcile of {} exceeded the {}s deadline",
            platform.key(),
            deadline.as_secs()
        ))),
    }
}

async fn reconcile_inner(platform: &Platform, ctx: &Context) -> Result<Action, Error> {
    let start = Instant::now();
    let key = platform.key();

    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = platform.metadata.name.as_deref().unwrap_or("unknown"),
        resource.namespace = platform.metadata.namespace.as_deref().unwrap_or("default"),
        resource.kind = "Platform"
    );
    let _guard = span.enter();

    // Deletion observed: run the teardown flow and settle
    if platform.metadata.deletion_timestamp.is_some() {
        debug!("platform {key} is terminating");
        if crate::controller::finalize::has_finalizer(platform) {
            finalize_deletion(ctx, platform).await?;
        }
        return Ok(Action::await_change());
    }

    // Paused platforms keep their last state until resumed
    if platform.spec.paused {
        info!("reconciliation paused for {key}");
        let status = assemble_status(
            platform,
            platform
                .status
                .as_ref()
                .map(|s| s.components.clone())
                .unwrap_or_default(),
            Vec::new(),
            Some("reconciliation is paused".to_string()),
        );
        write_status(ctx, platform, status).await?;
        return Ok(Action::await_change());
    }

    // Re-validate against current invariants; a spec that got past
    // admission can still go stale against operator rules
    if let Err(e) = validate_create(platform) {
        let causes = match &e {
            AdmissionError::Invalid(causes) => causes
                .iter()
                .map(|c| format!("{}: {}", c.path, c.message))
                .collect(),
            _ => vec![e.to_string()],
        };
        error!("validation failed for {key}: {e}");
        metrics::increment_reconcile("Platform", "invalid");
        metrics::increment_error_kind(ErrorKind::ConfigInvalid.as_str());

        let status = assemble_status(platform, BTreeMap::new(), causes, Some(e.to_string()));
        write_status(ctx, platform, status).await?;
        emit_event_best_effort(
            &ctx.client,
            platform,
            EVENT_WARNING,
            "ValidationFailed",
            &e.to_string(),
        )
        .await;
        // No retry until the spec changes
        return Ok(Action::await_change());
    }

    ensure_finalizer(ctx, platform).await?;

    // Cost guards run before dispatch so their clamps shape this pass
    match crate::cost::reconcile_cost_guards(ctx, platform).await {
        Ok(transitions) => {
            for t in &transitions {
                let reason = if t.engage { "CostThresholdExceeded" } else { "CostThresholdReleased" };
                emit_event_best_effort(
                    &ctx.client,
                    platform,
                    if t.engage { EVENT_WARNING } else { EVENT_NORMAL },
                    reason,
                    &format!(
                        "{} at {:.1}% of budget (threshold {}%)",
                        t.component, t.estimate_percent, t.percent
                    ),
                )
                .await;
                if let Some(cost) = &platform.spec.cost {
                    crate::cost::notify_channels(cost, &platform.name_any(), t).await;
                }
            }
        }
        Err(e) => warn!("cost guard evaluation failed for {key}: {e}"),
    }

    // Dispatch managers in dependency order; siblings continue on failure
    let managers = all_managers();
    let plan = plan_components(platform);
    debug!("plan for {key}: {plan:?}");

    let mut statuses: BTreeMap<String, ComponentStatus> = BTreeMap::new();
    let mut retryable: Option<Error> = None;
    let mut dependency_waiting = false;

    for kind in plan {
        let waiting_on = unready_dependencies(platform, kind, &statuses);
        if let Some(dep) = waiting_on.first() {
            debug!("{kind} waits for {dep}");
            dependency_waiting = true;
            statuses.insert(
                kind.as_str().to_string(),
                ComponentStatus {
                    phase: ComponentPhase::Pending,
                    message: Some(format!("waiting for {dep} to become ready")),
                    ..ComponentStatus::default()
                },
            );
            continue;
        }

        let manager = managers
            .iter()
            .find(|m| m.kind() == kind)
            .expect("every kind has a manager");

        match manager.reconcile(ctx, platform).await {
            Ok(status) => {
                statuses.insert(kind.as_str().to_string(), status);
            }
            Err(e) => {
                error!("{kind} reconcile failed for {key}: {e}");
                metrics::increment_error_kind(e.kind().as_str());

                let previously_ready = platform
                    .status
                    .as_ref()
                    .and_then(|s| s.components.get(kind.as_str()))
                    .is_some_and(|s| s.phase == ComponentPhase::Ready);
                let phase = match e.kind() {
                    // A previously serving component behind an unreachable
                    // backend degrades rather than fails outright
                    ErrorKind::BackendUnavailable if previously_ready => ComponentPhase::Degraded,
                    _ => ComponentPhase::Failed,
                };
                statuses.insert(
                    kind.as_str().to_string(),
                    ComponentStatus {
                        phase,
                        message: Some(e.to_string()),
                        ..ComponentStatus::default()
                    },
                );

                match e.kind() {
                    ErrorKind::QuotaExceeded | ErrorKind::BackendUnavailable => {
                        emit_event_best_effort(
                            &ctx.client,
                            platform,
                            EVENT_WARNING,
                            e.kind().as_str(),
                            &e.to_string(),
                        )
                        .await;
                    }
                    _ => {}
                }

                // Keep the most severe retryable error for the queue; pure
                // config errors settle until the spec changes
                if !e.is_terminal() && retryable.is_none() {
                    retryable = Some(e);
                }
            }
        }
    }

    clear_manual_trigger(ctx, platform).await;

    let status = assemble_status(platform, statuses, Vec::new(), None);
    let phase = status.phase;
    write_status(ctx, platform, status).await?;

    metrics::observe_reconcile_duration("Platform", start.elapsed().as_secs_f64());

    if let Some(e) = retryable {
        metrics::increment_reconcile("Platform", "error");
        return Err(e);
    }

    metrics::increment_reconcile("Platform", "success");
    if ctx.backoffs.reset(&key) {
        debug!("backoff reset for {key} after successful reconcile");
    }

    info!(
        "reconciled {key} to phase {phase} in {:.2}s",
        start.elapsed().as_secs_f64()
    );

    // Fast cadence while anything progresses, slow once settled
    let requeue = if dependency_waiting || phase.is_progressing() {
        Duration::from_secs(ctx.config.progressing_requeue_secs)
    } else {
        Duration::from_secs(ctx.config.settled_requeue_secs)
    };
    Ok(Action::requeue(requeue))
}

/// Per-key error policy: terminal errors wait for a spec change, conflicts
/// retry promptly, dependency waits ride the fast cadence, everything else
/// backs off exponentially with jitter.
pub fn error_policy(platform: Arc<Platform>, error: &Error, ctx: Arc<Context>) -> Action {
    let key = platform.key();
    metrics::increment_workqueue_retries(QUEUE_NAME);

    match error.kind() {
        ErrorKind::ConfigInvalid | ErrorKind::VersionUnsupported => {
            // Settled until the user edits the spec
            Action::await_change()
        }
        ErrorKind::Conflict => Action::requeue(Duration::from_secs(10)),
        ErrorKind::DependencyUnready => {
            Action::requeue(Duration::from_secs(ctx.config.progressing_requeue_secs))
        }
        ErrorKind::QuotaExceeded => {
            // Slow cadence; retry storms against a full quota help nobody
            Action::requeue(Duration::from_secs(ctx.config.settled_requeue_secs))
        }
        ErrorKind::Transient | ErrorKind::BackendUnavailable => {
            let delay = ctx.backoffs.next_delay(
                &key,
                ctx.config.backoff_base_secs,
                ctx.config.backoff_cap_secs,
            );
            warn!(
                "retrying {key} after {}s (error count {})",
                delay.as_secs(),
                ctx.backoffs.error_count(&key)
            );
            Action::requeue(delay)
        }
    }
}

/// Clear the one-shot manual reconcile annotation after honoring it
async fn clear_manual_trigger(ctx: &Context, platform: &Platform) {
    let has_trigger = platform
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(RECONCILE_ANNOTATION));
    if !has_trigger {
        return;
    }

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Platform> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({
        "metadata": {"annotations": {RECONCILE_ANNOTATION: null}}
    });
    if let Err(e) = api
        .patch(
            &platform.name_any(),
            &PatchParams::apply(crate::constants::FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await
    {
        warn!("failed to clear manual trigger on {}: {e}", platform.key());
    } else {
        debug!("cleared manual trigger annotation on {}", platform.key());
    }
}
