//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `reconcile_total` - Total reconciliations by kind and result
//! - `reconcile_duration_seconds` - Duration of reconciliations by kind
//! - `reconcile_error_kinds_total` - Errors by taxonomy kind
//! - `workqueue_depth` - Keys waiting on the concurrency gate
//! - `workqueue_retries_total` - Requeues caused by errors
//! - `component_ready` - Per-component readiness gauge
//! - `gitops_sync_total` - GitOps sync attempts by result
//! - `gitops_drift_detected` - Whether the last drift pass found divergence

use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILE_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("reconcile_total", "Total number of reconciliations"),
        &["kind", "result"],
    )
    .expect("Failed to create RECONCILE_TOTAL metric - this should never happen")
});

static RECONCILE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "reconcile_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILE_DURATION metric - this should never happen")
});

static RECONCILE_ERROR_KINDS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "reconcile_error_kinds_total",
            "Total reconciliation errors by taxonomy kind",
        ),
        &["error_kind"],
    )
    .expect("Failed to create RECONCILE_ERROR_KINDS_TOTAL metric - this should never happen")
});

static WORKQUEUE_DEPTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "workqueue_depth",
            "Keys waiting for a reconcile slot",
        ),
        &["name"],
    )
    .expect("Failed to create WORKQUEUE_DEPTH metric - this should never happen")
});

static WORKQUEUE_RETRIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "workqueue_retries_total",
            "Total requeues caused by reconciliation errors",
        ),
        &["name"],
    )
    .expect("Failed to create WORKQUEUE_RETRIES_TOTAL metric - this should never happen")
});

static COMPONENT_READY: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "component_ready",
            "Whether a platform component reports Ready (1) or not (0)",
        ),
        &["platform", "component"],
    )
    .expect("Failed to create COMPONENT_READY metric - this should never happen")
});

static GITOPS_SYNC_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gitops_sync_total",
            "Total GitOps sync attempts by result",
        ),
        &["platform", "result"],
    )
    .expect("Failed to create GITOPS_SYNC_TOTAL metric - this should never happen")
});

static GITOPS_DRIFT_DETECTED: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "gitops_drift_detected",
            "Whether the last drift pass found divergence (1) or not (0)",
        ),
        &["platform"],
    )
    .expect("Failed to create GITOPS_DRIFT_DETECTED metric - this should never happen")
});

/// Register all metrics with the process registry. Called once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILE_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_DURATION.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_ERROR_KINDS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WORKQUEUE_DEPTH.clone()))?;
    REGISTRY.register(Box::new(WORKQUEUE_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(COMPONENT_READY.clone()))?;
    REGISTRY.register(Box::new(GITOPS_SYNC_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GITOPS_DRIFT_DETECTED.clone()))?;
    Ok(())
}

pub fn increment_reconcile(kind: &str, result: &str) {
    RECONCILE_TOTAL.with_label_values(&[kind, result]).inc();
}

pub fn observe_reconcile_duration(kind: &str, seconds: f64) {
    RECONCILE_DURATION.with_label_values(&[kind]).observe(seconds);
}

pub fn increment_error_kind(error_kind: &str) {
    RECONCILE_ERROR_KINDS_TOTAL
        .with_label_values(&[error_kind])
        .inc();
}

pub fn set_workqueue_depth(name: &str, depth: i64) {
    WORKQUEUE_DEPTH.with_label_values(&[name]).set(depth);
}

pub fn add_workqueue_depth(name: &str, delta: i64) {
    WORKQUEUE_DEPTH.with_label_values(&[name]).add(delta);
}

pub fn increment_workqueue_retries(name: &str) {
    WORKQUEUE_RETRIES_TOTAL.with_label_values(&[name]).inc();
}

pub fn set_component_ready(platform: &str, component: &str, ready: bool) {
    COMPONENT_READY
        .with_label_values(&[platform, component])
        .set(i64::from(ready));
}

pub fn increment_gitops_sync(platform: &str, result: &str) {
    GITOPS_SYNC_TOTAL
        .with_label_values(&[platform, result])
        .inc();
}

pub fn set_gitops_drift(platform: &str, drifted: bool) {
    GITOPS_DRIFT_DETECTED
        .with_label_values(&[platform])
        .set(i64::from(drifted));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent_per_process() {
        // First registration wins; a second would collide, which is why it
        // runs exactly once from main
        let _ = register_metrics();
        increment_reconcile("Platform", "success");
        observe_reconcile_duration("Platform", 0.25);
        set_component_ready("prod", "metrics", true);
        set_gitops_drift("prod", false);

        use prometheus::Encoder;
        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&REGISTRY.gather(), &mut buffer)
            .expect("text encoding succeeds");
        let exposition = String::from_utf8(buffer).expect("utf8 exposition");
        assert!(exposition.contains("reconcile_total"));
        assert!(exposition.contains("component_ready"));
    }
}
