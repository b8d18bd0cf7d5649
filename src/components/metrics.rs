//! # Metrics Manager
//!
//! Owns the metrics server (Prometheus) artifacts: stateful workload with
//! per-replica storage, scrape configuration, remote-write targets, and
//! retention wiring.

use super::common::service::service_url;
use super::ComponentManager;
use crate::crd::{ComponentKind, Platform};
use serde_json::json;

#[derive(Debug, Clone, Copy)]
pub struct MetricsManager;

impl ComponentManager for MetricsManager {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Metrics
    }

    fn default_version(&self) -> &'static str {
        "v2.48.0"
    }

    fn supported_majors(&self) -> std::ops::RangeInclusive<u64> {
        2..=3
    }

    fn config_file_name(&self) -> &'static str {
        "prometheus.yml"
    }

    fn render_defaults(&self, platform: &Platform) -> serde_json::Value {
        let spec = platform.spec.components.metrics.as_ref();
        let scrape_interval = spec
            .and_then(|m| m.scrape_interval.as_deref())
            .unwrap_or("30s");

        let mut global = json!({
            "scrape_interval": scrape_interval,
            "evaluation_interval": scrape_interval,
        });
        if let Some(labels) = spec.and_then(|m| m.external_labels.as_ref()) {
            global["external_labels"] = json!(labels);
        }

        let mut config = json!({
            "global": global,
            "scrape_configs": [
                {
                    "job_name": "kubernetes-pods",
                    "kubernetes_sd_configs": [{"role": "pod"}],
                },
                {
                    "job_name": "kubernetes-services",
                    "kubernetes_sd_configs": [{"role": "service"}],
                },
            ],
        });

        if let Some(remote_write) = spec.and_then(|m| m.remote_write.as_ref()) {
            let targets: Vec<serde_json::Value> = remote_write
                .iter()
                .map(|rw| {
                    let mut target = json!({"url": rw.url});
                    if let Some(headers) = &rw.headers {
                        target["headers"] = json!(headers);
                    }
                    target
                })
                .collect();
            config["remote_write"] = json!(targets);
        }

        if let Some(retention) = spec
            .and_then(|m| m.common.storage.as_ref())
            .and_then(|s| s.retention.as_deref())
        {
            config["storage"] = json!({"tsdb": {"retention": retention}});
        }

        config
    }
}

impl MetricsManager {
    /// Query endpoint handed to dependents (dashboards, collector)
    #[must_use]
    pub fn query_url(platform: &Platform) -> String {
        service_url(platform, ComponentKind::Metrics)
    }
}
