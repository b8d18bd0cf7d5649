//! # Collector Manager
//!
//! Owns the telemetry collector artifacts. The collector fans ingested
//! telemetry out to the metrics, log, and trace stores, so the planner
//! schedules it after all three report usable endpoints.

use super::common::service::service_url;
use super::ComponentManager;
use crate::crd::{ComponentKind, Platform};
use serde_json::json;

#[derive(Debug, Clone, Copy)]
pub struct CollectorManager;

impl ComponentManager for CollectorManager {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Collector
    }

    fn default_version(&self) -> &'static str {
        "0.91.0"
    }

    fn supported_majors(&self) -> std::ops::RangeInclusive<u64> {
        0..=0
    }

    fn config_file_name(&self) -> &'static str {
        "collector.yaml"
    }

    fn render_defaults(&self, platform: &Platform) -> serde_json::Value {
        let components = &platform.spec.components;

        let mut exporters = serde_json::Map::new();
        let mut metrics_exporters = Vec::new();
        let mut logs_exporters = Vec::new();
        let mut traces_exporters = Vec::new();

        if components.is_enabled(ComponentKind::Metrics) {
            exporters.insert(
                "prometheusremotewrite".to_string(),
                json!({"endpoint": format!("{}/api/v1/write", service_url(platform, ComponentKind::Metrics))}),
            );
            metrics_exporters.push("prometheusremotewrite");
        }
        if components.is_enabled(ComponentKind::Logs) {
            exporters.insert(
                "loki".to_string(),
                json!({"endpoint": format!("{}/loki/api/v1/push", service_url(platform, ComponentKind::Logs))}),
            );
            logs_exporters.push("loki");
        }
        if components.is_enabled(ComponentKind::Traces) {
            exporters.insert(
                "otlp/traces".to_string(),
                json!({"endpoint": service_url(platform, ComponentKind::Traces), "tls": {"insecure": true}}),
            );
            traces_exporters.push("otlp/traces");
        }

        let mut pipelines = serde_json::Map::new();
        if !metrics_exporters.is_empty() {
            pipelines.insert(
                "metrics".to_string(),
                json!({"receivers": ["otlp"], "processors": ["batch"], "exporters": metrics_exporters}),
            );
        }
        if !logs_exporters.is_empty() {
            pipelines.insert(
                "logs".to_string(),
                json!({"receivers": ["otlp"], "processors": ["batch"], "exporters": logs_exporters}),
            );
        }
        if !traces_exporters.is_empty() {
            pipelines.insert(
                "traces".to_string(),
                json!({"receivers": ["otlp"], "processors": ["batch"], "exporters": traces_exporters}),
            );
        }

        // User pipelines overlay the generated ones
        if let Some(user) = platform
            .spec
            .components
            .collector
            .as_ref()
            .and_then(|c| c.pipelines.as_ref())
        {
            for (name, pipeline) in user {
                pipelines.insert(name.clone(), pipeline.clone());
            }
        }

        json!({
            "receivers": {
                "otlp": {
                    "protocols": {
                        "grpc": {"endpoint": format!("0.0.0.0:{}", ComponentKind::Collector.port())},
                        "http": {"endpoint": "0.0.0.0:4318"},
                    },
                },
            },
            "processors": {"batch": {}},
            "exporters": exporters,
            "service": {"pipelines": pipelines},
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::components::{
        CollectorSpec, CommonComponentSpec, ComponentsSpec, LogsSpec, MetricsSpec,
    };
    use crate::crd::PlatformSpec;

    fn enabled_common() -> CommonComponentSpec {
        CommonComponentSpec {
            enabled: true,
            ..CommonComponentSpec::default()
        }
    }

    fn platform(metrics: bool, logs: bool) -> Platform {
        let mut p = Platform::new(
            "prod",
            PlatformSpec {
                components: ComponentsSpec {
                    metrics: metrics.then(|| MetricsSpec {
                        common: enabled_common(),
                        ..MetricsSpec::default()
                    }),
                    logs: logs.then(|| LogsSpec {
                        common: enabled_common(),
                        schema: None,
                        ring: None,
                    }),
                    collector: Some(CollectorSpec {
                        common: enabled_common(),
                        pipelines: None,
                    }),
                    ..ComponentsSpec::default()
                },
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
        p.metadata.namespace = Some("monitoring".to_string());
        p
    }

    #[test]
    fn test_pipelines_track_enabled_components() {
        let config = CollectorManager.render_defaults(&platform(true, true));
        let pipelines = config["service"]["pipelines"].as_object().unwrap();
        assert!(pipelines.contains_key("metrics"));
        assert!(pipelines.contains_key("logs"));
        assert!(!pipelines.contains_key("traces"));
    }

    #[test]
    fn test_exporter_endpoints_use_service_urls() {
        let config = CollectorManager.render_defaults(&platform(true, false));
        assert_eq!(
            config["exporters"]["prometheusremotewrite"]["endpoint"],
            "http://prod-metrics.monitoring.svc.cluster.local:9090/api/v1/write"
        );
    }

    #[test]
    fn test_collector_is_stateless() {
        assert!(!ComponentKind::Collector.is_stateful());
    }
}
