//! # Dashboards Manager
//!
//! Owns the dashboards (Grafana) artifacts. Depends on the metrics server's
//! endpoint; the planner schedules it after metrics reports Ready.
//! Datasources for the platform's own metrics, logs, and traces endpoints
//! are provisioned into the rendered config.

use super::common::secrets::{ADMIN_PASSWORD_KEY, ADMIN_USER_KEY};
use super::common::service::service_url;
use super::ComponentManager;
use crate::crd::{AuthMode, ComponentKind, Platform};
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, SecretKeySelector};
use serde_json::json;

#[derive(Debug, Clone, Copy)]
pub struct DashboardsManager;

impl ComponentManager for DashboardsManager {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Dashboards
    }

    fn default_version(&self) -> &'static str {
        "10.2.0"
    }

    fn supported_majors(&self) -> std::ops::RangeInclusive<u64> {
        9..=11
    }

    fn config_file_name(&self) -> &'static str {
        "grafana.ini.yml"
    }

    fn render_defaults(&self, platform: &Platform) -> serde_json::Value {
        let spec = platform.spec.components.dashboards.as_ref();

        let mut config = json!({
            "server": {"http_port": ComponentKind::Dashboards.port()},
            "analytics": {"reporting_enabled": false},
            "security": {"allow_embedding": false},
        });

        if let Some(plugins) = spec.and_then(|d| d.plugins.as_ref()) {
            config["plugins"] = json!({"preinstall": plugins});
        }

        if spec.is_some_and(|d| d.provision_datasources) {
            let mut datasources = Vec::new();
            let components = &platform.spec.components;
            if components.is_enabled(ComponentKind::Metrics) {
                datasources.push(json!({
                    "name": "Metrics",
                    "type": "prometheus",
                    "url": service_url(platform, ComponentKind::Metrics),
                    "isDefault": true,
                }));
            }
            if components.is_enabled(ComponentKind::Logs) {
                datasources.push(json!({
                    "name": "Logs",
                    "type": "loki",
                    "url": service_url(platform, ComponentKind::Logs),
                }));
            }
            if components.is_enabled(ComponentKind::Traces) {
                datasources.push(json!({
                    "name": "Traces",
                    "type": "tempo",
                    "url": service_url(platform, ComponentKind::Traces),
                }));
            }
            config["datasources"] = json!(datasources);
        }

        config
    }

    fn extra_env(&self, platform: &Platform) -> Vec<EnvVar> {
        let auth = platform
            .spec
            .components
            .dashboards
            .as_ref()
            .and_then(|d| d.common.auth.as_ref());
        let Some(auth) = auth else {
            return Vec::new();
        };
        if auth.mode != AuthMode::Basic {
            return Vec::new();
        }

        let secret_name = auth.admin_password_secret.clone().unwrap_or_else(|| {
            format!(
                "{}-admin",
                super::common::labels::artifact_name(platform, ComponentKind::Dashboards)
            )
        });

        let from_secret = |env: &str, key: &str| EnvVar {
            name: env.to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret_name.clone(),
                    key: key.to_string(),
                    optional: Some(false),
                }),
                ..EnvVarSource::default()
            }),
            ..EnvVar::default()
        };

        vec![
            from_secret("GF_SECURITY_ADMIN_USER", ADMIN_USER_KEY),
            from_secret("GF_SECURITY_ADMIN_PASSWORD", ADMIN_PASSWORD_KEY),
        ]
    }
}
