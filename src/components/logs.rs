//! # Logs Manager
//!
//! Owns the log store (Loki) artifacts: stateful workload, index schema
//! periods, ring configuration, and the object-store backend block.

use super::ComponentManager;
use crate::crd::{ComponentKind, ObjectStoreSpec, Platform};
use serde_json::json;

#[derive(Debug, Clone, Copy)]
pub struct LogsManager;

impl ComponentManager for LogsManager {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Logs
    }

    fn default_version(&self) -> &'static str {
        "2.9.4"
    }

    fn supported_majors(&self) -> std::ops::RangeInclusive<u64> {
        2..=3
    }

    fn config_file_name(&self) -> &'static str {
        "loki.yaml"
    }

    fn render_defaults(&self, platform: &Platform) -> serde_json::Value {
        let spec = platform.spec.components.logs.as_ref();
        let common = spec.map(|l| &l.common);

        let mut config = json!({
            "auth_enabled": false,
            "server": {"http_listen_port": ComponentKind::Logs.port()},
            "common": {
                "replication_factor": spec
                    .and_then(|l| l.ring.as_ref())
                    .and_then(|r| r.replication_factor)
                    .unwrap_or(1),
                "ring": {
                    "kvstore": {
                        "store": spec
                            .and_then(|l| l.ring.as_ref())
                            .and_then(|r| r.kvstore.as_deref())
                            .unwrap_or("memberlist"),
                    },
                },
            },
        });

        // Schema periods, newest last; the validator already pinned the
        // versions to the supported set
        let periods: Vec<serde_json::Value> = spec
            .and_then(|l| l.schema.as_ref())
            .map(|schema| {
                schema
                    .iter()
                    .map(|p| {
                        json!({
                            "from": p.from,
                            "schema": p.version,
                            "store": p.store.as_deref().unwrap_or("tsdb"),
                            "object_store": object_store_tag(common.and_then(|c| c.storage.as_ref()).and_then(|s| s.backend.as_ref())),
                            "index": {"prefix": "index_", "period": "24h"},
                        })
                    })
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![json!({
                    "from": "2024-01-01",
                    "schema": "v13",
                    "store": "tsdb",
                    "object_store": object_store_tag(common.and_then(|c| c.storage.as_ref()).and_then(|s| s.backend.as_ref())),
                    "index": {"prefix": "index_", "period": "24h"},
                })]
            });
        config["schema_config"] = json!({"configs": periods});

        if let Some(backend) = common
            .and_then(|c| c.storage.as_ref())
            .and_then(|s| s.backend.as_ref())
        {
            config["storage_config"] = render_backend(backend);
        }

        if let Some(retention) = common
            .and_then(|c| c.storage.as_ref())
            .and_then(|s| s.retention.as_deref())
        {
            config["limits_config"] = json!({"retention_period": retention});
        }

        config
    }
}

/// Backend tag used in schema period entries
fn object_store_tag(backend: Option<&ObjectStoreSpec>) -> &'static str {
    match backend {
        Some(ObjectStoreSpec::S3 { .. }) => "s3",
        Some(ObjectStoreSpec::Gcs { .. }) => "gcs",
        Some(ObjectStoreSpec::Azure { .. }) => "azure",
        Some(ObjectStoreSpec::Filesystem { .. }) | None => "filesystem",
    }
}

/// Storage block rendered from the backend selector. Credentials never
/// appear here; they reach the workload as environment variables.
fn render_backend(backend: &ObjectStoreSpec) -> serde_json::Value {
    match backend {
        ObjectStoreSpec::S3 {
            bucket,
            region,
            endpoint,
            ..
        } => {
            let mut block = json!({"bucketnames": bucket, "region": region});
            if let Some(endpoint) = endpoint {
                block["endpoint"] = json!(endpoint);
            }
            json!({"aws": block})
        }
        ObjectStoreSpec::Gcs { bucket, .. } => json!({"gcs": {"bucket_name": bucket}}),
        ObjectStoreSpec::Azure { container, account, .. } => json!({
            "azure": {"container_name": container, "account_name": account}
        }),
        ObjectStoreSpec::Filesystem { path } => json!({
            "filesystem": {"directory": path.as_deref().unwrap_or("/var/lib/logs/chunks")}
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::components::{
        CommonComponentSpec, ComponentsSpec, LogsSpec, SchemaPeriodSpec, StorageSpec,
    };
    use crate::crd::PlatformSpec;

    fn platform(spec: LogsSpec) -> Platform {
        Platform::new(
            "prod",
            PlatformSpec {
                components: ComponentsSpec {
                    logs: Some(spec),
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
        )
    }

    #[test]
    fn test_schema_periods_rendered_in_order() {
        let spec = LogsSpec {
            common: CommonComponentSpec {
                enabled: true,
                ..CommonComponentSpec::default()
            },
            schema: Some(vec![
                SchemaPeriodSpec {
                    version: "v12".to_string(),
                    from: "2023-01-01".to_string(),
                    store: None,
                },
                SchemaPeriodSpec {
                    version: "v13".to_string(),
                    from: "2024-06-01".to_string(),
                    store: Some("tsdb".to_string()),
                },
            ]),
            ring: None,
        };

        let config = LogsManager.render_defaults(&platform(spec));
        let periods = config["schema_config"]["configs"].as_array().unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0]["schema"], "v12");
        assert_eq!(periods[1]["from"], "2024-06-01");
    }

    #[test]
    fn test_s3_backend_block_without_credentials() {
        let spec = LogsSpec {
            common: CommonComponentSpec {
                enabled: true,
                storage: Some(StorageSpec {
                    backend: Some(ObjectStoreSpec::S3 {
                        bucket: "logs-bucket".to_string(),
                        region: "eu-west-1".to_string(),
                        endpoint: None,
                        credentials_secret: Some("s3-creds".to_string()),
                    }),
                    ..StorageSpec::default()
                }),
                ..CommonComponentSpec::default()
            },
            schema: None,
            ring: None,
        };

        let config = LogsManager.render_defaults(&platform(spec));
        assert_eq!(config["storage_config"]["aws"]["bucketnames"], "logs-bucket");
        assert_eq!(config["storage_config"]["aws"]["region"], "eu-west-1");
        // Credentials ride env vars, never the rendered config
        assert!(config["storage_config"]["aws"].get("secret_access_key").is_none());
        assert_eq!(config["schema_config"]["configs"][0]["object_store"], "s3");
    }

    #[test]
    fn test_ring_defaults_to_memberlist() {
        let spec = LogsSpec {
            common: CommonComponentSpec {
                enabled: true,
                ..CommonComponentSpec::default()
            },
            schema: None,
            ring: None,
        };
        let config = LogsManager.render_defaults(&platform(spec));
        assert_eq!(config["common"]["ring"]["kvstore"]["store"], "memberlist");
        assert_eq!(config["common"]["replication_factor"], 1);
    }
}
