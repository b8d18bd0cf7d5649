//! # Traces Manager
//!
//! Owns the trace store (Tempo) artifacts: stateful workload, ingestion
//! protocols, ring configuration, and the object-store backend block.

use super::ComponentManager;
use crate::crd::{ComponentKind, ObjectStoreSpec, Platform};
use serde_json::json;

#[derive(Debug, Clone, Copy)]
pub struct TracesManager;

impl ComponentManager for TracesManager {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Traces
    }

    fn default_version(&self) -> &'static str {
        "2.3.1"
    }

    fn supported_majors(&self) -> std::ops::RangeInclusive<u64> {
        2..=2
    }

    fn config_file_name(&self) -> &'static str {
        "tempo.yaml"
    }

    fn render_defaults(&self, platform: &Platform) -> serde_json::Value {
        let spec = platform.spec.components.traces.as_ref();
        let common = spec.map(|t| &t.common);

        let protocols: Vec<String> = spec
            .and_then(|t| t.protocols.clone())
            .unwrap_or_else(|| vec!["otlp".to_string()]);
        let mut receivers = serde_json::Map::new();
        for protocol in &protocols {
            receivers.insert(protocol.clone(), json!({}));
        }

        let mut config = json!({
            "server": {"http_listen_port": ComponentKind::Traces.port()},
            "distributor": {"receivers": receivers},
            "ingester": {
                "lifecycler": {
                    "ring": {
                        "replication_factor": spec
                            .and_then(|t| t.ring.as_ref())
                            .and_then(|r| r.replication_factor)
                            .unwrap_or(1),
                        "kvstore": {
                            "store": spec
                                .and_then(|t| t.ring.as_ref())
                                .and_then(|r| r.kvstore.as_deref())
                                .unwrap_or("memberlist"),
                        },
                    },
                },
            },
        });

        let backend = common
            .and_then(|c| c.storage.as_ref())
            .and_then(|s| s.backend.as_ref());
        config["storage"] = json!({"trace": render_backend(backend)});

        if let Some(retention) = common
            .and_then(|c| c.storage.as_ref())
            .and_then(|s| s.retention.as_deref())
        {
            config["compactor"] = json!({
                "compaction": {"block_retention": retention}
            });
        }

        config
    }
}

fn render_backend(backend: Option<&ObjectStoreSpec>) -> serde_json::Value {
    match backend {
        Some(ObjectStoreSpec::S3 {
            bucket,
            region,
            endpoint,
            ..
        }) => {
            let mut block = json!({"bucket": bucket, "region": region});
            if let Some(endpoint) = endpoint {
                block["endpoint"] = json!(endpoint);
            }
            json!({"backend": "s3", "s3": block})
        }
        Some(ObjectStoreSpec::Gcs { bucket, .. }) => {
            json!({"backend": "gcs", "gcs": {"bucket_name": bucket}})
        }
        Some(ObjectStoreSpec::Azure { container, account, .. }) => json!({
            "backend": "azure",
            "azure": {"container_name": container, "storage_account_name": account}
        }),
        Some(ObjectStoreSpec::Filesystem { path }) => {
            let path = path.as_deref().unwrap_or("/var/lib/traces/blocks");
            json!({"backend": "local", "local": {"path": path}})
        }
        None => json!({"backend": "local", "local": {"path": "/var/lib/traces/blocks"}}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::components::{CommonComponentSpec, ComponentsSpec, StorageSpec, TracesSpec};
    use crate::crd::PlatformSpec;

    fn platform(spec: TracesSpec) -> Platform {
        Platform::new(
            "prod",
            PlatformSpec {
                components: ComponentsSpec {
                    traces: Some(spec),
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
    fn test_default_protocol_is_otlp() {
        let spec = TracesSpec {
            common: CommonComponentSpec {
                enabled: true,
                ..CommonComponentSpec::default()
            },
            ring: None,
            protocols: None,
        };
        let config = TracesManager.render_defaults(&platform(spec));
        assert!(config["distributor"]["receivers"].get("otlp").is_some());
    }

    #[test]
    fn test_local_backend_when_no_object_store() {
        let spec = TracesSpec {
            common: CommonComponentSpec {
                enabled: true,
                ..CommonComponentSpec::default()
            },
            ring: None,
            protocols: None,
        };
        let config = TracesManager.render_defaults(&platform(spec));
        assert_eq!(config["storage"]["trace"]["backend"], "local");
    }

    #[test]
    fn test_gcs_backend_block() {
        let spec = TracesSpec {
            common: CommonComponentSpec {
                enabled: true,
                storage: Some(StorageSpec {
                    backend: Some(ObjectStoreSpec::Gcs {
                        bucket: "traces".to_string(),
                        credentials_secret: None,
                    }),
                    retention: Some("336h".to_string()),
                    ..StorageSpec::default()
                }),
                ..CommonComponentSpec::default()
            },
            ring: None,
            protocols: None,
        };
        let config = TracesManager.render_defaults(&platform(spec));
        assert_eq!(config["storage"]["trace"]["backend"], "gcs");
        assert_eq!(config["storage"]["trace"]["gcs"]["bucket_name"], "traces");
        assert_eq!(config["compactor"]["compaction"]["block_retention"], "336h");
    }
}
