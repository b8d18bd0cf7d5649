//! # Component Specs
//!
//! Polymorphic component specifications. Each variant shares a common
//! envelope (enabled flag, version, replicas, resources, storage, ingress,
//! authentication, advanced config bag) and adds its own sub-blocks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logical component tag used for dispatch, labels, and status keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    Metrics,
    Dashboards,
    Logs,
    Traces,
    Collector,
}

impl ComponentKind {
    /// All component kinds in declaration order
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Metrics,
        ComponentKind::Dashboards,
        ComponentKind::Logs,
        ComponentKind::Traces,
        ComponentKind::Collector,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Metrics => "metrics",
            ComponentKind::Dashboards => "dashboards",
            ComponentKind::Logs => "logs",
            ComponentKind::Traces => "traces",
            ComponentKind::Collector => "collector",
        }
    }

    /// Upstream image name for the component
    #[must_use]
    pub fn image_name(&self) -> &'static str {
        match self {
            ComponentKind::Metrics => "prom/prometheus",
            ComponentKind::Dashboards => "grafana/grafana",
            ComponentKind::Logs => "grafana/loki",
            ComponentKind::Traces => "grafana/tempo",
            ComponentKind::Collector => "otel/opentelemetry-collector-contrib",
        }
    }

    /// Whether the upstream image tags carry the `v` prefix.
    /// Versions are normalized accordingly when rendering image references.
    #[must_use]
    pub fn tags_with_v_prefix(&self) -> bool {
        matches!(self, ComponentKind::Metrics)
    }

    /// Fixed non-root uid the component runs as
    #[must_use]
    pub fn run_as_user(&self) -> i64 {
        match self {
            ComponentKind::Metrics => 65534,
            ComponentKind::Dashboards => 472,
            ComponentKind::Logs => 10001,
            ComponentKind::Traces => 10001,
            ComponentKind::Collector => 10001,
        }
    }

    /// Primary container port
    #[must_use]
    pub fn port(&self) -> i32 {
        match self {
            ComponentKind::Metrics => 9090,
            ComponentKind::Dashboards => 3000,
            ComponentKind::Logs => 3100,
            ComponentKind::Traces => 3200,
            ComponentKind::Collector => 4317,
        }
    }

    /// Whether the component keeps local state and deploys as an ordered
    /// replicated workload with per-replica volume claims
    #[must_use]
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            ComponentKind::Metrics | ComponentKind::Logs | ComponentKind::Traces
        )
    }

    /// Components whose usable service endpoint this component consumes.
    /// A dependent is scheduled only after every dependency reports Ready.
    #[must_use]
    pub fn dependencies(&self) -> &'static [ComponentKind] {
        match self {
            ComponentKind::Metrics | ComponentKind::Logs | ComponentKind::Traces => &[],
            ComponentKind::Collector => &[
                ComponentKind::Metrics,
                ComponentKind::Logs,
                ComponentKind::Traces,
            ],
            ComponentKind::Dashboards => &[ComponentKind::Metrics],
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of observability components a Platform may enable
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentsSpec {
    /// Metrics server (time-series collection and querying)
    #[serde(default)]
    pub metrics: Option<MetricsSpec>,
    /// Dashboards (visualization frontend, consumes the metrics endpoint)
    #[serde(default)]
    pub dashboards: Option<DashboardsSpec>,
    /// Log store
    #[serde(default)]
    pub logs: Option<LogsSpec>,
    /// Trace store
    #[serde(default)]
    pub traces: Option<TracesSpec>,
    /// Telemetry collector (fans out to metrics, logs, and traces)
    #[serde(default)]
    pub collector: Option<CollectorSpec>,
}

impl ComponentsSpec {
    /// Common envelope for a component kind, if the block is present
    #[must_use]
    pub fn common(&self, kind: ComponentKind) -> Option<&CommonComponentSpec> {
        match kind {
            ComponentKind::Metrics => self.metrics.as_ref().map(|c| &c.common),
            ComponentKind::Dashboards => self.dashboards.as_ref().map(|c| &c.common),
            ComponentKind::Logs => self.logs.as_ref().map(|c| &c.common),
            ComponentKind::Traces => self.traces.as_ref().map(|c| &c.common),
            ComponentKind::Collector => self.collector.as_ref().map(|c| &c.common),
        }
    }

    /// Whether the component block exists and is enabled
    #[must_use]
    pub fn is_enabled(&self, kind: ComponentKind) -> bool {
        self.common(kind).is_some_and(|c| c.enabled)
    }

    /// Kinds that are present and enabled, in declaration order
    #[must_use]
    pub fn enabled_kinds(&self) -> Vec<ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }
}

/// Envelope fields shared by every component variant
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommonComponentSpec {
    /// Whether the component is deployed
    #[serde(default)]
    pub enabled: bool,
    /// Component version, e.g. "v2.48.0". Must match
    /// `^v?\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?$`
    #[serde(default)]
    pub version: Option<String>,
    /// Desired replica count. HA mode requires at least 2.
    #[serde(default)]
    pub replicas: Option<i32>,
    /// Resource budget, copied verbatim into the workload. Absent limits
    /// stay absent.
    #[serde(default)]
    pub resources: Option<ResourceBudget>,
    /// Persistent storage configuration
    #[serde(default)]
    pub storage: Option<StorageSpec>,
    /// Ingress exposure
    #[serde(default)]
    pub ingress: Option<ComponentIngressSpec>,
    /// Authentication for the component's UI/API
    #[serde(default)]
    pub auth: Option<AuthSpec>,
    /// Autoscaling policies translated into scaling artifacts for this
    /// component's workload
    #[serde(default)]
    pub autoscaling: Option<super::autoscaling::ComponentAutoscalingSpec>,
    /// Free-form advanced configuration, deep-merged into the rendered
    /// config after operator defaults. Scalars override, lists replace,
    /// maps overlay recursively.
    #[serde(default)]
    pub extra_config: Option<BTreeMap<String, serde_json::Value>>,
}

/// Requests and limits per resource kind, as Kubernetes quantity strings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBudget {
    /// Requested resources, e.g. {"cpu": "100m", "memory": "256Mi"}
    #[serde(default)]
    pub requests: Option<BTreeMap<String, String>>,
    /// Resource limits. When both are set, requests must not exceed limits
    /// per resource kind.
    #[serde(default)]
    pub limits: Option<BTreeMap<String, String>>,
}

/// Persistent storage block
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Volume size per replica, e.g. "10Gi"
    #[serde(default)]
    pub size: Option<String>,
    /// StorageClass name; cluster default when unset
    #[serde(default)]
    pub class: Option<String>,
    /// Retention window, e.g. "15d". Grammar: `^\d+[smhdwy]$`
    #[serde(default)]
    pub retention: Option<String>,
    /// Object-store backend for long-term storage
    #[serde(default)]
    pub backend: Option<ObjectStoreSpec>,
}

/// Object-store backend selector
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ObjectStoreSpec {
    /// Local filesystem (single-node or testing deployments)
    Filesystem {
        /// Mount path inside the workload
        #[serde(default)]
        path: Option<String>,
    },
    /// Amazon S3 or any S3-compatible store
    S3 {
        /// Bucket name (required when the backend is enabled)
        bucket: String,
        /// Region (required when the backend is enabled)
        region: String,
        /// Custom endpoint for S3-compatible stores
        #[serde(default)]
        endpoint: Option<String>,
        /// Secret holding accessKeyId/secretAccessKey. When absent the
        /// workload is assumed to authenticate via its IAM role and no
        /// credentials secret is written.
        #[serde(default)]
        credentials_secret: Option<String>,
    },
    /// Google Cloud Storage
    Gcs {
        /// Bucket name
        bucket: String,
        /// Secret holding the service-account key. Absent means workload
        /// identity.
        #[serde(default)]
        credentials_secret: Option<String>,
    },
    /// Azure Blob Storage
    Azure {
        /// Storage container
        container: String,
        /// Storage account name
        account: String,
        /// Secret holding the account key. Absent means managed identity.
        #[serde(default)]
        credentials_secret: Option<String>,
    },
}

impl ObjectStoreSpec {
    /// Stable family tag; changing family on a stateful component requires
    /// zero replicas or an explicit migration acknowledgement
    #[must_use]
    pub fn family(&self) -> &'static str {
        match self {
            ObjectStoreSpec::Filesystem { .. } => "filesystem",
            ObjectStoreSpec::S3 { .. } => "s3",
            ObjectStoreSpec::Gcs { .. } => "gcs",
            ObjectStoreSpec::Azure { .. } => "azure",
        }
    }
}

/// Ingress exposure for a component
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentIngressSpec {
    /// Whether an Ingress is rendered
    #[serde(default)]
    pub enabled: bool,
    /// Host name; must be a valid DNS name when enabled
    #[serde(default)]
    pub host: Option<String>,
    /// HTTP path prefix, defaults to "/"
    #[serde(default)]
    pub path: Option<String>,
    /// IngressClass name
    #[serde(default)]
    pub class_name: Option<String>,
    /// TLS termination
    #[serde(default)]
    pub tls: Option<IngressTlsSpec>,
    /// User annotations, merged after operator defaults
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// TLS block for an ingress
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressTlsSpec {
    /// Whether TLS is terminated at the ingress
    #[serde(default)]
    pub enabled: bool,
    /// Reference to an existing TLS secret
    #[serde(default)]
    pub secret_name: Option<String>,
    /// cert-manager issuer annotation value; either this or `secretName`
    /// is required when TLS is enabled
    #[serde(default)]
    pub cert_manager_issuer: Option<String>,
}

/// Authentication for a component's UI/API
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSpec {
    /// Authentication mode
    #[serde(default)]
    pub mode: AuthMode,
    /// Admin user name for basic auth, defaults to "admin"
    #[serde(default)]
    pub admin_user: Option<String>,
    /// Existing secret holding the admin password. When unset a password
    /// is generated once and persisted; reconciles never rotate it.
    #[serde(default)]
    pub admin_password_secret: Option<String>,
    /// OIDC issuer URL when mode is `oidc`
    #[serde(default)]
    pub oidc_issuer: Option<String>,
    /// OIDC client id
    #[serde(default)]
    pub oidc_client_id: Option<String>,
}

/// Supported authentication modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    /// No authentication (in-cluster access only)
    #[default]
    None,
    /// Basic auth with an admin credential
    Basic,
    /// OpenID Connect
    Oidc,
}

/// Metrics server component
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSpec {
    #[serde(flatten)]
    pub common: CommonComponentSpec,
    /// Remote-write targets for federating samples out of the cluster
    #[serde(default)]
    pub remote_write: Option<Vec<RemoteWriteSpec>>,
    /// External labels attached to every shipped sample
    #[serde(default)]
    pub external_labels: Option<BTreeMap<String, String>>,
    /// Scrape interval, e.g. "30s"
    #[serde(default)]
    pub scrape_interval: Option<String>,
}

/// A single remote-write target
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWriteSpec {
    /// Target URL
    pub url: String,
    /// Static headers sent with every request
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Secret holding bearer credentials for the target
    #[serde(default)]
    pub credentials_secret: Option<String>,
}

/// Dashboards component
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardsSpec {
    #[serde(flatten)]
    pub common: CommonComponentSpec,
    /// Plugins installed at startup
    #[serde(default)]
    pub plugins: Option<Vec<String>>,
    /// Provision datasources pointing at the platform's own metrics, logs,
    /// and traces endpoints
    #[serde(default = "default_true")]
    pub provision_datasources: bool,
}

/// Log store component
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogsSpec {
    #[serde(flatten)]
    pub common: CommonComponentSpec,
    /// Index schema periods, newest last. Only supported schema versions
    /// are accepted.
    #[serde(default)]
    pub schema: Option<Vec<SchemaPeriodSpec>>,
    /// Ring configuration for the distributed mode
    #[serde(default)]
    pub ring: Option<RingSpec>,
}

/// Trace store component
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TracesSpec {
    #[serde(flatten)]
    pub common: CommonComponentSpec,
    /// Ring configuration for the distributed mode
    #[serde(default)]
    pub ring: Option<RingSpec>,
    /// Supported ingestion protocols, defaults to ["otlp"]
    #[serde(default)]
    pub protocols: Option<Vec<String>>,
}

/// Telemetry collector component
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectorSpec {
    #[serde(flatten)]
    pub common: CommonComponentSpec,
    /// Pipeline definitions merged into the rendered collector config
    #[serde(default)]
    pub pipelines: Option<BTreeMap<String, serde_json::Value>>,
}

/// One index schema period for the log/trace stores
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaPeriodSpec {
    /// Schema version tag, one of v11/v12/v13
    pub version: String,
    /// Start date, e.g. "2024-01-01"
    pub from: String,
    /// Index store backing this period
    #[serde(default)]
    pub store: Option<String>,
}

/// Hash-ring configuration for distributed stateful components
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RingSpec {
    /// Replication factor for ring-stored data
    #[serde(default)]
    pub replication_factor: Option<i32>,
    /// Key-value store backing the ring, defaults to "memberlist"
    #[serde(default)]
    pub kvstore: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Schema versions accepted for log/trace index periods
pub const SUPPORTED_SCHEMA_VERSIONS: [&str; 3] = ["v11", "v12", "v13"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_kinds_order_follows_declaration() {
        let spec = ComponentsSpec {
            metrics: Some(MetricsSpec {
                common: CommonComponentSpec {
                    enabled: true,
                    ..CommonComponentSpec::default()
                },
                ..MetricsSpec::default()
            }),
            collector: Some(CollectorSpec {
                common: CommonComponentSpec {
                    enabled: true,
                    ..CommonComponentSpec::default()
                },
                ..CollectorSpec::default()
            }),
            dashboards: Some(DashboardsSpec {
                common: CommonComponentSpec {
                    enabled: false,
                    ..CommonComponentSpec::default()
                },
                ..DashboardsSpec::default()
            }),
            ..ComponentsSpec::default()
        };

        assert_eq!(
            spec.enabled_kinds(),
            vec![ComponentKind::Metrics, ComponentKind::Collector]
        );
        assert!(!spec.is_enabled(ComponentKind::Dashboards));
        assert!(!spec.is_enabled(ComponentKind::Logs));
    }

    #[test]
    fn test_component_envelope_round_trips_camel_case() {
        let yaml = r#"
enabled: true
version: v2.48.0
replicas: 2
resources:
  requests:
    cpu: 100m
    memory: 256Mi
  limits:
    cpu: 500m
    memory: 1Gi
remoteWrite:
  - url: https://mimir.example.com/api/v1/push
"#;
        let spec: MetricsSpec = serde_yaml::from_str(yaml).expect("valid spec yaml");
        assert!(spec.common.enabled);
        assert_eq!(spec.common.version.as_deref(), Some("v2.48.0"));
        assert_eq!(spec.common.replicas, Some(2));
        assert_eq!(spec.remote_write.as_ref().map(Vec::len), Some(1));

        let requests = spec
            .common
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
            .expect("requests present");
        assert_eq!(requests.get("cpu").map(String::as_str), Some("100m"));
    }

    #[test]
    fn test_object_store_family_tags() {
        let s3 = ObjectStoreSpec::S3 {
            bucket: "b".into(),
            region: "us-east-1".into(),
            endpoint: None,
            credentials_secret: None,
        };
        assert_eq!(s3.family(), "s3");
        let fs = ObjectStoreSpec::Filesystem { path: None };
        assert_eq!(fs.family(), "filesystem");
    }

    #[test]
    fn test_dependency_graph_is_acyclic_and_orders_dashboards_after_metrics() {
        for kind in ComponentKind::ALL {
            for dep in kind.dependencies() {
                assert!(
                    !dep.dependencies().contains(&kind),
                    "cycle between {kind} and {dep}"
                );
            }
        }
        assert!(ComponentKind::Dashboards
            .dependencies()
            .contains(&ComponentKind::Metrics));
    }
}
