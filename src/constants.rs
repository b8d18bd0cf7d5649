//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the Platform resource
pub const API_GROUP: &str = "observability.io";

/// Field manager identity used for server-side apply
pub const FIELD_MANAGER: &str = "platform-operator";

/// Finalizer placed on every Platform while its artifacts exist
pub const PLATFORM_FINALIZER: &str = "observability.io/platform-protection";

/// Annotation that triggers a one-shot manual reconciliation, cleared after honoring
pub const RECONCILE_ANNOTATION: &str = "observability.io/reconcile";

/// Annotation acknowledging a storage backend family change with existing data
pub const MIGRATION_ACK_ANNOTATION: &str = "observability.io/migration-acknowledged";

/// Annotation recording that an admin credential was generated by the operator.
/// Reconciles never rotate a secret carrying this marker.
pub const GENERATED_SECRET_ANNOTATION: &str = "observability.io/generated";

/// Annotation on rendered config bundles holding the content hash
pub const CONFIG_HASH_ANNOTATION: &str = "observability.io/config-hash";

/// Annotation requesting a GitOps sync of the bound source
pub const SYNC_ANNOTATION: &str = "observability.io/sync";

/// Annotation requesting a rollback to the given Git revision
pub const ROLLBACK_ANNOTATION: &str = "observability.io/rollback-to";

/// Annotation requesting promotion of the rendered state to the given environment
pub const PROMOTE_ANNOTATION: &str = "observability.io/promote-to";

/// Annotation gate set by cost guards to block new workload rollouts
pub const DEPLOY_FREEZE_ANNOTATION: &str = "observability.io/deployments-frozen";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTPS port for the admission webhook
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;

/// Default requeue interval once a Platform has settled (seconds)
pub const DEFAULT_SETTLED_REQUEUE_SECS: u64 = 300;

/// Default requeue interval while any component is still progressing (seconds)
pub const DEFAULT_PROGRESSING_REQUEUE_SECS: u64 = 30;

/// Per-key error backoff base delay (seconds)
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 5;

/// Per-key error backoff cap (seconds)
pub const DEFAULT_BACKOFF_CAP_SECS: u64 = 900;

/// Bounded retry count for optimistic-concurrency conflicts within one pass
pub const DEFAULT_CONFLICT_RETRIES: u32 = 5;

/// Default number of Platforms reconciled concurrently
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Default deadline for a single reconcile pass (seconds)
pub const DEFAULT_RECONCILE_DEADLINE_SECS: u64 = 120;

/// Default leader-election lease name
pub const DEFAULT_LEASE_NAME: &str = "platform-operator-leader";

/// Default leader-election lease duration (seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 30;

/// Default GitOps source poll interval (seconds)
pub const DEFAULT_GIT_POLL_INTERVAL_SECS: u64 = 60;

/// Deadline for a GitOps source object to reach Ready (seconds)
pub const DEFAULT_SOURCE_READY_DEADLINE_SECS: u64 = 300;

/// Deadline for a GitOps deployment object to reach Ready (seconds)
pub const DEFAULT_DEPLOYMENT_READY_DEADLINE_SECS: u64 = 1800;

/// Deadline for Git subprocess operations (seconds); shorter than the
/// reconcile deadline so a slow remote never holds a reconcile slot
pub const DEFAULT_GIT_OP_DEADLINE_SECS: u64 = 45;

/// Default bound on recorded rollback snapshots; eviction is oldest-first
pub const DEFAULT_SNAPSHOT_HISTORY: usize = 10;

/// Bounded retry count for Helm install/upgrade invocations
pub const DEFAULT_HELM_RETRIES: u32 = 3;

/// Label key for the component application name
pub const LABEL_NAME: &str = "app.kubernetes.io/name";

/// Label key for the owning Platform instance
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";

/// Label key for the logical component
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";

/// Label key identifying the operator as manager
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Label key tying an artifact back to its Platform
pub const LABEL_PLATFORM: &str = "observability.io/platform";
