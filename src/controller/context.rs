//! # Reconciler Context
//!
//! Shared state handed to every reconcile invocation: the cluster client,
//! operator configuration, per-key backoff states, and the concurrency
//! gate bounding parallel reconciles.

use crate::client::ClusterClient;
use crate::config::OperatorConfig;
use crate::scheduler::BackoffStates;
use kube::Client;
use tokio::sync::Semaphore;

/// Shared reconciler state
pub struct Context {
    pub client: Client,
    pub cluster: ClusterClient,
    pub config: OperatorConfig,
    pub backoffs: BackoffStates,
    /// Bounds concurrent reconciles across Platforms; component managers
    /// within one reconcile always run sequentially
    pub reconcile_permits: Semaphore,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    #[must_use]
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        let permits = config.concurrency_limit.max(1);
        Self {
            cluster: ClusterClient::new(client.clone()),
            client,
            config,
            backoffs: BackoffStates::default(),
            reconcile_permits: Semaphore::new(permits),
        }
    }
}
