//! # Cluster Client
//!
//! A thin capability layer over the cluster object store. All writes go
//! through `create_or_update`: fetch the current object, rebuild the desired
//! state via the caller's transformer, write only on observed difference,
//! and retry optimistic-concurrency conflicts a bounded number of times with
//! exponential backoff.

use crate::constants::{DEFAULT_CONFLICT_RETRIES, FIELD_MANAGER};
use crate::controller::error::{Error, Result};
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, warn};

pub mod ownership;

pub use ownership::owner_reference;

/// Outcome of an idempotent write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    /// The live object already matched the desired state; nothing was written
    Unchanged,
}

/// Typed wrapper over [`kube::Client`] providing idempotent write primitives
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
    conflict_retries: u32,
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("conflict_retries", &self.conflict_retries)
            .finish_non_exhaustive()
    }
}

impl ClusterClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    /// The raw client, for APIs the wrapper does not cover
    #[must_use]
    pub fn raw(&self) -> &Client {
        &self.client
    }

    /// Namespaced API handle for a resource type
    #[must_use]
    pub fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Fetch the current object, build the desired state from it, and write
    /// only when the live object differs. Conflicts retry with exponential
    /// backoff up to the bounded count.
    pub async fn create_or_update<K, F>(
        &self,
        api: &Api<K>,
        name: &str,
        mut build: F,
    ) -> Result<ApplyOutcome>
    where
        K: kube::Resource + Clone + DeserializeOwned + Serialize + Debug,
        F: FnMut(Option<&K>) -> K,
    {
        let mut delay = Duration::from_millis(200);

        for attempt in 0..=self.conflict_retries {
            let current = api.get_opt(name).await.map_err(Error::from)?;

            match current {
                None => {
                    let desired = build(None);
                    match api.create(&PostParams::default(), &desired).await {
                        Ok(_) => return Ok(ApplyOutcome::Created),
                        Err(kube::Error::Api(resp)) if resp.code == 409 => {
                            // Raced a concurrent creator; re-read and update instead
                            debug!("create of {name} raced, retrying as update");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Some(current) => {
                    let mut desired = build(Some(&current));

                    if desired_matches_live(&desired, &current) {
                        return Ok(ApplyOutcome::Unchanged);
                    }

                    desired.meta_mut().resource_version = current.meta().resource_version.clone();
                    match api.replace(name, &PostParams::default(), &desired).await {
                        Ok(_) => return Ok(ApplyOutcome::Updated),
                        Err(kube::Error::Api(resp)) if resp.code == 409 => {
                            warn!(
                                "update of {name} hit a conflict (attempt {}/{})",
                                attempt + 1,
                                self.conflict_retries
                            );
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_secs(5));
        }

        Err(Error::Conflict(format!(
            "gave up updating {name} after {} conflict retries",
            self.conflict_retries
        )))
    }

    /// Server-side apply with the operator's field manager. Preferred for
    /// types with strategic-merge support; the caller supplies the full
    /// intended object.
    pub async fn apply<K>(&self, api: &Api<K>, name: &str, desired: &K) -> Result<()>
    where
        K: kube::Resource + Clone + DeserializeOwned + Serialize + Debug,
    {
        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(desired),
        )
        .await
        .map_err(Error::from)?;
        Ok(())
    }

    /// Merge-patch a subset of fields
    pub async fn patch_merge<K>(
        &self,
        api: &Api<K>,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<()>
    where
        K: kube::Resource + Clone + DeserializeOwned + Serialize + Debug,
    {
        api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    /// Delete an object, tolerating not-found
    pub async fn delete_if_exists<K>(&self, api: &Api<K>, name: &str) -> Result<()>
    where
        K: kube::Resource + Clone + DeserializeOwned + Debug,
    {
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether every field the operator intends (non-null, ignoring metadata the
/// server owns) already holds the same value on the live object. Server
/// defaulting adds fields the desired object omits; those never count as
/// differences.
fn desired_matches_live<K: Serialize>(desired: &K, live: &K) -> bool {
    let (Ok(mut desired), Ok(live)) = (
        serde_json::to_value(desired),
        serde_json::to_value(live),
    ) else {
        return false;
    };

    // The server owns these; comparing them would force rewrites every pass
    if let Some(meta) = desired.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        meta.remove("resourceVersion");
        meta.remove("uid");
        meta.remove("creationTimestamp");
        meta.remove("generation");
        meta.remove("managedFields");
    }
    if let Some(obj) = desired.as_object_mut() {
        obj.remove("status");
    }

    value_is_subset(&desired, &live)
}

/// Recursive subset check: objects compare per present key, nulls are
/// ignored, everything else compares exactly
fn value_is_subset(desired: &serde_json::Value, live: &serde_json::Value) -> bool {
    use serde_json::Value;
    match (desired, live) {
        (Value::Null, _) => true,
        (Value::Object(d), Value::Object(l)) => d.iter().all(|(k, dv)| {
            if dv.is_null() {
                true
            } else {
                l.get(k).is_some_and(|lv| value_is_subset(dv, lv))
            }
        }),
        (d, l) => d == l,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subset_ignores_server_added_fields() {
        let desired = json!({"spec": {"replicas": 2}});
        let live = json!({"spec": {"replicas": 2, "strategy": {"type": "RollingUpdate"}}});
        assert!(value_is_subset(&desired, &live));
    }

    #[test]
    fn test_subset_detects_real_differences() {
        let desired = json!({"spec": {"replicas": 3}});
        let live = json!({"spec": {"replicas": 2}});
        assert!(!value_is_subset(&desired, &live));
    }

    #[test]
    fn test_subset_ignores_nulls_in_desired() {
        let desired = json!({"spec": {"replicas": 2, "paused": null}});
        let live = json!({"spec": {"replicas": 2}});
        assert!(value_is_subset(&desired, &live));
    }

    #[test]
    fn test_arrays_compare_exactly() {
        let desired = json!({"ports": [{"port": 9090}]});
        let live = json!({"ports": [{"port": 9090}, {"port": 9091}]});
        assert!(!value_is_subset(&desired, &live));
    }
}
