//! # Leader Election
//!
//! Lease-based leader election over `coordination.k8s.io/v1`. At most one
//! process in the operator replica set reconciles; the rest stay warm and
//! take over when the lease expires. Renewal runs at one third of the lease
//! duration.

use anyhow::Result;
use chrono::Utc;
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime;
use kube::api::{Api, ObjectMeta, PostParams};
use kube::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lease-based leader elector
pub struct LeaderElector {
    api: Api<Lease>,
    lease_name: String,
    identity: String,
    lease_duration: Duration,
    is_leader: Arc<AtomicBool>,
}

impl std::fmt::Debug for LeaderElector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderElector")
            .field("lease_name", &self.lease_name)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl LeaderElector {
    #[must_use]
    pub fn new(
        client: Client,
        namespace: &str,
        lease_name: &str,
        identity: &str,
        lease_duration: Duration,
    ) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            lease_name: lease_name.to_string(),
            identity: identity.to_string(),
            lease_duration,
            is_leader: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag flipped as leadership is gained or lost; readiness and
    /// the reconciler gate on it
    #[must_use]
    pub fn is_leader_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.is_leader)
    }

    /// Block until this process first becomes leader
    pub async fn wait_for_leadership(&self) {
        loop {
            match self.try_acquire_or_renew().await {
                Ok(true) => {
                    info!("acquired leadership lease {}", self.lease_name);
                    self.is_leader.store(true, Ordering::Relaxed);
                    return;
                }
                Ok(false) => {
                    debug!("standing by, lease {} held elsewhere", self.lease_name);
                }
                Err(e) => {
                    warn!("leader election attempt failed: {e}");
                }
            }
            tokio::time::sleep(self.renew_interval()).await;
        }
    }

    /// Renew the lease forever. A lost lease flips the readiness flag and
    /// the loop goes back to contending.
    pub async fn run(&self) {
        loop {
            match self.try_acquire_or_renew().await {
                Ok(true) => {
                    if !self.is_leader.swap(true, Ordering::Relaxed) {
                        info!("acquired leadership lease {}", self.lease_name);
                    }
                }
                Ok(false) => {
                    if self.is_leader.swap(false, Ordering::Relaxed) {
                        warn!("lost leadership lease {}", self.lease_name);
                    }
                }
                Err(e) => {
                    warn!("lease renewal failed: {e}");
                }
            }
            tokio::time::sleep(self.renew_interval()).await;
        }
    }

    /// Renewal cadence, at most one third of the lease duration
    #[must_use]
    pub fn renew_interval(&self) -> Duration {
        self.lease_duration / 3
    }

    /// One acquire-or-renew round. Returns whether this process holds the
    /// lease afterwards. Conflicts mean another candidate won the round.
    pub async fn try_acquire_or_renew(&self) -> Result<bool> {
        let now = MicroTime(Utc::now());

        match self.api.get_opt(&self.lease_name).await? {
            None => {
                let lease = self.lease_object(&now, 0);
                match self.api.create(&PostParams::default(), &lease).await {
                    Ok(_) => Ok(true),
                    Err(kube::Error::Api(resp)) if resp.code == 409 => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
            Some(current) => {
                let spec = current.spec.clone().unwrap_or_default();
                let holder = spec.holder_identity.as_deref();
                let transitions = spec.lease_transitions.unwrap_or(0);

                if holder == Some(self.identity.as_str()) {
                    self.replace_lease(&current, &now, transitions).await
                } else if lease_expired(&spec, self.lease_duration) {
                    info!(
                        "lease {} held by {:?} expired, attempting takeover",
                        self.lease_name, holder
                    );
                    self.replace_lease(&current, &now, transitions + 1).await
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn replace_lease(
        &self,
        current: &Lease,
        now: &MicroTime,
        transitions: i32,
    ) -> Result<bool> {
        let mut lease = self.lease_object(now, transitions);
        lease.metadata.resource_version = current.metadata.resource_version.clone();
        match self
            .api
            .replace(&self.lease_name, &PostParams::default(), &lease)
            .await
        {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(resp)) if resp.code == 409 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn lease_object(&self, now: &MicroTime, transitions: i32) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(self.lease_name.clone()),
                ..ObjectMeta::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(self.identity.clone()),
                lease_duration_seconds: Some(self.lease_duration.as_secs() as i32),
                acquire_time: Some(now.clone()),
                renew_time: Some(now.clone()),
                lease_transitions: Some(transitions),
                ..LeaseSpec::default()
            }),
        }
    }
}

/// Whether a lease's last renewal is older than the lease duration
fn lease_expired(spec: &LeaseSpec, duration: Duration) -> bool {
    let Some(renew) = spec.renew_time.as_ref() else {
        return true;
    };
    let age = Utc::now().signed_duration_since(renew.0);
    age.num_seconds() >= duration.as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_expiry() {
        let fresh = LeaseSpec {
            renew_time: Some(MicroTime(Utc::now())),
            ..LeaseSpec::default()
        };
        assert!(!lease_expired(&fresh, Duration::from_secs(30)));

        let stale = LeaseSpec {
            renew_time: Some(MicroTime(Utc::now() - chrono::Duration::seconds(60))),
            ..LeaseSpec::default()
        };
        assert!(lease_expired(&stale, Duration::from_secs(30)));

        let never = LeaseSpec::default();
        assert!(lease_expired(&never, Duration::from_secs(30)));
    }

    #[test]
    fn test_renew_interval_is_third_of_duration() {
        let elector_duration = Duration::from_secs(30);
        assert_eq!(elector_duration / 3, Duration::from_secs(10));
    }
}
