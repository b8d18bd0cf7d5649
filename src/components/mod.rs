//! # Component Managers
//!
//! One manager per observability component, all implementing the uniform
//! contract: `reconcile` drives the owned artifacts to the desired state,
//! `delete` removes them in reverse-dependency order, `status` derives a
//! read-only view from live artifacts, `validate` adds component-local
//! checks, and `service_url` exposes the stable endpoint other components
//! consume.
//!
//! Managers are idempotent and safe to retry; artifact writes go through
//! the cluster client's diff-gated create-or-update.

pub mod collector;
pub mod common;
pub mod dashboards;
pub mod logs;
pub mod metrics;
pub mod traces;

use crate::autoscaling;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::crd::{
    ComponentKind, ComponentPhase, ComponentStatus, InstallerMode, Platform,
};
use crate::helm;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, EnvVar, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::api::Api;
use kube::ResourceExt;
use tracing::{debug, info};

use common::configmap::{config_bundle_name, render_config_bundle};
use common::ingress::build_ingress;
use common::labels::artifact_name;
use common::pdb::build_pdb;
use common::secrets::{ensure_admin_secret, object_store_env};
use common::service::{build_headless_service, build_service, headless_service_name, service_name};
use common::workload::{build_deployment, build_stateful_set, image_reference};

/// Uniform per-component contract
#[async_trait]
pub trait ComponentManager: Send + Sync {
    /// Component tag this manager owns
    fn kind(&self) -> ComponentKind;

    /// Version used when the spec leaves it unset
    fn default_version(&self) -> &'static str;

    /// Inclusive range of supported major versions
    fn supported_majors(&self) -> std::ops::RangeInclusive<u64>;

    /// Operator-default configuration the advanced config bag overlays
    fn render_defaults(&self, platform: &Platform) -> serde_json::Value;

    /// File name the rendered config lands under in the bundle
    fn config_file_name(&self) -> &'static str;

    /// Component-specific environment variables beyond the object-store
    /// credential injection
    fn extra_env(&self, _platform: &Platform) -> Vec<EnvVar> {
        Vec::new()
    }

    /// Component-local invariant checks beyond the global validator
    fn validate(&self, platform: &Platform) -> Result<()> {
        let version = self.resolved_version(platform);
        let parsed = crate::validation::ComponentVersion::parse(&version)
            .map_err(|e| Error::ConfigInvalid(e.to_string()))?;
        if !self.supported_majors().contains(&parsed.major) {
            return Err(Error::VersionUnsupported {
                component: self.kind().as_str().to_string(),
                version,
            });
        }
        Ok(())
    }

    /// The version this reconcile renders
    fn resolved_version(&self, platform: &Platform) -> String {
        platform
            .spec
            .components
            .common(self.kind())
            .and_then(|c| c.version.clone())
            .unwrap_or_else(|| self.default_version().to_string())
    }

    /// Stable in-cluster URL other components consume
    fn service_url(&self, platform: &Platform) -> String {
        common::service::service_url(platform, self.kind())
    }

    /// Drive all owned artifacts to the desired state
    async fn reconcile(&self, ctx: &Context, platform: &Platform) -> Result<ComponentStatus> {
        if helm_mode(ctx, platform) {
            return helm::reconcile_release(ctx, platform, self, &self.resolved_version(platform))
                .await;
        }
        self.reconcile_native(ctx, platform).await
    }

    /// Native-manifest reconcile: service account, credentials, config
    /// bundle, services, workload, then the ingress/autoscaling/disruption
    /// overlays
    async fn reconcile_native(&self, ctx: &Context, platform: &Platform) -> Result<ComponentStatus> {
        let kind = self.kind();
        let namespace = namespace_of(platform);
        let name = artifact_name(platform, kind);
        let version = self.resolved_version(platform);
        self.validate(platform)?;

        let common_spec = platform
            .spec
            .components
            .common(kind)
            .ok_or_else(|| Error::ConfigInvalid(format!("{kind} block missing")))?
            .clone();

        debug!("reconciling {kind} artifacts for {}", platform.key());

        // Service account
        let sa_api: Api<ServiceAccount> = ctx.cluster.namespaced(&namespace);
        let desired_sa = common::build_service_account(platform, kind);
        ctx.cluster
            .create_or_update(&sa_api, &name, |_| desired_sa.clone())
            .await?;

        // Credentials first: workloads reference the secret
        ensure_admin_secret(&ctx.cluster, platform, kind, common_spec.auth.as_ref()).await?;

        // Content-addressed config bundle
        let rendered = render_config_bundle(
            platform,
            kind,
            self.render_defaults(platform),
            self.config_file_name(),
        );
        let cm_api: Api<ConfigMap> = ctx.cluster.namespaced(&namespace);
        ctx.cluster
            .create_or_update(&cm_api, &config_bundle_name(platform, kind), |_| {
                rendered.config_map.clone()
            })
            .await?;

        // Services before workloads
        let svc_api: Api<Service> = ctx.cluster.namespaced(&namespace);
        let desired_svc = build_service(platform, kind);
        ctx.cluster
            .create_or_update(&svc_api, &service_name(platform, kind), |_| desired_svc.clone())
            .await?;
        if kind.is_stateful() {
            let desired_headless = build_headless_service(platform, kind);
            ctx.cluster
                .create_or_update(&svc_api, &headless_service_name(platform, kind), |_| {
                    desired_headless.clone()
                })
                .await?;
        }

        // Workload, detecting an in-place version change for phase reporting
        let mut env = common_spec
            .storage
            .as_ref()
            .and_then(|s| s.backend.as_ref())
            .map(|b| object_store_env(b))
            .unwrap_or_default();
        env.extend(self.extra_env(platform));

        let desired_image = image_reference(platform, kind, &version);
        let upgrading;
        let (replicas, ready_replicas);

        if kind.is_stateful() {
            let api: Api<StatefulSet> = ctx.cluster.namespaced(&namespace);
            let live = api.get_opt(&name).await.map_err(Error::from)?;
            upgrading = live_image_differs(live.as_ref().map(workload_image_sts), &desired_image);
            let desired =
                build_stateful_set(platform, kind, &version, &rendered.hash, env.clone());
            ctx.cluster
                .create_or_update(&api, &name, |_| desired.clone())
                .await?;
            let live = api.get_opt(&name).await.map_err(Error::from)?;
            let status = live.as_ref().and_then(|s| s.status.as_ref());
            replicas = status.map_or(0, |s| s.replicas);
            ready_replicas = status.and_then(|s| s.ready_replicas).unwrap_or(0);
        } else {
            let api: Api<Deployment> = ctx.cluster.namespaced(&namespace);
            let live = api.get_opt(&name).await.map_err(Error::from)?;
            upgrading = live_image_differs(live.as_ref().map(workload_image_deploy), &desired_image);
            let desired = build_deployment(platform, kind, &version, &rendered.hash, env.clone());
            ctx.cluster
                .create_or_update(&api, &name, |_| desired.clone())
                .await?;
            let live = api.get_opt(&name).await.map_err(Error::from)?;
            let status = live.as_ref().and_then(|d| d.status.as_ref());
            replicas = status.and_then(|s| s.replicas).unwrap_or(0);
            ready_replicas = status.and_then(|s| s.ready_replicas).unwrap_or(0);
        }

        // Overlays: ingress, autoscaling, disruption budget
        let ingress_api: Api<Ingress> = ctx.cluster.namespaced(&namespace);
        match common_spec
            .ingress
            .as_ref()
            .and_then(|i| build_ingress(platform, kind, i))
        {
            Some(desired) => {
                ctx.cluster
                    .create_or_update(&ingress_api, &name, |_| desired.clone())
                    .await?;
            }
            None => ctx.cluster.delete_if_exists(&ingress_api, &name).await?,
        }

        autoscaling::apply_overlays(ctx, platform, kind).await?;

        let desired_replicas = common::workload::effective_replicas(platform, kind);
        let pdb_api: Api<PodDisruptionBudget> = ctx.cluster.namespaced(&namespace);
        match build_pdb(platform, kind, desired_replicas) {
            Some(desired) => {
                ctx.cluster
                    .create_or_update(&pdb_api, &name, |_| desired.clone())
                    .await?;
            }
            None => ctx.cluster.delete_if_exists(&pdb_api, &name).await?,
        }

        let phase = derive_phase(desired_replicas, replicas, ready_replicas, upgrading);
        Ok(ComponentStatus {
            phase,
            version: Some(version),
            replicas: Some(desired_replicas),
            ready_replicas: Some(ready_replicas.min(desired_replicas)),
            service_url: Some(self.service_url(platform)),
            message: Some(match phase {
                ComponentPhase::Ready => format!("{ready_replicas}/{desired_replicas} replicas ready"),
                ComponentPhase::Upgrading => "rolling out new version".to_string(),
                _ => format!("{ready_replicas}/{desired_replicas} replicas ready, waiting"),
            }),
        })
    }

    /// Remove all owned artifacts in reverse-dependency order, tolerating
    /// not-found on every one
    async fn delete(&self, ctx: &Context, platform: &Platform) -> Result<()> {
        let kind = self.kind();
        if helm_mode(ctx, platform) {
            return helm::uninstall_release(ctx, platform, kind).await;
        }

        let namespace = namespace_of(platform);
        let name = artifact_name(platform, kind);

        let pdb_api: Api<PodDisruptionBudget> = ctx.cluster.namespaced(&namespace);
        ctx.cluster.delete_if_exists(&pdb_api, &name).await?;

        autoscaling::delete_overlays(ctx, platform, kind).await?;

        let ingress_api: Api<Ingress> = ctx.cluster.namespaced(&namespace);
        ctx.cluster.delete_if_exists(&ingress_api, &name).await?;

        if kind.is_stateful() {
            let api: Api<StatefulSet> = ctx.cluster.namespaced(&namespace);
            ctx.cluster.delete_if_exists(&api, &name).await?;
        } else {
            let api: Api<Deployment> = ctx.cluster.namespaced(&namespace);
            ctx.cluster.delete_if_exists(&api, &name).await?;
        }

        let svc_api: Api<Service> = ctx.cluster.namespaced(&namespace);
        ctx.cluster
            .delete_if_exists(&svc_api, &headless_service_name(platform, kind))
            .await?;
        ctx.cluster
            .delete_if_exists(&svc_api, &service_name(platform, kind))
            .await?;

        let cm_api: Api<ConfigMap> = ctx.cluster.namespaced(&namespace);
        ctx.cluster
            .delete_if_exists(&cm_api, &config_bundle_name(platform, kind))
            .await?;

        let secret_api: Api<Secret> = ctx.cluster.namespaced(&namespace);
        ctx.cluster
            .delete_if_exists(&secret_api, &format!("{name}-admin"))
            .await?;

        let sa_api: Api<ServiceAccount> = ctx.cluster.namespaced(&namespace);
        ctx.cluster.delete_if_exists(&sa_api, &name).await?;

        info!("deleted {kind} artifacts for {}", platform.key());
        Ok(())
    }

    /// Read-only status derivation from live artifacts
    async fn status(&self, ctx: &Context, platform: &Platform) -> Result<ComponentStatus> {
        let kind = self.kind();
        let namespace = namespace_of(platform);
        let name = artifact_name(platform, kind);
        let desired_replicas = platform
            .spec
            .components
            .common(kind)
            .and_then(|c| c.replicas)
            .unwrap_or(1);

        let (replicas, ready_replicas) = if kind.is_stateful() {
            let api: Api<StatefulSet> = ctx.cluster.namespaced(&namespace);
            match api.get_opt(&name).await.map_err(Error::from)? {
                Some(sts) => {
                    let s = sts.status.as_ref();
                    (s.map_or(0, |s| s.replicas), s.and_then(|s| s.ready_replicas).unwrap_or(0))
                }
                None => (0, 0),
            }
        } else {
            let api: Api<Deployment> = ctx.cluster.namespaced(&namespace);
            match api.get_opt(&name).await.map_err(Error::from)? {
                Some(d) => {
                    let s = d.status.as_ref();
                    (
                        s.and_then(|s| s.replicas).unwrap_or(0),
                        s.and_then(|s| s.ready_replicas).unwrap_or(0),
                    )
                }
                None => (0, 0),
            }
        };

        let phase = derive_phase(desired_replicas, replicas, ready_replicas, false);
        Ok(ComponentStatus {
            phase,
            version: Some(self.resolved_version(platform)),
            replicas: Some(desired_replicas),
            ready_replicas: Some(ready_replicas.min(desired_replicas)),
            service_url: Some(self.service_url(platform)),
            message: None,
        })
    }
}

/// Managers for every component, in declaration order; the planner orders
/// the enabled subset by dependencies
#[must_use]
pub fn all_managers() -> Vec<Box<dyn ComponentManager>> {
    vec![
        Box::new(metrics::MetricsManager),
        Box::new(dashboards::DashboardsManager),
        Box::new(logs::LogsManager),
        Box::new(traces::TracesManager),
        Box::new(collector::CollectorManager),
    ]
}

/// Whether this Platform deploys through Helm releases
#[must_use]
pub fn helm_mode(ctx: &Context, platform: &Platform) -> bool {
    ctx.config.helm_mode || platform.installer_mode() == InstallerMode::Helm
}

fn namespace_of(platform: &Platform) -> String {
    platform.namespace().unwrap_or_else(|| "default".to_string())
}

fn workload_image_sts(sts: &StatefulSet) -> Option<String> {
    sts.spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()?
        .image
        .clone()
}

fn workload_image_deploy(d: &Deployment) -> Option<String> {
    d.spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()?
        .image
        .clone()
}

fn live_image_differs(live: Option<Option<String>>, desired: &str) -> bool {
    matches!(live, Some(Some(ref image)) if image != desired)
}

/// Map observed replica counts to a component phase
#[must_use]
pub fn derive_phase(
    desired: i32,
    observed: i32,
    ready: i32,
    upgrading: bool,
) -> ComponentPhase {
    if desired == 0 {
        return ComponentPhase::Ready;
    }
    if ready >= desired {
        ComponentPhase::Ready
    } else if upgrading {
        ComponentPhase::Upgrading
    } else if observed == 0 && ready == 0 {
        ComponentPhase::Installing
    } else if ready > 0 {
        // Some replicas serve while others lag
        ComponentPhase::Degraded
    } else {
        ComponentPhase::Installing
    }
}
