//! # Platform Operator
//!
//! A Kubernetes operator managing declarative observability platforms:
//! metrics server, dashboards, log store, trace store, and collector, with
//! GitOps bindings, autoscaling policies, and cost guards.
//!
//! ## Process layout
//!
//! 1. **Metrics/probe server** - `/metrics`, `/healthz`, `/readyz`
//! 2. **Admission webhook** - `/validate` and `/mutate` over TLS (enabled
//!    when certificate paths are configured)
//! 3. **Leader election** - Lease-based; standbys stay warm and unready
//! 4. **Platform controller** - the reconciler core, watching Platforms
//!    and every owned artifact type
//! 5. **GitOps controller** - co-resident, driving Platform specs from Git

use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::api::Api;
use kube::Client;
use kube_runtime::{watcher, Controller};
use platform_operator::config::OperatorConfig;
use platform_operator::controller::{error_policy, reconcile, Context};
use platform_operator::crd::Platform;
use platform_operator::gitops::{gitops_error_policy, reconcile_gitops};
use platform_operator::observability::metrics;
use platform_operator::scheduler::LeaderElector;
use platform_operator::server::{start_server, ServerState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "platform_operator=info".into()),
        )
        .init();

    // rustls 0.23 requires an explicit process-wide crypto provider when
    // more than one is linked
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    let config = OperatorConfig::parse();
    info!(
        "starting platform operator (build {})",
        option_env!("BUILD_GIT_HASH").unwrap_or("unknown")
    );

    metrics::register_metrics().context("failed to register metrics")?;

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let identity = format!("{}-{}", hostname(), std::process::id());
    let elector = Arc::new(LeaderElector::new(
        client.clone(),
        &config.namespace,
        &config.lease_name,
        &identity,
        Duration::from_secs(config.lease_duration_secs),
    ));

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
        is_leader: elector.is_leader_flag(),
    });

    // Metrics and probe server
    {
        let state = Arc::clone(&server_state);
        let addr = config.metrics_addr.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(&addr, port, state).await {
                error!("HTTP server error: {e}");
            }
        });
    }

    // Admission webhook, when certificates are provided
    match (&config.webhook_cert_path, &config.webhook_key_path) {
        (Some(cert), Some(key)) => {
            let cert = cert.clone();
            let key = key.clone();
            let port = config.webhook_port;
            tokio::spawn(async move {
                if let Err(e) =
                    platform_operator::admission::serve_webhook(port, &cert, &key).await
                {
                    error!("admission webhook error: {e}");
                }
            });
        }
        (None, None) => warn!("webhook certificate not configured, admission webhook disabled"),
        _ => anyhow::bail!("webhook cert and key paths must be set together"),
    }

    // Block until this replica holds the lease, then keep renewing in the
    // background. Standbys wait here, warm but unready.
    elector.wait_for_leadership().await;
    {
        let elector = Arc::clone(&elector);
        tokio::spawn(async move { elector.run().await });
    }

    let ctx = Arc::new(Context::new(client.clone(), config));
    let platforms: Api<Platform> = Api::all(client.clone());

    // GitOps controller, co-resident with the reconciler
    {
        let ctx = Arc::clone(&ctx);
        let platforms = platforms.clone();
        tokio::spawn(async move {
            Controller::new(platforms, watcher::Config::default())
                .shutdown_on_signal()
                .run(reconcile_gitops, gitops_error_policy, ctx)
                .for_each(|result| async move {
                    if let Err(e) = result {
                        error!("gitops reconcile error: {e:?}");
                    }
                })
                .await;
        });
    }

    server_state.is_ready.store(true, Ordering::Relaxed);
    info!("leader elected, starting platform controller");

    // Platform controller: watch the Platform kind and every owned artifact
    // type so out-of-band edits requeue their owner. Owned streams filter
    // on the managed-by label to keep the caches small.
    let owned = || {
        watcher::Config::default().labels(&format!(
            "{}={}",
            platform_operator::constants::LABEL_MANAGED_BY,
            platform_operator::constants::FIELD_MANAGER
        ))
    };
    Controller::new(platforms, watcher::Config::default())
        .owns::<Deployment>(Api::all(client.clone()), owned())
        .owns::<StatefulSet>(Api::all(client.clone()), owned())
        .owns::<Service>(Api::all(client.clone()), owned())
        .owns::<ConfigMap>(Api::all(client.clone()), owned())
        .owns::<Secret>(Api::all(client.clone()), owned())
        .owns::<Ingress>(Api::all(client.clone()), owned())
        .owns::<PodDisruptionBudget>(Api::all(client.clone()), owned())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(obj) => tracing::debug!("reconciled {obj:?}"),
                Err(e) => error!("reconcile error: {e:?}"),
            }
        })
        .await;

    info!("controller stopped");
    Ok(())
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "platform-operator".to_string())
}
