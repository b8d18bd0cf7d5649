//! # Webhook Server
//!
//! HTTPS endpoints `POST /validate` and `POST /mutate` accepting the
//! cluster's admission-review envelope. TLS terminates here with the
//! secret-provided certificate; the accept loop hands each connection to
//! the axum router over rustls.

use crate::crd::Platform;
use axum::{routing::post, Json, Router};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::service::TowerToHyperService;
use kube::core::admission::AdmissionReview;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

/// Build the webhook router
#[must_use]
pub fn webhook_router() -> Router {
    Router::new()
        .route("/validate", post(validate_handler))
        .route("/mutate", post(mutate_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn validate_handler(
    Json(review): Json<AdmissionReview<Platform>>,
) -> Json<AdmissionReview<kube::core::DynamicObject>> {
    Json(super::review::handle_validate(review))
}

async fn mutate_handler(
    Json(review): Json<AdmissionReview<Platform>>,
) -> Json<AdmissionReview<kube::core::DynamicObject>> {
    Json(super::review::handle_mutate(review))
}

/// Serve the webhook over TLS. Runs until the process exits.
pub async fn serve_webhook(
    port: u16,
    cert_path: &str,
    key_path: &str,
) -> Result<(), anyhow::Error> {
    let tls_config = load_tls_config(cert_path, key_path)?;
    let acceptor = TlsAcceptor::from(Arc::new(tls_config));
    let app = webhook_router();

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("admission webhook listening on {addr}");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("webhook accept failed: {e}");
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("TLS handshake with {peer} failed: {e}");
                    return;
                }
            };

            let service = TowerToHyperService::new(app);
            if let Err(e) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(tls_stream), service)
                .await
            {
                error!("webhook connection error from {peer}: {e}");
            }
        });
    }
}

/// Load the PEM certificate chain and private key from the secret-provided
/// paths
pub fn load_tls_config(cert_path: &str, key_path: &str) -> Result<ServerConfig, anyhow::Error> {
    let cert_pem = std::fs::read(cert_path)
        .map_err(|e| anyhow::anyhow!("cannot read webhook certificate {cert_path}: {e}"))?;
    let key_pem = std::fs::read(key_path)
        .map_err(|e| anyhow::anyhow!("cannot read webhook key {key_path}: {e}"))?;

    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut cert_pem.as_slice()).collect::<Result<_, _>>()?;
    if certs.is_empty() {
        return Err(anyhow::anyhow!("no certificates found in {cert_path}"));
    }

    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_pem.as_slice())?
        .ok_or_else(|| anyhow::anyhow!("no private key found in {key_path}"))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(config)
}
