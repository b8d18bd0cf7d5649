//! # Events
//!
//! Namespaced Kubernetes events emitted on the Platform for phase
//! transitions and remediations. `reason` is a stable identifier, `message`
//! is for humans, `type` is Normal or Warning.

use crate::controller::error::Result;
use crate::crd::Platform;
use k8s_openapi::api::core::v1::Event;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{Api, ObjectMeta, PostParams};
use kube::{Client, Resource, ResourceExt};
use tracing::debug;

/// Event type tags
pub const EVENT_NORMAL: &str = "Normal";
pub const EVENT_WARNING: &str = "Warning";

/// Emit one event on the Platform. Failures are surfaced but callers treat
/// them as best-effort; an unpublishable event never fails a reconcile.
pub async fn emit_event(
    client: &Client,
    platform: &Platform,
    event_type: &str,
    reason: &str,
    message: &str,
) -> Result<()> {
    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let events: Api<Event> = Api::namespaced(client.clone(), &namespace);

    let now = Time(chrono::Utc::now());
    let event = Event {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", platform.name_any())),
            namespace: Some(namespace),
            ..ObjectMeta::default()
        },
        type_: Some(event_type.to_string()),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        involved_object: platform.object_ref(&()),
        first_timestamp: Some(now.clone()),
        last_timestamp: Some(now),
        count: Some(1),
        source: Some(k8s_openapi::api::core::v1::EventSource {
            component: Some(crate::constants::FIELD_MANAGER.to_string()),
            ..k8s_openapi::api::core::v1::EventSource::default()
        }),
        ..Event::default()
    };

    debug!("event {reason} on {}: {message}", platform.key());
    events
        .create(&PostParams::default(), &event)
        .await
        .map_err(crate::controller::error::Error::from)?;
    Ok(())
}

/// Best-effort wrapper: log and swallow publish failures
pub async fn emit_event_best_effort(
    client: &Client,
    platform: &Platform,
    event_type: &str,
    reason: &str,
    message: &str,
) {
    if let Err(e) = emit_event(client, platform, event_type, reason, message).await {
        tracing::warn!("failed to emit event {reason} for {}: {e}", platform.key());
    }
}
