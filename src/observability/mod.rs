//! # Observability
//!
//! Self-metrics for the operator. Tracing is configured in `main`; this
//! module owns the Prometheus registry exposed by the HTTP server.

pub mod metrics;
