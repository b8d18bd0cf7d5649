//! # Reconciler Core
//!
//! The top-level platform state machine: phase ordering, status
//! aggregation, finalizer and deletion flow, and the per-key error policy.

pub mod context;
pub mod error;
pub mod events;
pub mod finalize;
pub mod plan;
pub mod reconcile;
pub mod status;

pub use context::Context;
pub use error::{Error, ErrorKind};
pub use reconcile::{error_policy, reconcile};
