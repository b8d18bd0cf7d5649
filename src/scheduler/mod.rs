//! # Work Queue & Scheduler
//!
//! The run loop itself is `kube_runtime::Controller`: a rate-limited,
//! de-duplicating queue keyed by Platform identity, FIFO among ready keys,
//! driven by watch events. This module adds what the runtime does not
//! provide: per-key exponential backoff with jitter (consulted from the
//! error-policy layer) and Lease-based leader election.

pub mod backoff;
pub mod leader;

pub use backoff::{BackoffState, BackoffStates, ExponentialBackoff};
pub use leader::LeaderElector;
