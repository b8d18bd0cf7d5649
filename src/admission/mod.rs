//! # Admission Webhook
//!
//! Gates every Platform spec change. The validation rules live in
//! `crate::validation` so the reconciler re-checks the same invariants;
//! this module owns the wire handling and the TLS server.

pub mod review;
pub mod server;

pub use review::{handle_mutate, handle_validate};
pub use server::serve_webhook;
