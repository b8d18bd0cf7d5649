//! # Per-Key Backoff
//!
//! Exponential backoff with jitter for reconciliation retries. Consecutive
//! failures for a key double the minimum delay (base 5 s) up to the cap
//! (15 min); success resets the key. The shared state map lives in the
//! reconciler context and is consulted from the error-policy layer, so a
//! failing Platform never blocks the watch path of healthy ones.

use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Exponential backoff calculator with a jittered output
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_secs: u64,
    cap_secs: u64,
    attempt: u32,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(base_secs: u64, cap_secs: u64) -> Self {
        Self {
            base_secs,
            cap_secs,
            attempt: 0,
        }
    }

    /// Raw delay for the current attempt without jitter: `base * 2^attempt`,
    /// capped
    #[must_use]
    pub fn current_delay_secs(&self) -> u64 {
        let shifted = self
            .base_secs
            .saturating_mul(1u64.checked_shl(self.attempt).unwrap_or(u64::MAX));
        shifted.min(self.cap_secs)
    }

    /// Advance the sequence and return the next delay with up to ±20%
    /// jitter applied. Jitter spreads synchronized retries across the
    /// replica set.
    pub fn next_backoff(&mut self) -> Duration {
        let raw = self.current_delay_secs();
        self.attempt = self.attempt.saturating_add(1);

        let jitter_window = (raw / 5).max(1);
        let jitter: i64 = rand::thread_rng().gen_range(-(jitter_window as i64)..=jitter_window as i64);
        let jittered = raw.saturating_add_signed(jitter).clamp(1, self.cap_secs);
        Duration::from_secs(jittered)
    }

    /// Reset to the base delay
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Backoff bookkeeping for one Platform key
#[derive(Debug)]
pub struct BackoffState {
    pub backoff: ExponentialBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(base_secs: u64, cap_secs: u64) -> Self {
        Self {
            backoff: ExponentialBackoff::new(base_secs, cap_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Process-wide map of per-key backoff states, keyed by `namespace/name`
#[derive(Debug, Default)]
pub struct BackoffStates {
    states: Mutex<HashMap<String, BackoffState>>,
}

impl BackoffStates {
    /// Record a failure for the key and return the next delay
    pub fn next_delay(&self, key: &str, base_secs: u64, cap_secs: u64) -> Duration {
        let mut states = self.states.lock().unwrap_or_else(|poisoned| {
            // A panicked holder leaves the map usable; the states are plain data
            poisoned.into_inner()
        });
        let state = states
            .entry(key.to_string())
            .or_insert_with(|| BackoffState::new(base_secs, cap_secs));
        state.increment_error();
        state.backoff.next_backoff()
    }

    /// Reset the key after a successful reconcile; returns whether the key
    /// had been backing off
    pub fn reset(&self, key: &str) -> bool {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match states.get_mut(key) {
            Some(state) if state.error_count > 0 => {
                state.reset();
                true
            }
            _ => false,
        }
    }

    /// Current error count for the key
    #[must_use]
    pub fn error_count(&self, key: &str) -> u32 {
        let states = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        states.get(key).map_or(0, |s| s.error_count)
    }

    /// Drop state for a deleted Platform
    pub fn forget(&self, key: &str) {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        states.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth_and_cap() {
        let mut b = ExponentialBackoff::new(5, 900);
        assert_eq!(b.current_delay_secs(), 5);
        b.next_backoff();
        assert_eq!(b.current_delay_secs(), 10);
        b.next_backoff();
        assert_eq!(b.current_delay_secs(), 20);

        for _ in 0..20 {
            b.next_backoff();
        }
        assert_eq!(b.current_delay_secs(), 900);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut b = ExponentialBackoff::new(5, 900);
        for _ in 0..50 {
            let d = b.next_backoff().as_secs();
            assert!(d >= 1, "delay {d} below floor");
            assert!(d <= 900, "delay {d} above cap");
        }
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut b = ExponentialBackoff::new(5, 900);
        b.next_backoff();
        b.next_backoff();
        b.reset();
        assert_eq!(b.current_delay_secs(), 5);
    }

    #[test]
    fn test_per_key_states_are_independent() {
        let states = BackoffStates::default();
        states.next_delay("ns/a", 5, 900);
        states.next_delay("ns/a", 5, 900);
        states.next_delay("ns/b", 5, 900);

        assert_eq!(states.error_count("ns/a"), 2);
        assert_eq!(states.error_count("ns/b"), 1);

        assert!(states.reset("ns/a"));
        assert_eq!(states.error_count("ns/a"), 0);
        assert_eq!(states.error_count("ns/b"), 1);
        assert!(!states.reset("ns/c"));
    }
}
