//! # Circuit Breaker Module
//!
//! This module implements the circuit breaker pattern for language model calls.
//! When the model endpoint fails repeatedly, the breaker "opens" and every
//! further call fails fast until the reset timeout has elapsed, so a batch of
//! ingredients does not queue up behind a dead service.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::matching_config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker for language model operations
///
/// # State Machine
///
/// - **Closed**: Normal operation, requests pass through
/// - **Open**: Failure threshold reached, requests fail fast
/// - **Half-Open**: Reset timeout elapsed, the next request is let through
///
/// # Configuration
///
/// Uses `RecoveryConfig` for:
/// - `circuit_breaker_threshold`: Failures before opening (default: 5)
/// - `circuit_breaker_reset_secs`: Time before attempting reset (default: 60s)
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    threshold: u32,
    reset_after: Duration,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use recipe_cost::circuit_breaker::CircuitBreaker;
    /// use recipe_cost::matching_config::RecoveryConfig;
    ///
    /// let breaker = CircuitBreaker::new(&RecoveryConfig::default());
    /// assert!(!breaker.is_open());
    /// ```
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            threshold: config.circuit_breaker_threshold,
            reset_after: Duration::from_secs(config.circuit_breaker_reset_secs),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // A panic while holding the lock cannot leave the counters inconsistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if the circuit is open (blocking requests)
    ///
    /// Returns `true` while the failure count is at or above the threshold and the
    /// reset timeout has not elapsed. Once it has, the breaker closes again.
    pub fn is_open(&self) -> bool {
        let mut state = self.lock();
        if state.failure_count < self.threshold {
            return false;
        }
        match state.last_failure {
            Some(last) if last.elapsed() < self.reset_after => true,
            _ => {
                log::info!("Circuit breaker reset after {:?}", self.reset_after);
                *state = BreakerState::default();
                false
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.failure_count += 1;
        state.last_failure = Some(Instant::now());
        if state.failure_count == self.threshold {
            log::warn!(
                "Circuit breaker opened after {} consecutive failures",
                state.failure_count
            );
        }
    }

    /// Record a successful call, closing the breaker
    pub fn record_success(&self) {
        *self.lock() = BreakerState::default();
    }

    /// Current consecutive failure count
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }
}
