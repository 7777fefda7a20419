//! Exponential backoff shared by concurrent connection attempts

use crate::config::RetryPolicy;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
struct BackoffState {
    failures: u32,
    current: Duration,
}

/// Failure-driven delay, safe to share between tasks.
///
/// No delay is applied until a failure is recorded. Each consecutive failure
/// grows the delay by the policy's multiplier, capped at `max_delay`.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    state: Mutex<BackoffState>,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: Mutex::new(BackoffState {
                failures: 0,
                current: policy.initial_delay,
            }),
            policy,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BackoffState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Delay to wait before the next attempt
    pub fn delay(&self) -> Duration {
        let state = self.state();
        if state.failures == 0 {
            Duration::ZERO
        } else {
            state.current
        }
    }

    /// Record a failed attempt and return the delay now in effect
    pub fn record_failure(&self) -> Duration {
        let mut state = self.state();
        if state.failures > 0 {
            let next = Duration::from_secs_f64(state.current.as_secs_f64() * self.policy.multiplier);
            state.current = next.min(self.policy.max_delay);
        }
        state.failures = state.failures.saturating_add(1);
        state.current
    }

    /// Forget earlier failures (call after a successful authentication)
    pub fn reset(&self) {
        let mut state = self.state();
        if state.failures > 0 {
            debug!("Resetting retry backoff after {} failures", state.failures);
        }
        state.failures = 0;
        state.current = self.policy.initial_delay;
    }

    /// Consecutive failures since the last reset
    pub fn failures(&self) -> u32 {
        self.state().failures
    }
}
