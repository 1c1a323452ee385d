//! Navigation retry policy

use std::time::Duration;

use crate::browser::WaitUntil;

/// How navigation is retried
///
/// Attempt `n` (zero-based) waits for `wait_ladder[n]`, or the last rung once
/// the ladder is exhausted, so each retry settles for a weaker readiness
/// signal. Attempts are bounded by `per_attempt_timeout` and separated by a
/// linearly growing `backoff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub per_attempt_timeout: Duration,
    pub backoff: Duration,
    pub wait_ladder: Vec<WaitUntil>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_attempt_timeout: Duration::from_secs(90),
            backoff: Duration::from_secs(1),
            wait_ladder: vec![
                WaitUntil::NetworkIdle,
                WaitUntil::Load,
                WaitUntil::DomContentLoaded,
            ],
        }
    }
}

impl RetryPolicy {
    /// Attempt count, never less than one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn wait_until_for(&self, attempt: u32) -> WaitUntil {
        let idx = attempt as usize;
        self.wait_ladder
            .get(idx)
            .or_else(|| self.wait_ladder.last())
            .copied()
            .unwrap_or(WaitUntil::Load)
    }

    /// Pause before `attempt`; nothing before the first
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}
