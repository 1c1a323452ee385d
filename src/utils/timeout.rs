//! Timeout validation for configured browser waits

use std::time::Duration;
use thiserror::Error;

/// Maximum timeout for a single navigation attempt (5 minutes)
/// Covers slow-loading sites, heavy SPAs, and network delays
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

/// Maximum timeout for readiness waits (2 minutes)
/// Body presence and image settling degrade to "proceed anyway" on expiry
pub const MAX_READINESS_TIMEOUT_MS: u64 = 120_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{what} timeout cannot exceed {max_ms}ms ({max_secs}s). Received: {got_ms}ms")]
pub struct TimeoutError {
    pub what: &'static str,
    pub max_ms: u64,
    pub max_secs: u64,
    pub got_ms: u64,
}

fn bounded(what: &'static str, ms: u64, max_ms: u64) -> Result<Duration, TimeoutError> {
    if ms > max_ms {
        return Err(TimeoutError {
            what,
            max_ms,
            max_secs: max_ms / 1000,
            got_ms: ms,
        });
    }
    Ok(Duration::from_millis(ms))
}

/// Validate the per-attempt navigation timeout
pub fn validate_navigation_timeout(timeout_ms: u64) -> Result<Duration, TimeoutError> {
    bounded("Navigation", timeout_ms, MAX_NAVIGATION_TIMEOUT_MS)
}

/// Validate a readiness wait (body presence, image settling)
pub fn validate_readiness_timeout(what: &'static str, timeout_ms: u64) -> Result<Duration, TimeoutError> {
    bounded(what, timeout_ms, MAX_READINESS_TIMEOUT_MS)
}
