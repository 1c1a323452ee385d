//! Readiness polling for dynamic pages
//!
//! Provides `wait_for_condition()` which polls a JavaScript predicate with
//! exponential backoff. Pages that render via JavaScript keep mutating after
//! the load event, so readiness is observed rather than assumed.

use std::time::Duration;

use tracing::trace;

use crate::browser::PageDriver;

/// Poll `predicate` until it evaluates to `true` or `timeout` elapses
///
/// Returns `true` when the condition was met. Evaluation errors count as
/// "not yet" so a page mid-navigation does not abort the wait. Each
/// evaluation is itself bounded by the time left, so a hung page cannot
/// stretch the wait past `timeout`.
///
/// # Polling Strategy
/// - Starts at 100ms intervals
/// - Doubles each retry, capped at 1 second
/// - Total duration limited by `timeout`
pub async fn wait_for_condition(page: &dyn PageDriver, predicate: &str, timeout: Duration) -> bool {
    let start = tokio::time::Instant::now();
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        match tokio::time::timeout(remaining, page.evaluate(predicate)).await {
            Ok(Ok(serde_json::Value::Bool(true))) => return true,
            Ok(Ok(_)) => {}
            Ok(Err(e)) => trace!("Readiness predicate failed, retrying: {}", e),
            Err(_) => {
                trace!("Readiness predicate still pending after {}ms", timeout.as_millis());
                return false;
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return false;
        }

        tokio::time::sleep(poll_interval.min(timeout - elapsed)).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}
