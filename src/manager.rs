//! Browser admission and bookkeeping
//!
//! Every extraction owns its own browser, so there is nothing to share. What
//! the manager does provide is a process-wide view of live sessions:
//! - optional cap on concurrently running browsers (a semaphore permit is
//!   held for the life of each browser)
//! - registry of live sessions for `/health` and shutdown logging
//! - refusal of new launches once shutdown has begun
//!
//! Deregistration happens in `Drop` of the returned handle, so a browser
//! released by `close()` and one dropped on a cancelled request are both
//! accounted for.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::browser::{BrowserError, BrowserHandle, BrowserLauncher, BrowserResult, PageDriver};

/// Bookkeeping for one running browser
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Launcher decorator that caps and tracks live browsers
pub struct BrowserManager {
    inner: Arc<dyn BrowserLauncher>,
    limit: Option<Arc<Semaphore>>,
    sessions: Arc<DashMap<Uuid, SessionInfo>>,
    shutting_down: AtomicBool,
}

impl BrowserManager {
    /// Wrap `inner`; `max_concurrent` of `None` means unbounded
    pub fn new(inner: Arc<dyn BrowserLauncher>, max_concurrent: Option<usize>) -> Self {
        Self {
            inner,
            limit: max_concurrent.map(|n| Arc::new(Semaphore::new(n.clamp(1, Semaphore::MAX_PERMITS)))),
            sessions: Arc::new(DashMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Number of browsers currently running
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of the live session registry
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Stop admitting new browsers
    ///
    /// Running sessions belong to their requests and finish (and close) on
    /// their own; this only reports them.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.shutting_down.store(true, Ordering::SeqCst);
        if let Some(limit) = &self.limit {
            limit.close();
        }

        let remaining = self.sessions();
        if remaining.is_empty() {
            log::info!("BrowserManager shut down with no running browsers");
        } else {
            for session in &remaining {
                log::info!(
                    "Browser session {} still running since {}",
                    session.id,
                    session.started_at.to_rfc3339()
                );
            }
            log::warn!(
                "BrowserManager shut down with {} browser(s) still closing",
                remaining.len()
            );
        }
        Ok(())
    }

    async fn admit(&self) -> BrowserResult<Option<OwnedSemaphorePermit>> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(BrowserError::LaunchFailed("server is shutting down".to_string()));
        }
        match &self.limit {
            None => Ok(None),
            Some(limit) => {
                if limit.available_permits() == 0 {
                    log::debug!("Browser limit reached, waiting for a free slot");
                }
                limit
                    .clone()
                    .acquire_owned()
                    .await
                    .map(Some)
                    .map_err(|_| BrowserError::LaunchFailed("server is shutting down".to_string()))
            }
        }
    }
}

#[async_trait]
impl BrowserLauncher for BrowserManager {
    async fn launch(&self) -> BrowserResult<Box<dyn BrowserHandle>> {
        let permit = self.admit().await?;
        let inner = self.inner.launch().await?;

        let info = SessionInfo {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        };
        log::info!("Browser session {} started ({} active)", info.id, self.sessions.len() + 1);
        self.sessions.insert(info.id, info.clone());

        Ok(Box::new(ManagedBrowser {
            inner: Some(inner),
            id: info.id,
            sessions: self.sessions.clone(),
            _permit: permit,
        }))
    }
}

impl Drop for BrowserManager {
    fn drop(&mut self) {
        log::info!("BrowserManager dropping with {} active session(s)", self.sessions.len());
    }
}

/// Browser handle that deregisters and frees its slot when released
struct ManagedBrowser {
    inner: Option<Box<dyn BrowserHandle>>,
    id: Uuid,
    sessions: Arc<DashMap<Uuid, SessionInfo>>,
    _permit: Option<OwnedSemaphorePermit>,
}

#[async_trait]
impl BrowserHandle for ManagedBrowser {
    async fn open_tab(&mut self) -> BrowserResult<Box<dyn PageDriver>> {
        match self.inner.as_mut() {
            Some(inner) => inner.open_tab().await,
            None => Err(BrowserError::PageCreationFailed("browser already closed".to_string())),
        }
    }

    async fn close(mut self: Box<Self>) -> BrowserResult<()> {
        match self.inner.take() {
            Some(inner) => inner.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for ManagedBrowser {
    fn drop(&mut self) {
        if self.sessions.remove(&self.id).is_some() {
            log::info!("Browser session {} released", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Fingerprint;
    use crate::browser::WaitUntil;
    use tokio::sync::mpsc;

    struct NullPage;

    #[async_trait]
    impl PageDriver for NullPage {
        async fn apply_fingerprint(&self, _: &Fingerprint) -> BrowserResult<()> {
            Ok(())
        }
        async fn set_viewport(&self, _: u32, _: u32) -> BrowserResult<()> {
            Ok(())
        }
        async fn goto(&self, _: &str, _: WaitUntil) -> BrowserResult<()> {
            Ok(())
        }
        async fn evaluate(&self, _: &str) -> BrowserResult<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        async fn open_channel(&self, _: &str) -> BrowserResult<mpsc::UnboundedReceiver<String>> {
            Err(BrowserError::ChannelClosed)
        }
    }

    struct NullBrowser;

    #[async_trait]
    impl BrowserHandle for NullBrowser {
        async fn open_tab(&mut self) -> BrowserResult<Box<dyn PageDriver>> {
            Ok(Box::new(NullPage))
        }
        async fn close(self: Box<Self>) -> BrowserResult<()> {
            Ok(())
        }
    }

    struct NullLauncher;

    #[async_trait]
    impl BrowserLauncher for NullLauncher {
        async fn launch(&self) -> BrowserResult<Box<dyn BrowserHandle>> {
            Ok(Box::new(NullBrowser))
        }
    }

    #[tokio::test]
    async fn sessions_are_tracked_until_closed() {
        let manager = BrowserManager::new(Arc::new(NullLauncher), None);
        let first = manager.launch().await.unwrap();
        let second = manager.launch().await.unwrap();
        assert_eq!(manager.active_sessions(), 2);

        first.close().await.unwrap();
        assert_eq!(manager.active_sessions(), 1);
        drop(second);
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test]
    async fn limit_blocks_until_a_browser_closes() {
        let manager = Arc::new(BrowserManager::new(Arc::new(NullLauncher), Some(1)));
        let held = manager.launch().await.unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.launch().await.map(|_| ()) })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        held.close().await.unwrap();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_limit_is_clamped() {
        let manager = BrowserManager::new(Arc::new(NullLauncher), Some(usize::MAX));
        let browser = manager.launch().await.unwrap();
        assert_eq!(manager.active_sessions(), 1);
        browser.close().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_refuses_new_launches() {
        let manager = BrowserManager::new(Arc::new(NullLauncher), Some(2));
        manager.shutdown().await.unwrap();
        assert!(matches!(manager.launch().await, Err(BrowserError::LaunchFailed(_))));
    }
}
