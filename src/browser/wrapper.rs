//! chromiumoxide-backed browser lifecycle
//!
//! Each extraction request gets its own Chrome process with a throwaway
//! profile directory. The wrapper owns the process, its CDP handler task and
//! the profile directory, and tears all three down on close.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, LoaderId, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{EventLifecycleEvent, SetLifecycleEventsEnabledParams};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EvaluateParams, EventBindingCalled};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{BrowserError, BrowserHandle, BrowserLauncher, BrowserResult, PageDriver, WaitUntil};
use crate::BrowserConfig;
use crate::session::Fingerprint;

/// Wrapper for Browser and its event handler task
///
/// Ensures handler is properly cleaned up when browser is dropped.
/// Handler MUST be aborted to prevent it running indefinitely after
/// browser is closed.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    /// Get reference to inner browser
    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Clean up the profile directory (blocking operation)
    ///
    /// MUST be called AFTER `browser.wait()` completes so Chrome has released
    /// its file handles. Windows will fail to remove locked files.
    pub fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            debug!("Cleaning up profile directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                tracing::warn!(
                    "Failed to clean up profile directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();
        // Browser::drop() kills the Chrome process; the profile dir is only
        // released through close().
        if let Some(path) = self.user_data_dir.as_ref() {
            tracing::warn!(
                "BrowserWrapper dropped without close(). Profile directory will be orphaned: {}",
                path.display()
            );
        }
    }
}

#[async_trait]
impl BrowserHandle for BrowserWrapper {
    async fn open_tab(&mut self) -> BrowserResult<Box<dyn PageDriver>> {
        let page = create_blank_page(self)
            .await
            .map_err(|e| BrowserError::PageCreationFailed(format!("{e:#}")))?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(mut self: Box<Self>) -> BrowserResult<()> {
        info!("Closing browser");

        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("Failed to wait for browser exit: {}", e);
        }

        self.cleanup_temp_dir();
        Ok(())
    }
}

/// Launches a fresh stealth-configured Chrome per request
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> BrowserResult<Box<dyn BrowserHandle>> {
        // Unique profile per request so concurrent sessions never share state
        let user_data_dir =
            std::env::temp_dir().join(format!("adbanner_scraper_{}", uuid::Uuid::new_v4()));

        let (browser, handler) =
            crate::browser_setup::launch_browser(&self.config, Some(user_data_dir.clone()))
                .await
                .map_err(|e| BrowserError::LaunchFailed(format!("{e:#}")))?;

        Ok(Box::new(BrowserWrapper::new(browser, handler, user_data_dir)))
    }
}

/// Create a blank page
///
/// The fingerprint and viewport are applied while the tab is still on
/// about:blank so the first request to the target already carries them.
pub async fn create_blank_page(wrapper: &BrowserWrapper) -> Result<Page> {
    let page = wrapper
        .browser()
        .new_page("about:blank")
        .await
        .context("Failed to create blank page")?;

    debug!("Created blank page");
    Ok(page)
}

/// A single chromiumoxide tab
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    /// Navigate and return once the main frame's new document reaches `wait_until`
    ///
    /// `Page::goto` alone resolves on `load`, so it runs concurrently with the
    /// lifecycle stream. Events are only counted for the main frame and for the
    /// loader announced by its `init` event, which keeps iframes and the
    /// previous document out.
    async fn wait_for_lifecycle(&self, url: &str, wait_until: WaitUntil) -> BrowserResult<()> {
        let nav_err = |e: chromiumoxide::error::CdpError| BrowserError::NavigationFailed(e.to_string());

        self.page
            .execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(nav_err)?;

        // Subscribe before navigating so an early event is not missed
        let mut events = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(nav_err)?;
        let main_frame = self.page.mainframe().await.map_err(nav_err)?;

        let target = wait_until.lifecycle_event();
        let navigation = self.page.goto(url);
        tokio::pin!(navigation);
        let mut navigated = false;
        let mut loader: Option<LoaderId> = None;

        loop {
            tokio::select! {
                result = &mut navigation, if !navigated => {
                    result.map_err(nav_err)?;
                    if wait_until.implied_by_load() {
                        return Ok(());
                    }
                    navigated = true;
                }
                event = events.next() => {
                    let Some(event) = event else {
                        return Err(BrowserError::NavigationFailed(format!(
                            "page closed before '{target}' fired"
                        )));
                    };
                    if main_frame.as_ref().is_some_and(|frame| *frame != event.frame_id) {
                        continue;
                    }
                    if event.name == "init" {
                        loader = Some(event.loader_id.clone());
                    } else if event.name == target && loader.as_ref() == Some(&event.loader_id) {
                        debug!("Main frame reached {} for {}", target, url);
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn apply_fingerprint(&self, fingerprint: &Fingerprint) -> BrowserResult<()> {
        let page_err = |e: chromiumoxide::error::CdpError| BrowserError::PageCreationFailed(e.to_string());

        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(fingerprint.user_agent.clone())
            .accept_language(fingerprint.accept_language.clone())
            .build()
            .map_err(BrowserError::PageCreationFailed)?;
        self.page.set_user_agent(ua).await.map_err(page_err)?;

        let headers = Headers::new(serde_json::json!({
            "Accept-Language": fingerprint.accept_language,
        }));
        self.page
            .execute(SetExtraHttpHeadersParams::new(headers))
            .await
            .map_err(page_err)?;

        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> BrowserResult<()> {
        let metrics = SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false);
        self.page
            .execute(metrics)
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;
        Ok(())
    }

    async fn goto(&self, url: &str, wait_until: WaitUntil) -> BrowserResult<()> {
        self.wait_for_lifecycle(url, wait_until).await
    }

    async fn evaluate(&self, script: &str) -> BrowserResult<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(BrowserError::EvaluationFailed)?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn open_channel(&self, name: &str) -> BrowserResult<mpsc::UnboundedReceiver<String>> {
        let channel_err = |e: chromiumoxide::error::CdpError| BrowserError::EvaluationFailed(e.to_string());

        self.page
            .execute(AddBindingParams::new(name))
            .await
            .map_err(channel_err)?;

        let mut events = self
            .page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(channel_err)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let binding = name.to_string();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.name != binding {
                    continue;
                }
                if tx.send(event.payload.clone()).is_err() {
                    break;
                }
            }
            debug!("Binding '{}' event stream ended", binding);
        });

        Ok(rx)
    }
}
