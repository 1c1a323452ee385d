//! Page session controller
//!
//! One [`PageSession`] is one isolated browser with a single tab, already
//! navigated to the target and scrolled so lazy content has loaded. The
//! session always ends with [`PageSession::close`], on success and failure
//! alike.

mod fingerprint;
mod retry;

pub use fingerprint::Fingerprint;
pub use retry::RetryPolicy;

use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::browser::{BrowserHandle, BrowserLauncher, PageDriver};
use crate::page_extractor::js_scripts::{BODY_READY, IMAGES_SETTLED, scroll_script};
use crate::utils::errors::{ScrapeError, ScrapeResult};
use crate::utils::timeout::{TimeoutError, validate_navigation_timeout, validate_readiness_timeout};
use crate::utils::wait_for_element::wait_for_condition;
use crate::{BrowserConfig, NavigationConfig};

/// Lazy-load scroll parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSettings {
    pub step_px: u32,
    pub interval: Duration,
    pub max_steps: u32,
}

/// Everything a session needs besides the launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub retry: RetryPolicy,
    pub viewport: (u32, u32),
    pub scroll: ScrollSettings,
    pub body_timeout: Duration,
    pub image_settle_timeout: Duration,
}

impl SessionSettings {
    /// Build settings from configuration, rejecting out-of-range timeouts
    pub fn from_config(nav: &NavigationConfig, browser: &BrowserConfig) -> Result<Self, TimeoutError> {
        let retry = RetryPolicy {
            max_attempts: nav.max_attempts,
            per_attempt_timeout: validate_navigation_timeout(nav.attempt_timeout_ms)?,
            backoff: Duration::from_millis(nav.backoff_ms),
            ..RetryPolicy::default()
        };

        Ok(Self {
            retry,
            viewport: (browser.window.width, browser.window.height),
            scroll: ScrollSettings {
                step_px: nav.scroll_step_px,
                interval: Duration::from_millis(nav.scroll_interval_ms),
                max_steps: nav.scroll_max_steps,
            },
            body_timeout: validate_readiness_timeout("Body", nav.body_timeout_ms)?,
            image_settle_timeout: validate_readiness_timeout("Image settle", nav.image_settle_timeout_ms)?,
        })
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            viewport: (1200, 850),
            scroll: ScrollSettings {
                step_px: 500,
                interval: Duration::from_millis(300),
                max_steps: 200,
            },
            body_timeout: Duration::from_secs(30),
            image_settle_timeout: Duration::from_secs(10),
        }
    }
}

/// An open browser and tab positioned on the target page
pub struct PageSession {
    // Only touched through `&mut self`; the mutex makes the session `Sync`
    browser: Mutex<Option<Box<dyn BrowserHandle>>>,
    page: Box<dyn PageDriver>,
    settings: SessionSettings,
}

impl PageSession {
    /// Launch a browser, open a tab and bring `url` into a readable state
    ///
    /// On failure the browser is closed before returning.
    pub async fn open(
        launcher: &dyn BrowserLauncher,
        url: &str,
        settings: &SessionSettings,
    ) -> ScrapeResult<Self> {
        let mut browser = launcher.launch().await.map_err(|e| ScrapeError::Launch(e.to_string()))?;

        let page = match prepare_tab(browser.as_mut(), settings).await {
            Ok(page) => page,
            Err(e) => {
                close_browser(browser).await;
                return Err(e);
            }
        };

        let mut session = Self {
            browser: Mutex::new(Some(browser)),
            page,
            settings: settings.clone(),
        };

        if let Err(e) = session.navigate(url).await {
            session.close().await;
            return Err(e);
        }

        session.scroll_to_bottom().await;
        if !wait_for_condition(session.page(), BODY_READY, settings.body_timeout).await {
            warn!("Timed out waiting for <body> on {}, continuing", url);
        }

        Ok(session)
    }

    pub fn page(&self) -> &dyn PageDriver {
        self.page.as_ref()
    }

    async fn navigate(&self, url: &str) -> ScrapeResult<()> {
        let policy = &self.settings.retry;
        let attempts = policy.attempts();
        let mut last_error = String::new();

        for attempt in 0..attempts {
            let delay = policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let wait_until = policy.wait_until_for(attempt);
            debug!(
                "Navigating to {} (attempt {}/{}, waiting for {:?})",
                url,
                attempt + 1,
                attempts,
                wait_until
            );

            match tokio::time::timeout(policy.per_attempt_timeout, self.page.goto(url, wait_until)).await {
                Ok(Ok(())) => {
                    info!("Loaded {} on attempt {}", url, attempt + 1);
                    return Ok(());
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!(
                        "timed out after {}ms waiting for {:?}",
                        policy.per_attempt_timeout.as_millis(),
                        wait_until
                    )
                }
            }
            warn!("Attempt {} to load {} failed: {}", attempt + 1, url, last_error);
        }

        Err(ScrapeError::PageLoad {
            attempts,
            last_error,
        })
    }

    async fn scroll_to_bottom(&self) {
        let scroll = self.settings.scroll;
        let script = scroll_script(scroll.step_px, scroll.interval.as_millis() as u64, scroll.max_steps);
        match self.page.evaluate(&script).await {
            Ok(distance) => debug!("Scrolled {} px", distance),
            Err(e) => warn!("Scroll failed, continuing without lazy content: {}", e),
        }
    }

    /// Wait until every `<img>` has real pixels; gives up quietly on timeout
    pub async fn wait_images_settled(&self) {
        if !wait_for_condition(self.page(), IMAGES_SETTLED, self.settings.image_settle_timeout).await {
            warn!(
                "Images still loading after {}ms, continuing",
                self.settings.image_settle_timeout.as_millis()
            );
        }
    }

    /// Release the browser and its profile directory; safe to call twice
    pub async fn close(&mut self) {
        let slot = match self.browser.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(browser) = slot {
            close_browser(browser).await;
        }
    }
}

async fn prepare_tab(
    browser: &mut dyn BrowserHandle,
    settings: &SessionSettings,
) -> ScrapeResult<Box<dyn PageDriver>> {
    let page = browser.open_tab().await.map_err(|e| ScrapeError::Launch(e.to_string()))?;

    let fingerprint = Fingerprint::random();
    debug!("Using user agent {}", fingerprint.user_agent);
    if let Err(e) = page.apply_fingerprint(&fingerprint).await {
        warn!("Failed to apply fingerprint: {}", e);
    }

    let (width, height) = settings.viewport;
    if let Err(e) = page.set_viewport(width, height).await {
        warn!("Failed to set viewport {}x{}: {}", width, height, e);
    }

    Ok(page)
}

async fn close_browser(browser: Box<dyn BrowserHandle>) {
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_navigation_config() {
        let nav = NavigationConfig {
            max_attempts: 5,
            attempt_timeout_ms: 1_000,
            backoff_ms: 10,
            ..NavigationConfig::default()
        };
        let settings = SessionSettings::from_config(&nav, &BrowserConfig::default()).unwrap();
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.per_attempt_timeout, Duration::from_secs(1));
        assert_eq!(settings.retry.backoff, Duration::from_millis(10));
        assert_eq!(settings.viewport, (1200, 850));
    }

    #[test]
    fn defaults_match_default_config() {
        let settings =
            SessionSettings::from_config(&NavigationConfig::default(), &BrowserConfig::default()).unwrap();
        assert_eq!(settings, SessionSettings::default());
    }

    #[test]
    fn oversized_timeouts_are_rejected() {
        let nav = NavigationConfig {
            body_timeout_ms: 10 * 60 * 1000,
            ..NavigationConfig::default()
        };
        let err = SessionSettings::from_config(&nav, &BrowserConfig::default()).unwrap_err();
        assert_eq!(err.what, "Body");
    }
}
