//! Browser infrastructure for launching isolated Chrome instances
//!
//! The extraction pipeline only talks to the browser through the three traits
//! below. [`wrapper`] provides the chromiumoxide implementation; tests drive
//! the same pipeline with scripted pages.

mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable};
pub use wrapper::{BrowserWrapper, ChromiumLauncher, ChromiumPage, create_blank_page};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::session::Fingerprint;

/// Readiness condition a navigation waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// At most two in-flight network connections (networkidle2)
    NetworkIdle,
    /// The window `load` event
    Load,
    /// `DOMContentLoaded`
    DomContentLoaded,
}

impl WaitUntil {
    /// CDP lifecycle event name signalling this condition
    pub fn lifecycle_event(&self) -> &'static str {
        match self {
            WaitUntil::NetworkIdle => "networkAlmostIdle",
            WaitUntil::Load => "load",
            WaitUntil::DomContentLoaded => "DOMContentLoaded",
        }
    }

    /// Whether the window `load` event already implies this condition
    pub fn implied_by_load(&self) -> bool {
        matches!(self, WaitUntil::Load | WaitUntil::DomContentLoaded)
    }
}

/// Launches one isolated browser per call
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> BrowserResult<Box<dyn BrowserHandle>>;
}

/// A running browser owned by exactly one extraction request
#[async_trait]
pub trait BrowserHandle: Send {
    /// Open a fresh blank tab
    async fn open_tab(&mut self) -> BrowserResult<Box<dyn PageDriver>>;

    /// Close the browser and release its profile directory
    async fn close(self: Box<Self>) -> BrowserResult<()>;
}

/// Operations the pipeline performs on a single tab
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn apply_fingerprint(&self, fingerprint: &Fingerprint) -> BrowserResult<()>;

    async fn set_viewport(&self, width: u32, height: u32) -> BrowserResult<()>;

    /// Navigate and wait for `wait_until`; callers bound the wait
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> BrowserResult<()>;

    /// Evaluate an expression, awaiting promises, and return its JSON value
    async fn evaluate(&self, script: &str) -> BrowserResult<serde_json::Value>;

    /// Expose `window[name](payload)` to the page and stream its payloads
    ///
    /// The receiver yields `None` once the page or browser goes away.
    async fn open_channel(&self, name: &str) -> BrowserResult<mpsc::UnboundedReceiver<String>>;
}

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Script evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Page event channel closed")]
    ChannelClosed,
}

pub type BrowserResult<T> = Result<T, BrowserError>;
