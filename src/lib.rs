//! Product page extraction for ad banner generation
//!
//! Drives a headless Chrome per request to pull titles, prices, images and
//! buttons off arbitrary product pages, either by letting a person annotate
//! the page or by a heuristic pass combined with selectors stored per site.

pub mod annotation;
pub mod browser;
pub mod browser_setup;
pub mod locator;
mod manager;
pub mod model;
pub mod orchestrator;
pub mod page_extractor;
pub mod server;
pub mod session;
pub mod store;
pub mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub navigation: NavigationConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Window dimensions, also used as the page viewport
    #[serde(default)]
    pub window: WindowConfig,

    /// Cap on simultaneously running browsers; unset means unbounded
    #[serde(default)]
    pub max_concurrent_sessions: Option<usize>,

    /// Chrome/Chromium binary to use instead of auto-detection
    #[serde(default)]
    pub executable_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Page loading, scrolling and readiness waits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_body_timeout_ms")]
    pub body_timeout_ms: u64,

    #[serde(default = "default_image_settle_timeout_ms")]
    pub image_settle_timeout_ms: u64,

    #[serde(default = "default_scroll_step_px")]
    pub scroll_step_px: u32,

    #[serde(default = "default_scroll_interval_ms")]
    pub scroll_interval_ms: u64,

    /// Upper bound on scroll steps for pages that keep growing
    #[serde(default = "default_scroll_max_steps")]
    pub scroll_max_steps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for per-domain selector sets and the JSONL result log
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// PostgreSQL URL for the result log (needs the `postgres` feature)
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_window_width() -> u32 {
    1200
}

fn default_window_height() -> u32 {
    850
}

fn default_max_attempts() -> u32 {
    3
}
fn default_attempt_timeout_ms() -> u64 {
    90_000
}
fn default_backoff_ms() -> u64 {
    1_000
}
fn default_body_timeout_ms() -> u64 {
    30_000
}
fn default_image_settle_timeout_ms() -> u64 {
    10_000
}
fn default_scroll_step_px() -> u32 {
    500
}
fn default_scroll_interval_ms() -> u64 {
    300
}
fn default_scroll_max_steps() -> u32 {
    200
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("scraped_data")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
            max_concurrent_sessions: None,
            executable_path: None,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            backoff_ms: default_backoff_ms(),
            body_timeout_ms: default_body_timeout_ms(),
            image_settle_timeout_ms: default_image_settle_timeout_ms(),
            scroll_step_px: default_scroll_step_px(),
            scroll_interval_ms: default_scroll_interval_ms(),
            scroll_max_steps: default_scroll_max_steps(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_url: None,
        }
    }
}

impl Config {
    /// Apply `PORT`, `DATABASE_URL` and `CHROMIUM_PATH` overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Ok(url) = std::env::var("DATABASE_URL")
            && !url.trim().is_empty()
        {
            self.storage.database_url = Some(url);
        }
        if let Ok(path) = std::env::var("CHROMIUM_PATH")
            && !path.trim().is_empty()
        {
            self.browser.executable_path = Some(PathBuf::from(path));
        }
    }
}

/// Load config from `$ADBANNER_CONFIG` or `./config.yaml`, then apply env overrides
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = std::env::var_os("ADBANNER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));

    let mut config = if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        serde_yaml::from_str(&contents)?
    } else {
        Config::default()
    };
    config.apply_env_overrides();
    Ok(config)
}

pub use browser::{
    BrowserError, BrowserHandle, BrowserLauncher, BrowserResult, ChromiumLauncher, PageDriver,
    WaitUntil,
};
pub use manager::{BrowserManager, SessionInfo};
pub use model::{Category, ExtractedElement, ExtractedValue, ExtractionRequest, Locator, Mode, SelectorSet};
pub use orchestrator::Extractor;
pub use server::{AppState, router};
pub use utils::errors::{ScrapeError, ScrapeResult, ValidationError};

/// Buffered selection updates per live subscriber before it starts lagging
const LIVE_UPDATE_CAPACITY: usize = 64;

/// Wire the browser manager, store, result sink and live updates from `config`
///
/// `launcher` is the raw browser source; it is wrapped in a [`BrowserManager`]
/// enforcing `browser.max_concurrent_sessions`.
pub async fn build_state(config: &Config, launcher: Arc<dyn BrowserLauncher>) -> anyhow::Result<AppState> {
    let settings = session::SessionSettings::from_config(&config.navigation, &config.browser)?;
    let manager = Arc::new(BrowserManager::new(launcher, config.browser.max_concurrent_sessions));
    let store = store::SelectorStore::new(&config.storage.data_dir);

    let (live, _) = tokio::sync::broadcast::channel(LIVE_UPDATE_CAPACITY);

    let extractor = Extractor::new(manager.clone(), store, settings)
        .with_sink(result_sink(config).await?)
        .with_live_updates(live.clone());

    Ok(AppState {
        extractor,
        manager,
        live,
    })
}

#[cfg(feature = "postgres")]
async fn result_sink(config: &Config) -> anyhow::Result<Arc<dyn store::ResultSink>> {
    if let Some(url) = config.storage.database_url.as_deref() {
        return Ok(Arc::new(store::PostgresResultSink::connect(url).await?));
    }
    Ok(jsonl_sink(config))
}

#[cfg(not(feature = "postgres"))]
async fn result_sink(config: &Config) -> anyhow::Result<Arc<dyn store::ResultSink>> {
    if config.storage.database_url.is_some() {
        tracing::warn!("database_url is set but the postgres feature is disabled; logging results to JSONL");
    }
    Ok(jsonl_sink(config))
}

fn jsonl_sink(config: &Config) -> Arc<dyn store::ResultSink> {
    Arc::new(store::JsonlResultSink::new(
        config.storage.data_dir.join(utils::constants::RESULTS_FILE),
    ))
}

/// Bind `config.server` and serve until `shutdown` resolves
pub async fn start_server(
    config: &Config,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;
    tracing::info!("Listening on http://{}", addr);

    let manager = state.manager.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    manager.shutdown().await
}
