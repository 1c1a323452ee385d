//! Chrome discovery and launch
//!
//! Resolution order for the executable: `browser.executable_path` from the
//! config, `CHROMIUM_PATH`, well-known install locations, `which`, and finally
//! a managed Chromium downloaded into the user cache directory.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::BrowserConfig;

/// RAII guard for the per-session profile directory
///
/// Removes the directory on drop unless consumed by `into_path()`, so a
/// failed launch never leaves a profile behind.
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create user data directory")?;
        Ok(Self { path, keep: false })
    }

    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed profile dir after launch failure: {}", self.path.display()),
            Err(e) => warn!("Failed to remove profile dir {}: {}", self.path.display(), e),
        }
    }
}

fn platform_candidates() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &[
            r"%PROGRAMFILES%\Google\Chrome\Application\chrome.exe",
            r"%PROGRAMFILES(X86)%\Google\Chrome\Application\chrome.exe",
            r"%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe",
            r"%PROGRAMFILES%\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "~/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    }
}

/// Expand `~/` and Windows `%VAR%` tokens in a candidate path
fn resolve_candidate(raw: &str) -> Option<PathBuf> {
    if let Some(rest) = raw.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    if raw.contains('%') {
        return Some(PathBuf::from(expand_windows_env_vars(raw)));
    }
    Some(PathBuf::from(raw))
}

/// Replace `%VAR%` tokens with their environment values, keeping unknown tokens
fn expand_windows_env_vars(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            result.push(ch);
            continue;
        }
        let var_name: String = chars.by_ref().take_while(|&c| c != '%').collect();
        if var_name.is_empty() {
            result.push('%');
            continue;
        }
        match std::env::var(&var_name) {
            Ok(value) => result.push_str(&value),
            Err(_) => {
                result.push('%');
                result.push_str(&var_name);
                result.push('%');
            }
        }
    }

    result
}

fn which(cmd: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(cmd).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!found.is_empty()).then(|| PathBuf::from(found))
}

/// Find a local Chrome/Chromium executable
pub async fn find_browser_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            info!("Using configured browser: {}", path.display());
            return Ok(path.to_path_buf());
        }
        warn!("Configured browser path does not exist: {}", path.display());
    }

    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!("CHROMIUM_PATH points to non-existent file: {}", path.display());
    }

    if let Some(path) = platform_candidates()
        .iter()
        .filter_map(|raw| resolve_candidate(raw))
        .find(|path| path.exists())
    {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    if !cfg!(target_os = "windows")
        && let Some(path) = ["chromium", "chromium-browser", "google-chrome", "chrome"]
            .into_iter()
            .find_map(which)
    {
        info!("Found browser on PATH: {}", path.display());
        return Ok(path);
    }

    warn!("No Chrome/Chromium executable found, falling back to managed download");
    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium into the user cache directory
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| std::env::temp_dir().join(".cache"))
        .join("adbanner_scraper/chromium");
    info!("Downloading managed Chromium into {}", cache_dir.display());

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!("Downloaded Chromium to: {}", revision_info.folder_path.display());
    Ok(revision_info.executable_path)
}

/// Unified browser launcher that finds or downloads Chrome/Chromium and
/// configures it with stealth mode settings.
///
/// # Arguments
/// * `config` - Headless flag, security toggle and window size
/// * `chrome_data_dir` - Optional custom user data directory path. If None, uses process ID fallback.
///
/// # Profile Isolation
/// Every extraction request passes its own `chrome_data_dir`, so concurrent
/// requests never contend for a profile lock or share cookies.
pub async fn launch_browser(
    config: &BrowserConfig,
    chrome_data_dir: Option<PathBuf>,
) -> Result<(Browser, JoinHandle<()>)> {
    // First try to find the browser
    let chrome_path = match find_browser_executable(config.executable_path.as_deref()).await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    // Use provided chrome_data_dir or fall back to process ID
    let user_data_dir_path = chrome_data_dir.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("adbanner_scraper_{}", std::process::id()))
    });

    // Create directory with automatic cleanup on error
    let temp_guard = TempDirGuard::new(user_data_dir_path)?;
    let user_data_dir = temp_guard.path.clone();

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(120))
        .window_size(config.window.width, config.window.height)
        .user_data_dir(user_data_dir)
        .chrome_executable(chrome_path);

    if config.headless {
        config_builder = config_builder.headless_mode(HeadlessMode::default());
    } else {
        config_builder = config_builder.with_head();
    }

    // User agent is randomized per page, not per process
    config_builder = config_builder
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-gpu")
        .arg("--disable-software-rasterizer")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-extensions")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-backgrounding-occluded-windows")
        .arg("--disable-breakpad")
        .arg("--disable-features=TranslateUI")
        .arg("--disable-hang-monitor")
        .arg("--disable-prompt-on-repost")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio");

    if config.disable_security {
        warn!("Disabling browser security features (disable_security=true)");
        config_builder = config_builder
            .arg("--disable-web-security")
            .arg("--disable-features=IsolateOrigins,site-per-process")
            .arg("--ignore-certificate-errors");
    }

    // Always disable sandbox in containerized environments (Docker detection)
    if should_disable_sandbox() {
        info!("Detected containerized environment, disabling sandbox");
        config_builder = config_builder
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");
    } else if config.disable_security {
        config_builder = config_builder
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");
    }

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    debug!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                let error_msg = e.to_string();

                // Chrome emits CDP events chromiumoxide does not model; those
                // surface as deserialization errors and are harmless.
                let is_benign_serialization_error =
                    error_msg.contains("data did not match any variant of untagged enum Message")
                    || error_msg.contains("Failed to deserialize WS response");

                if !is_benign_serialization_error {
                    error!("Browser handler error: {:?}", e);
                } else {
                    trace!("Suppressed benign CDP serialization error: {}", error_msg);
                }
            }
        }
        debug!("Browser handler task completed");
    });

    // Success - the BrowserWrapper now owns the directory
    temp_guard.into_path();

    Ok((browser, handler_task))
}

/// Detect if running in containerized environment (Docker, etc.)
/// In containers, sandbox must be disabled as setuid doesn't work
fn should_disable_sandbox() -> bool {
    std::path::Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}
