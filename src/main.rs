// Extraction HTTP server
//
// Serves /scrape, /saveSelections and /health. Configuration comes from
// config.yaml (or $ADBANNER_CONFIG) with PORT, DATABASE_URL and
// CHROMIUM_PATH overrides.

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use adbanner_scraper::{ChromiumLauncher, build_state, load_yaml_config, start_server};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("adbanner_scraper=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_yaml_config()?;
    tracing::info!(
        "Loaded config: headless={}, max_concurrent_sessions={:?}, data_dir={}",
        config.browser.headless,
        config.browser.max_concurrent_sessions,
        config.storage.data_dir.display()
    );

    let launcher = Arc::new(ChromiumLauncher::new(config.browser.clone()));
    let state = build_state(&config, launcher).await?;

    start_server(&config, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    })
    .await
}
