//! Extraction orchestrator
//!
//! Ties one request together: stored selectors, page session, the chosen
//! extraction mode, the raw-result log and browser release.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::annotation::run_annotation;
use crate::browser::BrowserLauncher;
use crate::model::{ExtractedElement, ExtractionRequest, ExtractionResult, Mode, SelectorSet};
use crate::page_extractor::{extract_auto, merge, replay};
use crate::session::{PageSession, SessionSettings};
use crate::store::{ResultSink, SelectorStore};
use crate::utils::errors::{ScrapeError, ScrapeResult};

/// Runs extraction requests against freshly launched browsers
#[derive(Clone)]
pub struct Extractor {
    launcher: Arc<dyn BrowserLauncher>,
    store: SelectorStore,
    sink: Option<Arc<dyn ResultSink>>,
    settings: SessionSettings,
    live: Option<broadcast::Sender<Vec<ExtractedElement>>>,
}

impl Extractor {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, store: SelectorStore, settings: SessionSettings) -> Self {
        Self {
            launcher,
            store,
            sink: None,
            settings,
            live: None,
        }
    }

    /// Log every successful extraction to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Publish the live annotation selection list on `live`
    pub fn with_live_updates(mut self, live: broadcast::Sender<Vec<ExtractedElement>>) -> Self {
        self.live = Some(live);
        self
    }

    pub fn store(&self) -> &SelectorStore {
        &self.store
    }

    /// Stored selectors for the request's domain; storage errors count as none
    pub async fn stored_selectors(&self, request: &ExtractionRequest) -> Option<SelectorSet> {
        let domain = request.domain();
        match self.store.load(&domain).await {
            Ok(set) => set,
            Err(e) => {
                warn!("Failed to load stored selectors for {}: {}", domain, e);
                None
            }
        }
    }

    /// Run one extraction end to end
    pub async fn run(&self, request: &ExtractionRequest) -> ScrapeResult<ExtractionResult> {
        let stored = self.stored_selectors(request).await;
        self.run_with(request, stored).await
    }

    /// Run with selectors the caller already loaded
    pub async fn run_with(
        &self,
        request: &ExtractionRequest,
        stored: Option<SelectorSet>,
    ) -> ScrapeResult<ExtractionResult> {
        let url = request.target_url.as_str();
        info!("Starting {} extraction of {}", request.mode, url);

        let mut session = PageSession::open(self.launcher.as_ref(), url, &self.settings).await?;
        let outcome = self.extract(&session, request.mode, stored.as_ref()).await;
        session.close().await;

        let mut content = outcome?;
        content.retain(|element| {
            let keep = element.is_well_formed();
            if !keep {
                warn!("Dropping {} entry with an empty value from {}", element.category, url);
            }
            keep
        });
        if content.is_empty() {
            warn!("Extraction of {} produced nothing", url);
            return Err(ScrapeError::EmptyResult);
        }

        if let Some(sink) = &self.sink
            && let Err(e) = sink.record(url, &content).await
        {
            warn!("Failed to log extraction result for {}: {}", url, e);
        }

        info!("Extracted {} elements from {}", content.len(), url);
        Ok(content)
    }

    async fn extract(
        &self,
        session: &PageSession,
        mode: Mode,
        stored: Option<&SelectorSet>,
    ) -> ScrapeResult<ExtractionResult> {
        match mode {
            Mode::Interactive => run_annotation(session.page(), self.live.clone()).await,
            Mode::Auto => {
                session.wait_images_settled().await;
                let heuristic = extract_auto(session.page()).await;
                match stored {
                    Some(set) if !set.is_empty() => {
                        let replayed = replay(session.page(), set).await;
                        Ok(merge(heuristic, replayed))
                    }
                    _ => Ok(heuristic),
                }
            }
        }
    }
}
