//! Scripted browser used by the integration tests
//!
//! The fake page answers each injected script by its `/* adbanner:<name> */`
//! marker, so the whole pipeline runs without Chrome.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adbanner_scraper::session::{Fingerprint, ScrollSettings, SessionSettings};
use adbanner_scraper::session::RetryPolicy;
use adbanner_scraper::{BrowserError, BrowserHandle, BrowserLauncher, BrowserResult, PageDriver, WaitUntil};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

/// What the fake page looks like
#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    /// Answer to the heuristic script
    pub heuristic: Value,
    /// Locator → element snapshot answered by replay lookups
    pub elements: HashMap<String, Value>,
    /// Events pushed through the annotation binding once the overlay is injected
    pub annotation_events: Vec<Value>,
    /// Close the annotation channel after the scripted events
    pub close_channel_after_events: bool,
    pub fail_navigation: bool,
    /// Body and image readiness predicates never turn true
    pub never_ready: bool,
    /// The heuristic script fails to evaluate
    pub heuristic_fails: bool,
    /// Replay lookups for these locators fail with an evaluation error
    pub failing_locators: Vec<String>,
}

impl FakeSite {
    pub fn product_page() -> Self {
        Self {
            heuristic: json!({
                "hasBody": true,
                "text": "  Great\n Deal  ",
                "image": "foo.jpg",
                "button": " Buy ",
            }),
            ..Self::default()
        }
    }

    pub fn with_element(mut self, locator: &str, snapshot: Value) -> Self {
        self.elements.insert(locator.to_string(), snapshot);
        self
    }

    pub fn with_failing_locator(mut self, locator: &str) -> Self {
        self.failing_locators.push(locator.to_string());
        self
    }

    pub fn with_annotation(mut self, events: Vec<Value>) -> Self {
        self.annotation_events = events;
        self
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub navigations: Mutex<Vec<WaitUntil>>,
    /// Scripts that posted the live selection list into the page
    pub published: Mutex<Vec<String>>,
}

impl Stats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<WaitUntil> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

pub struct FakeLauncher {
    site: Arc<FakeSite>,
    pub stats: Arc<Stats>,
}

impl FakeLauncher {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            stats: Arc::new(Stats::default()),
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> BrowserResult<Box<dyn BrowserHandle>> {
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBrowser {
            site: self.site.clone(),
            stats: self.stats.clone(),
        }))
    }
}

struct FakeBrowser {
    site: Arc<FakeSite>,
    stats: Arc<Stats>,
}

#[async_trait]
impl BrowserHandle for FakeBrowser {
    async fn open_tab(&mut self) -> BrowserResult<Box<dyn PageDriver>> {
        Ok(Box::new(FakePage {
            site: self.site.clone(),
            stats: self.stats.clone(),
            channel: Mutex::new(None),
        }))
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePage {
    site: Arc<FakeSite>,
    stats: Arc<Stats>,
    channel: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

fn queries(script: &str, locator: &str) -> bool {
    let literal = serde_json::to_string(locator).unwrap();
    script.contains(&format!("document.querySelector({literal})"))
}

impl FakePage {
    fn replay_lookup(&self, script: &str) -> BrowserResult<Value> {
        if let Some(locator) = self.site.failing_locators.iter().find(|l| queries(script, l)) {
            return Err(BrowserError::EvaluationFailed(format!("SyntaxError: '{locator}' is not a valid selector")));
        }
        Ok(self
            .site
            .elements
            .iter()
            .find(|(locator, _)| queries(script, locator))
            .map(|(_, snapshot)| snapshot.clone())
            .unwrap_or(Value::Null))
    }

    fn inject_annotator(&self) -> Value {
        let mut slot = self.channel.lock().unwrap();
        if let Some(tx) = slot.as_ref() {
            for event in &self.site.annotation_events {
                let _ = tx.send(event.to_string());
            }
        }
        if self.site.close_channel_after_events {
            slot.take();
        }
        Value::Bool(true)
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn apply_fingerprint(&self, _fingerprint: &Fingerprint) -> BrowserResult<()> {
        Ok(())
    }

    async fn set_viewport(&self, _width: u32, _height: u32) -> BrowserResult<()> {
        Ok(())
    }

    async fn goto(&self, url: &str, wait_until: WaitUntil) -> BrowserResult<()> {
        self.stats.navigations.lock().unwrap().push(wait_until);
        if self.site.fail_navigation {
            return Err(BrowserError::NavigationFailed(format!("net::ERR_NAME_NOT_RESOLVED at {url}")));
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> BrowserResult<Value> {
        if script.starts_with("/* adbanner:heuristic */") {
            if self.site.heuristic_fails {
                return Err(BrowserError::EvaluationFailed("Execution context was destroyed".into()));
            }
            Ok(self.site.heuristic.clone())
        } else if script.starts_with("/* adbanner:replay */") {
            self.replay_lookup(script)
        } else if script.starts_with("/* adbanner:publish */") {
            self.stats.published.lock().unwrap().push(script.to_string());
            Ok(Value::Bool(true))
        } else if script.starts_with("/* adbanner:annotator */") {
            Ok(self.inject_annotator())
        } else if script.starts_with("/* adbanner:scroll */") {
            Ok(json!(1000))
        } else if script.starts_with("/* adbanner:body-ready */")
            || script.starts_with("/* adbanner:images-settled */")
        {
            Ok(Value::Bool(!self.site.never_ready))
        } else {
            Err(BrowserError::EvaluationFailed(format!("unexpected script: {script}")))
        }
    }

    async fn open_channel(&self, _name: &str) -> BrowserResult<mpsc::UnboundedReceiver<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.channel.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

/// Session settings that keep retries and readiness waits short
pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            per_attempt_timeout: Duration::from_secs(1),
            backoff: Duration::from_millis(1),
            ..RetryPolicy::default()
        },
        viewport: (1200, 850),
        scroll: ScrollSettings {
            step_px: 500,
            interval: Duration::from_millis(1),
            max_steps: 10,
        },
        body_timeout: Duration::from_millis(100),
        image_settle_timeout: Duration::from_millis(100),
    }
}

/// Overlay events for one complete annotation pass
///
/// Clicks a source-less image first (rejected), then annotates `h1#name` as
/// the title and finishes.
pub fn title_annotation() -> Vec<Value> {
    let sourceless = json!({"tag": "img", "classList": ["hero"]});
    let title = json!({"tag": "h1", "id": "name", "classList": ["product-title"], "innerText": " Trail Runner 2 "});
    vec![
        json!({"kind": "welcomeShown"}),
        json!({"kind": "welcomeDismissed"}),
        json!({"kind": "elementPicked", "snapshot": sourceless}),
        json!({"kind": "categoryChosen", "category": "image", "snapshot": sourceless}),
        json!({"kind": "elementPicked", "snapshot": title}),
        json!({"kind": "categoryChosen", "category": "title", "snapshot": title}),
        json!({"kind": "doneRequested"}),
    ]
}
