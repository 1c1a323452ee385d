//! Shared configuration constants for the extraction pipeline
//!
//! Default values, sentinel strings and fingerprint pools used throughout the
//! codebase to ensure consistency and avoid magic values.

/// User agents rotated per session
///
/// Desktop Chrome on the three major platforms. Refresh alongside Chrome
/// stable releases so the pool stays within a plausible version window.
pub const USER_AGENT_POOL: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.6778.205 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.6723.116 Safari/537.36",
];

/// Accept-Language sent with every request
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// CDP binding the annotation overlay pushes its events through
pub const ANNOTATION_BINDING: &str = "__adbannerAnnotation";

/// `type` of the `window.postMessage` carrying the live selection list
pub const LIVE_SELECTIONS_MESSAGE: &str = "scraper-data";

/// Characters of body text kept by the heuristic extractor
pub const HEURISTIC_TEXT_LIMIT: usize = 500;

// Sentinel values recorded in place of missing content
pub const NO_VISIBLE_CONTENT: &str = "No visible content available";
pub const NO_IMAGES_FOUND: &str = "No images found";
pub const NO_BUTTONS_FOUND: &str = "No buttons found";
pub const NO_BODY_CONTENT: &str = "No body content found";
pub const SCRAPE_TIMEOUT: &str = "Timeout while scraping";
pub const NO_CONTENT_AVAILABLE: &str = "No content available";
pub const NO_TEXT_AVAILABLE: &str = "No text available";
pub const NO_ALT_TEXT: &str = "No alt text";
pub const NO_TEXT: &str = "No text";

/// File holding a domain's selector set inside its storage directory
pub const SELECTORS_FILE: &str = "selectors.json";

/// Append-only raw result log written by the default sink
pub const RESULTS_FILE: &str = "scraped_results.jsonl";
