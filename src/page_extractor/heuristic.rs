//! Best-effort extraction without human input
//!
//! Always yields exactly one text, one image and one button entry, none of
//! them anchored to a locator. A page without a body yields a single error
//! entry instead. Neither outcome fails the request.

use serde::Deserialize;
use tracing::{debug, warn};

use super::js_scripts::HEURISTIC_PROBE;
use crate::browser::PageDriver;
use crate::model::{Category, ExtractedElement};
use crate::utils::constants::{
    HEURISTIC_TEXT_LIMIT, NO_BODY_CONTENT, NO_BUTTONS_FOUND, NO_IMAGES_FOUND, NO_VISIBLE_CONTENT,
    SCRAPE_TIMEOUT,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HeuristicProbe {
    has_body: bool,
    text: Option<String>,
    image: Option<String>,
    button: Option<String>,
}

/// Collapse whitespace runs to single spaces and keep the first `limit` characters
pub fn collapse_text(raw: &str, limit: usize) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(limit)
        .collect()
}

fn classify(probe: HeuristicProbe) -> Vec<ExtractedElement> {
    if !probe.has_body {
        return vec![ExtractedElement::unanchored(Category::Error, NO_BODY_CONTENT)];
    }

    let text = probe
        .text
        .map(|t| collapse_text(&t, HEURISTIC_TEXT_LIMIT))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_VISIBLE_CONTENT.to_string());

    let image = probe
        .image
        .map(|src| src.trim().to_string())
        .filter(|src| !src.is_empty())
        .unwrap_or_else(|| NO_IMAGES_FOUND.to_string());

    let button = probe
        .button
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| NO_BUTTONS_FOUND.to_string());

    vec![
        ExtractedElement::unanchored(Category::Text, text),
        ExtractedElement::unanchored(Category::Image, image),
        ExtractedElement::unanchored(Category::Button, button),
    ]
}

/// Run the heuristic pass against the current page state
pub async fn extract_auto(page: &dyn PageDriver) -> Vec<ExtractedElement> {
    let raw = match page.evaluate(HEURISTIC_PROBE).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Heuristic probe failed: {}", e);
            return vec![ExtractedElement::unanchored(Category::Error, SCRAPE_TIMEOUT)];
        }
    };

    match serde_json::from_value::<HeuristicProbe>(raw) {
        Ok(probe) => {
            let entries = classify(probe);
            debug!("Heuristic pass produced {} entries", entries.len());
            entries
        }
        Err(e) => {
            warn!("Heuristic probe returned unexpected shape: {}", e);
            vec![ExtractedElement::unanchored(Category::Error, SCRAPE_TIMEOUT)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtractedValue;

    #[test]
    fn collapse_text_squeezes_whitespace_and_truncates() {
        assert_eq!(collapse_text("  Great\n\n  Deal\t!  ", 500), "Great Deal !");
        let long = "x".repeat(600);
        assert_eq!(collapse_text(&long, 500).chars().count(), 500);
    }

    #[test]
    fn collapse_text_truncates_on_char_boundaries() {
        assert_eq!(collapse_text("ééé", 2), "éé");
    }

    #[test]
    fn full_page_yields_text_image_button_triple() {
        let entries = classify(HeuristicProbe {
            has_body: true,
            text: Some("Great Deal".into()),
            image: Some("foo.jpg".into()),
            button: Some(" Buy ".into()),
        });
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.category, e.value.as_text().unwrap_or_default().to_string(), e.locator.is_none()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Category::Text, "Great Deal".to_string(), true),
                (Category::Image, "foo.jpg".to_string(), true),
                (Category::Button, "Buy".to_string(), true),
            ]
        );
    }

    #[test]
    fn missing_parts_fall_back_to_sentinels() {
        let entries = classify(HeuristicProbe {
            has_body: true,
            text: Some("   ".into()),
            image: None,
            button: Some("".into()),
        });
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].value, ExtractedValue::from(NO_VISIBLE_CONTENT));
        assert_eq!(entries[1].value, ExtractedValue::from(NO_IMAGES_FOUND));
        assert_eq!(entries[2].value, ExtractedValue::from(NO_BUTTONS_FOUND));
    }

    #[test]
    fn no_body_yields_single_error_entry() {
        let entries = classify(HeuristicProbe::default());
        assert_eq!(
            entries,
            vec![ExtractedElement::unanchored(Category::Error, NO_BODY_CONTENT)]
        );
    }
}
