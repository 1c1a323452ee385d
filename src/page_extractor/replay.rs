//! Stored selector replay
//!
//! Re-resolves each `{type, selector}` of a domain's selector set against the
//! current page. Locators that no longer match, images without a source and
//! locators whose evaluation fails are skipped; nothing is ever substituted
//! for them.

use tracing::{debug, warn};

use super::js_scripts::replay_script;
use super::snapshot::ElementSnapshot;
use crate::browser::PageDriver;
use crate::model::{Category, ExtractedElement, SelectorEntry, SelectorSet};

async fn replay_entry(page: &dyn PageDriver, entry: &SelectorEntry) -> Option<ExtractedElement> {
    let raw = match page.evaluate(&replay_script(&entry.locator)).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to extract {}: {}", entry.locator, e);
            return None;
        }
    };

    if raw.is_null() {
        debug!("Stored selector no longer matches: {}", entry.locator);
        return None;
    }

    let snapshot: ElementSnapshot = match serde_json::from_value(raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Unreadable snapshot for {}: {}", entry.locator, e);
            return None;
        }
    };

    let Some(value) = snapshot.replay_value(entry.category == Category::Image) else {
        warn!("Skipping image with no source: {}", entry.locator);
        return None;
    };

    Some(ExtractedElement::new(
        entry.category,
        Some(entry.locator.clone()),
        value,
    ))
}

/// Extract the current value of every resolvable stored locator, in set order
pub async fn replay(page: &dyn PageDriver, selectors: &SelectorSet) -> Vec<ExtractedElement> {
    let mut extracted = Vec::with_capacity(selectors.len());
    for entry in selectors.entries() {
        if let Some(element) = replay_entry(page, entry).await {
            extracted.push(element);
        }
    }
    debug!(
        "Replayed {}/{} stored selectors",
        extracted.len(),
        selectors.len()
    );
    extracted
}

/// Heuristic entries first, then replay entries whose locator is not already present
///
/// Entries without a locator never collide.
pub fn merge(heuristic: Vec<ExtractedElement>, replayed: Vec<ExtractedElement>) -> Vec<ExtractedElement> {
    let mut seen: std::collections::HashSet<_> = heuristic
        .iter()
        .filter_map(|e| e.locator.clone())
        .collect();

    let mut merged = heuristic;
    for element in replayed {
        match &element.locator {
            Some(locator) if !seen.insert(locator.clone()) => continue,
            _ => merged.push(element),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Locator;

    fn anchored(category: Category, locator: &str, value: &str) -> ExtractedElement {
        ExtractedElement::new(category, Some(Locator::new(locator)), value)
    }

    #[test]
    fn merge_appends_only_unseen_locators() {
        let heuristic = vec![
            ExtractedElement::unanchored(Category::Text, "body"),
            anchored(Category::Title, "h1#name", "Heuristic title"),
        ];
        let replayed = vec![
            anchored(Category::Title, "h1#name", "Replayed title"),
            anchored(Category::Price, "span.price", "$10"),
        ];

        let merged = merge(heuristic.clone(), replayed);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[..2], heuristic[..]);
        assert_eq!(merged[2], anchored(Category::Price, "span.price", "$10"));
    }

    #[test]
    fn merge_keeps_unanchored_entries_from_both_sides() {
        let merged = merge(
            vec![ExtractedElement::unanchored(Category::Text, "a")],
            vec![ExtractedElement::unanchored(Category::Text, "a")],
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_never_repeats_a_locator() {
        let merged = merge(
            vec![anchored(Category::Title, "h1", "x")],
            vec![
                anchored(Category::Price, "span.p", "1"),
                anchored(Category::Price, "span.p", "2"),
                anchored(Category::Title, "h1", "y"),
            ],
        );
        let locators: Vec<_> = merged.iter().filter_map(|e| e.locator.clone()).collect();
        let unique: std::collections::HashSet<_> = locators.iter().cloned().collect();
        assert_eq!(locators.len(), unique.len());
        assert_eq!(merged.len(), 2);
    }
}
