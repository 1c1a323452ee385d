//! Domain → selector set persistence
//!
//! Layout: `<root>/<domain>/selectors.json`, a pretty-printed JSON array of
//! `{type, selector}`. Saves replace the whole set through a temp file and a
//! rename, so a concurrent reader sees either the old or the new set.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::{StoreError, StoreResult};
use crate::model::{SelectorEntry, SelectorSet};
use crate::utils::constants::SELECTORS_FILE;

#[derive(Debug, Clone)]
pub struct SelectorStore {
    root: PathBuf,
}

/// Directory name for a normalized domain
///
/// Keeps `[A-Za-z0-9.-_]`, replaces anything else, and never yields a
/// relative path component.
fn domain_dir_name(domain: &str) -> String {
    let cleaned: String = domain
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        format!("_{cleaned}")
    } else {
        cleaned
    }
}

impl SelectorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_for(&self, domain: &str) -> PathBuf {
        self.root.join(domain_dir_name(domain)).join(SELECTORS_FILE)
    }

    /// Stored set for `domain`, or `None` when absent or unreadable
    ///
    /// A file that is not a JSON array is logged and treated as absent.
    /// Individual entries without a usable `type` or `selector` are skipped.
    pub async fn load(&self, domain: &str) -> StoreResult<Option<SelectorSet>> {
        let path = self.file_for(domain);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored selectors for {}", domain);
                return Ok(None);
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let items = match serde_json::from_slice::<Vec<serde_json::Value>>(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!("Ignoring unreadable selector file {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        let total = items.len();
        let entries: Vec<SelectorEntry> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping stored selector for {}: {}", domain, e);
                    None
                }
            })
            .collect();
        if entries.len() < total {
            warn!(
                "Skipped {} malformed entries in {}",
                total - entries.len(),
                path.display()
            );
        }

        debug!("Loaded {} stored selectors for {}", entries.len(), domain);
        Ok(Some(SelectorSet::new(entries)))
    }

    /// Replace the stored set for `domain`
    pub async fn save(&self, domain: &str, set: &SelectorSet) -> StoreResult<()> {
        let path = self.file_for(domain);
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let body = serde_json::to_vec_pretty(set)?;
        let tmp = dir.join(format!("{SELECTORS_FILE}.{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(&path, e));
        }

        info!("Saved {} selectors for {}", set.len(), domain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Locator, SelectorEntry};

    fn sample() -> SelectorSet {
        SelectorSet::new(vec![
            SelectorEntry {
                category: Category::Title,
                locator: Locator::new("h1#name"),
            },
            SelectorEntry {
                category: Category::Price,
                locator: Locator::new("span.price.current"),
            },
        ])
    }

    #[tokio::test]
    async fn missing_domain_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectorStore::new(dir.path());
        assert_eq!(store.load("shop.example").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_is_idempotent_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectorStore::new(dir.path());

        store.save("shop.example", &sample()).await.unwrap();
        let first = std::fs::read(dir.path().join("shop.example").join(SELECTORS_FILE)).unwrap();
        store.save("shop.example", &sample()).await.unwrap();
        let second = std::fs::read(dir.path().join("shop.example").join(SELECTORS_FILE)).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.load("shop.example").await.unwrap(), Some(sample()));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("shop.example"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn save_replaces_the_whole_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectorStore::new(dir.path());
        store.save("shop.example", &sample()).await.unwrap();

        let replacement = SelectorSet::new(vec![SelectorEntry {
            category: Category::Image,
            locator: Locator::new("img.hero"),
        }]);
        store.save("shop.example", &replacement).await.unwrap();
        assert_eq!(store.load("shop.example").await.unwrap(), Some(replacement));
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let domain_dir = dir.path().join("shop.example");
        std::fs::create_dir_all(&domain_dir).unwrap();
        std::fs::write(domain_dir.join(SELECTORS_FILE), b"{not json").unwrap();

        let store = SelectorStore::new(dir.path());
        assert_eq!(store.load("shop.example").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_without_selector_are_skipped_individually() {
        let dir = tempfile::tempdir().unwrap();
        let domain_dir = dir.path().join("shop.example");
        std::fs::create_dir_all(&domain_dir).unwrap();
        std::fs::write(
            domain_dir.join(SELECTORS_FILE),
            br#"[
                {"type": "title", "selector": "h1#name"},
                {"type": "text", "value": "legacy entry"},
                {"type": "bogus", "selector": "div.x"},
                {"type": "price", "selector": "span.price.current", "value": "$5"}
            ]"#,
        )
        .unwrap();

        let store = SelectorStore::new(dir.path());
        assert_eq!(store.load("shop.example").await.unwrap(), Some(sample()));
    }

    #[test]
    fn domain_names_cannot_escape_the_root() {
        assert_eq!(domain_dir_name("shop.example"), "shop.example");
        assert_eq!(domain_dir_name("localhost:8080"), "localhost_8080");
        assert_eq!(domain_dir_name(".."), "_..");
        assert_eq!(domain_dir_name("a/b"), "a_b");
    }
}
