//! Locator derivation
//!
//! Turns the identifying attributes of a DOM element into a short CSS-like
//! locator that can be handed to `document.querySelector` on a later visit.
//!
//! Precedence is fixed: `tag#id` when an id exists, otherwise
//! `tag.class1.class2` with every class token in DOM order, otherwise the bare
//! tag. Uniqueness is never checked; a locator may match zero or several
//! elements on replay and replay takes the first match.

use crate::model::Locator;

/// Derive the locator for an element from its tag, id and class tokens
pub fn derive<S: AsRef<str>>(tag: &str, id: Option<&str>, classes: &[S]) -> Locator {
    let mut locator = tag.trim().to_ascii_lowercase();

    if let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) {
        locator.push('#');
        locator.push_str(id);
        return Locator::new(locator);
    }

    for class in classes.iter().map(AsRef::as_ref).map(str::trim) {
        if class.is_empty() {
            continue;
        }
        locator.push('.');
        locator.push_str(class);
    }

    Locator::new(locator)
}
