//! Element snapshots and the type-dispatched value rules
//!
//! The in-page scripts only read raw attributes off a DOM node and ship them
//! back as an [`ElementSnapshot`]. Everything that decides what gets recorded
//! (locator, image source fallback, text fallbacks) happens here.

use serde::Deserialize;

use crate::locator;
use crate::model::{ExtractedValue, ImageRecord, InteractiveRecord, Locator, StyledRecord};
use crate::utils::constants::{NO_ALT_TEXT, NO_CONTENT_AVAILABLE, NO_TEXT, NO_TEXT_AVAILABLE};

/// Raw facts read from one DOM element
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementSnapshot {
    pub tag: String,
    pub id: Option<String>,
    pub class_list: Vec<String>,
    pub class_name: Option<String>,
    pub src: Option<String>,
    pub data_src: Option<String>,
    pub alt: Option<String>,
    pub role: Option<String>,
    pub inner_text: Option<String>,
    pub text_content: Option<String>,
    pub title: Option<String>,
    pub href: Option<String>,
    pub formaction: Option<String>,
    pub ancestor_href: Option<String>,
    pub onclick: Option<String>,
    pub background_image: Option<String>,
}

/// Closed classification of elements by how their value is extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Image,
    Button,
    Link,
    Other,
}

impl ElementKind {
    pub fn of(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "img" => ElementKind::Image,
            "button" => ElementKind::Button,
            "a" => ElementKind::Link,
            _ => ElementKind::Other,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn owned(value: &Option<String>) -> Option<String> {
    non_empty(value).map(str::to_string)
}

/// Strip the `url("...")` wrapper from a computed background-image value
fn strip_css_url(raw: &str) -> String {
    raw.replace("url(", "").replace([')', '"'], "").trim().to_string()
}

impl ElementSnapshot {
    pub fn kind(&self) -> ElementKind {
        ElementKind::of(&self.tag)
    }

    pub fn locator(&self) -> Locator {
        locator::derive(&self.tag, self.id.as_deref(), &self.class_list)
    }

    /// `src`, falling back to the lazy-load `data-src` attribute
    pub fn image_source(&self) -> Option<&str> {
        non_empty(&self.src).or_else(|| non_empty(&self.data_src))
    }

    fn image_record(&self) -> Option<ImageRecord> {
        let src = self.image_source()?.to_string();
        Some(ImageRecord {
            src,
            alt: owned(&self.alt).unwrap_or_else(|| NO_ALT_TEXT.to_string()),
            role: owned(&self.role),
            class_name: owned(&self.class_name),
            id: owned(&self.id),
        })
    }

    fn visible_text_or(&self, fallback: &str) -> String {
        non_empty(&self.inner_text).unwrap_or(fallback).to_string()
    }

    fn fallback_text(&self) -> String {
        non_empty(&self.inner_text)
            .or_else(|| non_empty(&self.title))
            .or_else(|| non_empty(&self.alt))
            .unwrap_or(NO_TEXT_AVAILABLE)
            .to_string()
    }

    fn background_image(&self) -> Option<String> {
        non_empty(&self.background_image)
            .filter(|bg| *bg != "none")
            .map(strip_css_url)
            .filter(|bg| !bg.is_empty())
    }

    /// Value for an element a user just annotated; `None` rejects the selection
    pub fn annotation_value(&self) -> Option<ExtractedValue> {
        match self.kind() {
            ElementKind::Image => self.image_record().map(ExtractedValue::Image),
            ElementKind::Button => Some(ExtractedValue::Interactive(InteractiveRecord {
                text: self.visible_text_or(NO_TEXT),
                href: owned(&self.formaction).or_else(|| owned(&self.ancestor_href)),
                onclick_attr: owned(&self.onclick),
                class_name: owned(&self.class_name),
                id: owned(&self.id),
            })),
            ElementKind::Link => Some(ExtractedValue::Interactive(InteractiveRecord {
                text: self.visible_text_or(NO_TEXT),
                href: owned(&self.href),
                onclick_attr: None,
                class_name: owned(&self.class_name),
                id: owned(&self.id),
            })),
            ElementKind::Other => Some(match self.background_image() {
                Some(background_image) => ExtractedValue::Styled(StyledRecord {
                    background_image,
                    text: self.fallback_text(),
                }),
                None => ExtractedValue::Text(self.fallback_text()),
            }),
        }
    }

    /// Value for a stored locator re-resolved on a later visit
    ///
    /// Image-category locators yield the image record (or nothing without a
    /// source); everything else yields trimmed `textContent`.
    pub fn replay_value(&self, as_image: bool) -> Option<ExtractedValue> {
        if as_image {
            return self.image_record().map(ExtractedValue::Image);
        }
        Some(ExtractedValue::Text(
            non_empty(&self.text_content)
                .unwrap_or(NO_CONTENT_AVAILABLE)
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tag: &str) -> ElementSnapshot {
        ElementSnapshot {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn image_without_any_source_is_rejected() {
        let img = snapshot("IMG");
        assert_eq!(img.annotation_value(), None);
        assert_eq!(img.replay_value(true), None);
    }

    #[test]
    fn image_falls_back_to_data_src() {
        let img = ElementSnapshot {
            data_src: Some("lazy.jpg".into()),
            class_name: Some("hero".into()),
            ..snapshot("img")
        };
        let Some(ExtractedValue::Image(record)) = img.annotation_value() else {
            panic!("expected image record");
        };
        assert_eq!(record.src, "lazy.jpg");
        assert_eq!(record.alt, NO_ALT_TEXT);
        assert_eq!(record.class_name.as_deref(), Some("hero"));
        assert_eq!(record.id, None);
    }

    #[test]
    fn button_href_prefers_formaction_over_ancestor_link() {
        let button = ElementSnapshot {
            inner_text: Some("  Buy now ".into()),
            formaction: Some("/cart/add".into()),
            ancestor_href: Some("https://shop.example/checkout".into()),
            onclick: Some("track()".into()),
            ..snapshot("button")
        };
        let Some(ExtractedValue::Interactive(record)) = button.annotation_value() else {
            panic!("expected interactive record");
        };
        assert_eq!(record.text, "Buy now");
        assert_eq!(record.href.as_deref(), Some("/cart/add"));
        assert_eq!(record.onclick_attr.as_deref(), Some("track()"));

        let bare = ElementSnapshot {
            ancestor_href: Some("https://shop.example/checkout".into()),
            ..snapshot("button")
        };
        let Some(ExtractedValue::Interactive(record)) = bare.annotation_value() else {
            panic!("expected interactive record");
        };
        assert_eq!(record.text, NO_TEXT);
        assert_eq!(record.href.as_deref(), Some("https://shop.example/checkout"));
    }

    #[test]
    fn link_keeps_trimmed_href() {
        let link = ElementSnapshot {
            inner_text: Some("Details".into()),
            href: Some(" https://shop.example/item/1 ".into()),
            onclick: Some("ignored()".into()),
            ..snapshot("a")
        };
        let Some(ExtractedValue::Interactive(record)) = link.annotation_value() else {
            panic!("expected interactive record");
        };
        assert_eq!(record.href.as_deref(), Some("https://shop.example/item/1"));
        assert_eq!(record.onclick_attr, None);
    }

    #[test]
    fn other_elements_prefer_background_image_then_text_fallbacks() {
        let banner = ElementSnapshot {
            background_image: Some("url(\"https://cdn.example/bg.png\")".into()),
            title: Some("Summer sale".into()),
            ..snapshot("div")
        };
        assert_eq!(
            banner.annotation_value(),
            Some(ExtractedValue::Styled(StyledRecord {
                background_image: "https://cdn.example/bg.png".into(),
                text: "Summer sale".into(),
            }))
        );

        let plain = ElementSnapshot {
            background_image: Some("none".into()),
            inner_text: Some("\n $19.99 \n".into()),
            ..snapshot("span")
        };
        assert_eq!(plain.annotation_value(), Some(ExtractedValue::Text("$19.99".into())));

        let empty = snapshot("span");
        assert_eq!(
            empty.annotation_value(),
            Some(ExtractedValue::Text(NO_TEXT_AVAILABLE.into()))
        );
    }

    #[test]
    fn replay_text_uses_text_content_or_sentinel() {
        let price = ElementSnapshot {
            text_content: Some("  $10 ".into()),
            ..snapshot("span")
        };
        assert_eq!(price.replay_value(false), Some(ExtractedValue::Text("$10".into())));
        assert_eq!(
            snapshot("span").replay_value(false),
            Some(ExtractedValue::Text(NO_CONTENT_AVAILABLE.into()))
        );
    }

    #[test]
    fn snapshot_deserializes_from_camel_case() {
        let snap: ElementSnapshot = serde_json::from_value(serde_json::json!({
            "tag": "img",
            "id": null,
            "classList": ["hero", "wide"],
            "dataSrc": "x.jpg"
        }))
        .unwrap();
        assert_eq!(snap.locator().as_str(), "img.hero.wide");
        assert_eq!(snap.image_source(), Some("x.jpg"));
    }
}
