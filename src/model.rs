//! Extraction data model
//!
//! Wire names follow the JSON shapes the banner front-end already consumes:
//! elements are `{type, selector, value}` and selector sets are `[{type, selector}]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::errors::ValidationError;

/// Fixed set of categories an extracted element can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Title,
    Subtitle,
    Description,
    Price,
    Image,
    Video,
    Button,
    Link,
    Cta,
    Text,
    Fallback,
    Error,
}

impl Category {
    /// Categories offered by the in-page annotation menu, in menu order
    pub const MENU: [Category; 9] = [
        Category::Title,
        Category::Subtitle,
        Category::Description,
        Category::Price,
        Category::Image,
        Category::Video,
        Category::Button,
        Category::Link,
        Category::Cta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Title => "title",
            Category::Subtitle => "subtitle",
            Category::Description => "description",
            Category::Price => "price",
            Category::Image => "image",
            Category::Video => "video",
            Category::Button => "button",
            Category::Link => "link",
            Category::Cta => "cta",
            Category::Text => "text",
            Category::Fallback => "fallback",
            Category::Error => "error",
        }
    }

    /// Label shown on the annotation menu button
    pub fn menu_label(&self) -> &'static str {
        match self {
            Category::Title => "Title",
            Category::Subtitle => "Subtitle",
            Category::Description => "Description",
            Category::Price => "Price",
            Category::Image => "Image",
            Category::Video => "Video",
            Category::Button => "Button",
            Category::Link => "Link",
            Category::Cta => "CTA",
            Category::Text => "Text",
            Category::Fallback => "Fallback",
            Category::Error => "Error",
        }
    }

    /// Whether an entry of this category may legitimately carry an empty value
    pub fn allows_empty_value(&self) -> bool {
        matches!(self, Category::Error | Category::Fallback)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reproducible element locator: tag plus id or class list (`div#price`, `img.hero`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured record for an `<img>` element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub src: String,
    pub alt: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(rename = "class", default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Structured record for buttons and links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveRecord {
    pub text: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(rename = "onclick", default, skip_serializing_if = "Option::is_none")]
    pub onclick_attr: Option<String>,
    #[serde(rename = "class", default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Non-media element painted with a CSS background image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRecord {
    #[serde(rename = "backgroundImage")]
    pub background_image: String,
    pub text: String,
}

/// Value captured for one element
///
/// Untagged on the wire; variant order matters for deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedValue {
    Text(String),
    Image(ImageRecord),
    Styled(StyledRecord),
    Interactive(InteractiveRecord),
}

impl ExtractedValue {
    pub fn is_empty(&self) -> bool {
        match self {
            ExtractedValue::Text(text) => text.trim().is_empty(),
            ExtractedValue::Image(image) => image.src.is_empty(),
            ExtractedValue::Styled(styled) => styled.background_image.is_empty(),
            ExtractedValue::Interactive(record) => record.text.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ExtractedValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for ExtractedValue {
    fn from(text: &str) -> Self {
        ExtractedValue::Text(text.to_string())
    }
}

impl From<String> for ExtractedValue {
    fn from(text: String) -> Self {
        ExtractedValue::Text(text)
    }
}

/// One captured fact about a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedElement {
    #[serde(rename = "type")]
    pub category: Category,
    #[serde(rename = "selector", default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    pub value: ExtractedValue,
}

impl ExtractedElement {
    pub fn new(category: Category, locator: Option<Locator>, value: impl Into<ExtractedValue>) -> Self {
        Self {
            category,
            locator,
            value: value.into(),
        }
    }

    /// Locator-less entry that is not meant to be replayed
    pub fn unanchored(category: Category, value: impl Into<ExtractedValue>) -> Self {
        Self::new(category, None, value)
    }

    /// True when the entry honours the non-empty value invariant
    pub fn is_well_formed(&self) -> bool {
        self.category.allows_empty_value() || !self.value.is_empty()
    }
}

/// Ordered extraction output
pub type ExtractionResult = Vec<ExtractedElement>;

/// One persisted `{type, selector}` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorEntry {
    #[serde(rename = "type")]
    pub category: Category,
    #[serde(rename = "selector")]
    pub locator: Locator,
}

/// Persisted annotation profile for one normalized domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorSet(Vec<SelectorEntry>);

impl SelectorSet {
    pub fn new(entries: Vec<SelectorEntry>) -> Self {
        Self(entries)
    }

    /// Project extracted elements onto `{type, selector}`, dropping locator-less entries
    pub fn from_elements<'a>(elements: impl IntoIterator<Item = &'a ExtractedElement>) -> Self {
        Self(
            elements
                .into_iter()
                .filter_map(|element| {
                    element.locator.clone().map(|locator| SelectorEntry {
                        category: element.category,
                        locator,
                    })
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[SelectorEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Extraction mode; the wire name for interactive is `manual`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "manual")]
    Interactive,
    #[serde(rename = "auto")]
    Auto,
}

impl FromStr for Mode {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "manual" => Ok(Mode::Interactive),
            "auto" => Ok(Mode::Auto),
            other => Err(ValidationError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Interactive => f.write_str("manual"),
            Mode::Auto => f.write_str("auto"),
        }
    }
}

/// Validated extraction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub target_url: url::Url,
    pub mode: Mode,
}

impl ExtractionRequest {
    /// Validate raw url/mode strings
    pub fn parse(url: Option<&str>, mode: Option<&str>) -> Result<Self, ValidationError> {
        let target_url = validate_target_url(url)?;
        let mode = mode
            .ok_or_else(|| ValidationError::InvalidMode(String::new()))?
            .parse()?;
        Ok(Self { target_url, mode })
    }

    /// Normalized domain key used by the selector store
    pub fn domain(&self) -> String {
        normalize_domain(&self.target_url)
    }
}

/// Accept only absolute http(s) URLs with a host
pub fn validate_target_url(raw: Option<&str>) -> Result<url::Url, ValidationError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if !raw.starts_with("http") {
        return Err(ValidationError::InvalidUrl(raw.to_string()));
    }
    let parsed = url::Url::parse(raw).map_err(|_| ValidationError::InvalidUrl(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ValidationError::InvalidUrl(raw.to_string()));
    }
    Ok(parsed)
}

/// Hostname with a leading `www.` stripped
pub fn normalize_domain(url: &url::Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => host,
    }
}
