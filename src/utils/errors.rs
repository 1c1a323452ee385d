use thiserror::Error;

use crate::browser::BrowserError;

/// Caller input rejected before any browser work
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid URL provided")]
    InvalidUrl(String),

    #[error("Invalid mode. Use 'auto' or 'manual'.")]
    InvalidMode(String),

    #[error("Invalid data provided: {0}")]
    InvalidSelections(String),
}

/// Request-level extraction failures
///
/// Only these reach callers; readiness timeouts, unresolvable locators and
/// persistence failures are logged and degrade to partial results.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Browser unavailable: {0}")]
    Launch(String),

    #[error("Failed to load page after {attempts} attempts: {last_error}")]
    PageLoad { attempts: u32, last_error: String },

    #[error("Annotation session ended before the user finished selecting")]
    AnnotationAborted,

    #[error("Failed to extract content")]
    EmptyResult,

    #[error("Page evaluation failed: {0}")]
    Evaluation(String),
}

impl From<BrowserError> for ScrapeError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::EvaluationFailed(msg) => ScrapeError::Evaluation(msg),
            BrowserError::ChannelClosed => ScrapeError::AnnotationAborted,
            other => ScrapeError::Launch(other.to_string()),
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_match_http_contract() {
        assert_eq!(
            ValidationError::InvalidUrl("x".into()).to_string(),
            "Invalid URL provided"
        );
        assert_eq!(
            ValidationError::InvalidMode("x".into()).to_string(),
            "Invalid mode. Use 'auto' or 'manual'."
        );
    }

    #[test]
    fn closed_channel_maps_to_aborted_annotation() {
        let err: ScrapeError = BrowserError::ChannelClosed.into();
        assert!(matches!(err, ScrapeError::AnnotationAborted));
    }
}
