//! Persistence: per-domain selector sets and the raw extraction log

mod result_sink;
mod selector_store;

#[cfg(feature = "postgres")]
pub use result_sink::PostgresResultSink;
pub use result_sink::{JsonlResultSink, ResultRecord, ResultSink};
pub use selector_store::SelectorStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
