//! Append-only log of raw extraction results

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::{StoreError, StoreResult};
use crate::model::ExtractedElement;

/// One logged extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub url: String,
    pub content: Vec<ExtractedElement>,
    pub timestamp: DateTime<Utc>,
}

/// Destination for successful extractions
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, url: &str, content: &[ExtractedElement]) -> StoreResult<()>;
}

/// Writes one JSON object per line to a local file
pub struct JsonlResultSink {
    path: PathBuf,
    // Serializes appends so lines from concurrent requests never interleave
    write_lock: Mutex<()>,
}

impl JsonlResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonlResultSink {
    async fn record(&self, url: &str, content: &[ExtractedElement]) -> StoreResult<()> {
        let record = ResultRecord {
            url: url.to_string(),
            content: content.to_vec(),
            timestamp: Utc::now(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(&line)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.flush().await.map_err(|e| StoreError::io(&self.path, e))?;

        debug!("Logged {} elements for {} to {}", content.len(), url, self.path.display());
        Ok(())
    }
}

/// Stores results in the `scraped_data` table
#[cfg(feature = "postgres")]
pub struct PostgresResultSink {
    pool: sqlx::PgPool,
}

#[cfg(feature = "postgres")]
impl PostgresResultSink {
    /// Connect and make sure the table exists
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scraped_data (
                id SERIAL PRIMARY KEY,
                url TEXT NOT NULL,
                content JSONB NOT NULL,
                scraped_at TIMESTAMP DEFAULT NOW()
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("Connected raw-result sink to PostgreSQL");
        Ok(Self { pool })
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl ResultSink for PostgresResultSink {
    async fn record(&self, url: &str, content: &[ExtractedElement]) -> StoreResult<()> {
        sqlx::query("INSERT INTO scraped_data (url, content) VALUES ($1, $2)")
            .bind(url)
            .bind(sqlx::types::Json(content))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
