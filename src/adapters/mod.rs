//! Adapter interfaces for external systems.
//!
//! Two remote collaborators feed the pipeline:
//! - a `Classifier` (an LLM) that turns file names into metadata and
//!   proposes groupings for a batch of titles
//! - an `Enricher` (a metadata database) that corroborates titles and years

pub mod openai;
pub mod retry;
pub mod tmdb;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Category, Classification, Grouping};

// Re-export the concrete adapters
pub use openai::OpenAiClassifier;
pub use retry::RetryPolicy;
pub use tmdb::TmdbEnricher;

/// Errors from an adapter call. All of them are recoverable per file or batch.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unparseable response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl AdapterError {
    /// Worth retrying: rate limits, server errors, connection trouble
    pub fn is_transient(&self) -> bool {
        match self {
            AdapterError::Request(e) => e.is_timeout() || e.is_connect(),
            AdapterError::Status { status, .. } => *status == 429 || *status >= 500,
            AdapterError::Timeout(_) => true,
            AdapterError::Parse(_) | AdapterError::Malformed(_) => false,
        }
    }
}

/// Which kind of release to look up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Tv,
}

impl From<&Category> for MediaKind {
    fn from(category: &Category) -> Self {
        if category.is_episodic() {
            MediaKind::Tv
        } else {
            MediaKind::Movie
        }
    }
}

/// Enrichment lookup input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentQuery {
    pub title: String,
    pub year: Option<String>,
    pub kind: MediaKind,
}

/// Best match returned by an enricher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentMatch {
    /// Canonical title
    pub title: String,

    /// `YYYY-MM-DD` or similar
    pub release_date: Option<String>,
}

impl EnrichmentMatch {
    /// First four characters of the release date, if it has them
    pub fn year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .filter(|y| y.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Turns file names into structured metadata
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Classify a single file name
    async fn classify(&self, file_name: &str) -> Result<Classification, AdapterError>;

    /// Propose groupings for a batch of titles within one category
    async fn group(
        &self,
        category: &Category,
        titles: &[String],
    ) -> Result<Vec<Grouping>, AdapterError>;
}

/// Looks up corroborating metadata for a title
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// `Ok(None)` when nothing matched
    async fn lookup(
        &self,
        query: &EnrichmentQuery,
    ) -> Result<Option<EnrichmentMatch>, AdapterError>;
}

/// Bound an adapter call by a deadline; running out counts as adapter failure
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| AdapterError::Timeout(deadline))?
}
