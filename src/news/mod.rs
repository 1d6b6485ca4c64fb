//! News search: the provider contract and the per-topic article fetcher.
//!
//! # Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`fetcher`] | Builds topic queries, retries transient failures, converts records to [`Article`](crate::models::Article)s |
//! | [`exa`] | [`NewsSearchClient`] backed by the Exa search API |
//!
//! The fetcher only sees [`SearchError`], whose variants tell it whether a
//! failure is worth retrying.

pub mod exa;
pub mod fetcher;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Region qualifier sent with every query.
pub const REGION: &str = "IN";

/// One search issued for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub region: String,
    pub num_results: usize,
    pub start_published: DateTime<Utc>,
    pub end_published: DateTime<Utc>,
}

/// An article record as returned by the provider, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Body text, possibly containing HTML markup.
    #[serde(default)]
    pub text: Option<String>,
    /// RFC 3339 publication timestamp.
    #[serde(default)]
    pub published_date: Option<String>,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request timed out")]
    Timeout,
    #[error("search provider rate limit hit")]
    RateLimited { retry_after: Option<Duration> },
    #[error("search provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("search transport error: {0}")]
    Transport(String),
    #[error("malformed search response: {0}")]
    Malformed(String),
}

impl SearchError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SearchError::Timeout | SearchError::RateLimited { .. } | SearchError::Transport(_) => {
                true
            }
            SearchError::Http { status, .. } => *status >= 500,
            SearchError::Malformed(_) => false,
        }
    }
}

/// The external news search provider.
pub trait NewsSearchClient: Send + Sync {
    fn search(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = Result<Vec<RawArticle>, SearchError>> + Send;
}
