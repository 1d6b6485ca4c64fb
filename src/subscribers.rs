//! Subscriber snapshots.
//!
//! Subscriber management lives outside this crate. The run only needs a
//! read-only list of current subscribers, taken once at trigger time through
//! [`SubscriberStore::list_active`]. [`JsonFileStore`] reads that list from a
//! JSON file maintained by the subscription service.

use crate::models::Subscriber;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read subscriber file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse subscriber file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The external subscriber list.
pub trait SubscriberStore: Send + Sync {
    fn list_active(&self) -> impl Future<Output = Result<Vec<Subscriber>, StoreError>> + Send;
}

/// Reads subscribers from a JSON array of `{"email", "subscribed_on"}`
/// records.
///
/// Addresses are trimmed and lower-cased, and repeated addresses keep their
/// first record. A record without a timestamp is treated as subscribed now.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SubscriberRecord {
    email: String,
    #[serde(default, alias = "subscribed_at")]
    subscribed_on: Option<DateTime<Utc>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse(&self, raw: &str) -> Result<Vec<Subscriber>, StoreError> {
        let records = serde_json::from_str::<Vec<SubscriberRecord>>(raw).map_err(|source| {
            StoreError::Parse {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        let now = Utc::now();
        Ok(records
            .into_iter()
            .map(|r| Subscriber::new(r.email.trim().to_lowercase(), r.subscribed_on.unwrap_or(now)))
            .filter(|s| !s.email.is_empty())
            .unique_by(|s| s.email.clone())
            .collect())
    }
}

impl SubscriberStore for JsonFileStore {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    async fn list_active(&self) -> Result<Vec<Subscriber>, StoreError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| StoreError::Read {
                path: self.path.display().to_string(),
                source,
            })?;
        let subscribers = self.parse(&raw)?;
        info!(count = subscribers.len(), "Loaded subscriber snapshot");
        Ok(subscribers)
    }
}
