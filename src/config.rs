//! Run configuration.
//!
//! [`RunConfig`] is built once at startup from an optional YAML file plus
//! command-line / environment overrides, validated, and then shared
//! read-only by every component. Any problem here is fatal: the scheduler
//! never starts with an invalid configuration.
//!
//! # File format
//!
//! ```yaml
//! schedule_time: "08:00"
//! summary_sentence_count: 3
//! max_articles_per_topic: 5
//! topics:
//!   - name: Economy
//!     query_terms: [economy, markets]
//!   - name: Environment
//! ```

use crate::models::Topic;
use chrono::NaiveTime;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SUMMARY_SENTENCES: usize = 3;
pub const DEFAULT_MAX_ARTICLES_PER_TOPIC: usize = 5;
pub const DEFAULT_MAX_TOPICS: usize = 10;
pub const DEFAULT_DAYS_BACK: u64 = 1;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 4;
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("schedule time is not set (use --schedule-time, SCHEDULE_TIME or the config file)")]
    MissingScheduleTime,
    #[error("invalid schedule time {0:?}; expected HH:MM or HH:MM:SS")]
    InvalidScheduleTime(String),
    #[error("no topics configured")]
    NoTopics,
    #[error("topic names must not be empty")]
    EmptyTopicName,
    #[error("topic {0:?} is configured more than once")]
    DuplicateTopic(String),
    #[error("{count} topics configured but at most {max} are allowed")]
    TooManyTopics { count: usize, max: usize },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("request timeout {request:?} must be below the fetch timeout {fetch:?}")]
    RequestTimeoutTooLong { request: Duration, fetch: Duration },
    #[error("{0} is not set")]
    MissingSecret(&'static str),
}

/// Values read from the YAML config file. Everything is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub topics: Option<Vec<Topic>>,
    pub schedule_time: Option<String>,
    pub summary_sentence_count: Option<usize>,
    pub max_articles_per_topic: Option<usize>,
    pub max_topics_per_subscription: Option<usize>,
    pub days_back: Option<u64>,
    pub fetch_concurrency: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub dispatch_concurrency: Option<usize>,
    pub send_timeout_secs: Option<u64>,
    pub skip_fetch_without_subscribers: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Command-line / environment values that take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Topic names; each becomes a topic searched by its own name.
    pub topics: Vec<String>,
    pub schedule_time: Option<String>,
}

/// Immutable configuration for every run of this process.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub topics: Vec<Topic>,
    /// Local wall-clock time of the daily run.
    pub schedule_time: NaiveTime,
    /// Maximum sentences per article summary.
    pub summary_sentence_count: usize,
    pub max_articles_per_topic: usize,
    pub max_topics_per_subscription: usize,
    /// Which past day's news to search for (1 = yesterday).
    pub days_back: u64,
    pub fetch_concurrency: usize,
    /// Budget for one topic, retries included.
    pub fetch_timeout: Duration,
    /// Budget for one search attempt.
    pub request_timeout: Duration,
    pub dispatch_concurrency: usize,
    pub send_timeout: Duration,
    /// Skip news searches when nobody would receive the digest.
    pub skip_fetch_without_subscribers: bool,
}

impl RunConfig {
    /// Load the optional config file and apply overrides.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => FileConfig::load(p)?,
            None => FileConfig::default(),
        };
        Self::build(file, overrides)
    }

    pub fn build(file: FileConfig, overrides: &Overrides) -> Result<Self, ConfigError> {
        let override_topics = overrides
            .topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| Topic::new(t, vec![t.to_string()]))
            .collect::<Vec<_>>();
        let topics = if override_topics.is_empty() {
            file.topics.unwrap_or_default()
        } else {
            override_topics
        };

        let schedule_time = overrides
            .schedule_time
            .as_deref()
            .or(file.schedule_time.as_deref())
            .ok_or(ConfigError::MissingScheduleTime)
            .and_then(parse_schedule_time)?;

        let config = Self {
            topics,
            schedule_time,
            summary_sentence_count: file
                .summary_sentence_count
                .unwrap_or(DEFAULT_SUMMARY_SENTENCES),
            max_articles_per_topic: file
                .max_articles_per_topic
                .unwrap_or(DEFAULT_MAX_ARTICLES_PER_TOPIC),
            max_topics_per_subscription: file
                .max_topics_per_subscription
                .unwrap_or(DEFAULT_MAX_TOPICS),
            days_back: file.days_back.unwrap_or(DEFAULT_DAYS_BACK),
            fetch_concurrency: file.fetch_concurrency.unwrap_or(DEFAULT_FETCH_CONCURRENCY),
            fetch_timeout: Duration::from_secs(
                file.fetch_timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
            ),
            request_timeout: Duration::from_secs(
                file.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            dispatch_concurrency: file
                .dispatch_concurrency
                .unwrap_or(DEFAULT_DISPATCH_CONCURRENCY),
            send_timeout: Duration::from_secs(
                file.send_timeout_secs.unwrap_or(DEFAULT_SEND_TIMEOUT_SECS),
            ),
            skip_fetch_without_subscribers: file.skip_fetch_without_subscribers.unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topics.is_empty() {
            return Err(ConfigError::NoTopics);
        }
        let mut seen = HashSet::new();
        for topic in &self.topics {
            let name = topic.name.trim();
            if name.is_empty() {
                return Err(ConfigError::EmptyTopicName);
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::DuplicateTopic(name.to_string()));
            }
        }
        for (value, name) in [
            (self.summary_sentence_count, "summary_sentence_count"),
            (self.max_articles_per_topic, "max_articles_per_topic"),
            (self.max_topics_per_subscription, "max_topics_per_subscription"),
            (self.fetch_concurrency, "fetch_concurrency"),
            (self.dispatch_concurrency, "dispatch_concurrency"),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::Zero("fetch_timeout_secs"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Zero("request_timeout_secs"));
        }
        if self.request_timeout >= self.fetch_timeout {
            return Err(ConfigError::RequestTimeoutTooLong {
                request: self.request_timeout,
                fetch: self.fetch_timeout,
            });
        }
        if self.send_timeout.is_zero() {
            return Err(ConfigError::Zero("send_timeout_secs"));
        }
        if self.topics.len() > self.max_topics_per_subscription {
            return Err(ConfigError::TooManyTopics {
                count: self.topics.len(),
                max: self.max_topics_per_subscription,
            });
        }
        Ok(())
    }

    pub fn topic_names(&self) -> Vec<&str> {
        self.topics.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Parse a daily trigger time given as `HH:MM` or `HH:MM:SS`.
pub fn parse_schedule_time(raw: &str) -> Result<NaiveTime, ConfigError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| ConfigError::InvalidScheduleTime(raw.to_string()))
}

/// Outbound mail account settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; the account username for Gmail.
    pub from: String,
}
