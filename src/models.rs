//! Data models for topics, articles, summaries and digests.
//!
//! This module defines the value types that flow through one digest run:
//! - [`Topic`]: A configured news topic and its search terms
//! - [`Article`]: A fetched article, identified by its [`ArticleId`]
//! - [`Summary`]: The extractive summary of one article
//! - [`TopicSection`] and [`Digest`]: The assembled document for one day
//! - [`Subscriber`] and [`DispatchResult`]: Recipients and per-recipient outcomes
//! - [`RunSummary`]: The observability record emitted after every run
//!
//! Everything here is created once per run and never mutated after
//! construction.

use crate::dedupe::canonical_id;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured news topic.
///
/// Topics are identified by `name`; `query_terms` are combined into the
/// search query sent to the news provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Topic {
    /// Display name and identity of the topic (e.g. "Economy").
    pub name: String,
    /// Ordered search terms; the topic name is used when this is empty.
    #[serde(default)]
    pub query_terms: Vec<String>,
}

impl Topic {
    pub fn new(name: impl Into<String>, query_terms: Vec<String>) -> Self {
        Self {
            name: name.into(),
            query_terms,
        }
    }

    /// The search query for this topic: the terms joined by spaces, or the
    /// topic name when no terms are configured.
    pub fn query(&self) -> String {
        let terms = self
            .query_terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>();
        if terms.is_empty() {
            self.name.trim().to_string()
        } else {
            terms.join(" ")
        }
    }
}

/// Canonical identity of an article (normalized title + normalized URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    pub(crate) fn from_canonical(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An article fetched for a topic during one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// Canonical identity, derived from `title` and `source_url`.
    pub id: ArticleId,
    pub title: String,
    /// Plain-text body (markup already stripped).
    pub body_text: String,
    pub source_url: String,
    pub published_at: Option<DateTime<Utc>>,
    /// The topic the article was fetched under.
    pub topic: Topic,
}

impl Article {
    /// Build an article, deriving its canonical identity.
    pub fn new(
        title: impl Into<String>,
        body_text: impl Into<String>,
        source_url: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
        topic: Topic,
    ) -> Self {
        let title = title.into();
        let source_url = source_url.into();
        Self {
            id: canonical_id(&title, &source_url),
            title,
            body_text: body_text.into(),
            source_url,
            published_at,
            topic,
        }
    }
}

/// How a [`Summary`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryMethod {
    /// Centrality ranking over the sentence similarity graph.
    ExtractiveGraph,
    /// Term-frequency sentence scoring.
    ExtractiveStatistical,
    /// The leading sentences of the body, verbatim.
    TruncationFallback,
}

impl fmt::Display for SummaryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SummaryMethod::ExtractiveGraph => "extractive-graph",
            SummaryMethod::ExtractiveStatistical => "extractive-statistical",
            SummaryMethod::TruncationFallback => "truncation-fallback",
        };
        f.write_str(s)
    }
}

/// The extractive summary of one article.
///
/// `sentences` are in source order and never longer than the run's
/// configured sentence count.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Summary {
    pub article_id: ArticleId,
    pub title: String,
    pub source_url: String,
    pub sentences: Vec<String>,
    pub method: SummaryMethod,
}

impl Summary {
    /// The summary sentences joined into one paragraph.
    pub fn text(&self) -> String {
        self.sentences.join(" ")
    }
}

/// All summaries for one configured topic. May be empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TopicSection {
    pub topic: Topic,
    pub summaries: Vec<Summary>,
}

impl TopicSection {
    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

/// The digest for one run: one section per configured topic, in configured
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Digest {
    pub date: NaiveDate,
    pub sections: Vec<TopicSection>,
}

impl Digest {
    /// Total number of summarized articles across all sections.
    pub fn article_count(&self) -> usize {
        self.sections.iter().map(|s| s.summaries.len()).sum()
    }

    /// Iterate every summary, section by section.
    #[cfg(test)]
    pub fn summaries(&self) -> impl Iterator<Item = &Summary> {
        self.sections.iter().flat_map(|s| s.summaries.iter())
    }
}

/// A digest recipient, as listed by the subscriber store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Subscriber {
    pub email: String,
    pub subscribed_at: DateTime<Utc>,
}

impl Subscriber {
    pub fn new(email: impl Into<String>, subscribed_at: DateTime<Utc>) -> Self {
        Self {
            email: email.into(),
            subscribed_at,
        }
    }
}

/// Outcome of sending the digest to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DispatchStatus {
    Sent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub subscriber: Subscriber,
    pub status: DispatchStatus,
}

impl DispatchResult {
    pub fn is_sent(&self) -> bool {
        matches!(self.status, DispatchStatus::Sent)
    }
}

/// Per-topic fetch counters for the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicFetchCount {
    pub topic: String,
    /// Articles returned by the fetcher.
    pub fetched: usize,
    /// Articles left for this topic after global deduplication.
    pub kept: usize,
}

/// A topic whose fetch failed during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicFailure {
    pub topic: String,
    pub reason: String,
}

/// What happened during one run, emitted for logging and archiving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub date: NaiveDate,
    pub topic_fetches: Vec<TopicFetchCount>,
    pub topic_failures: Vec<TopicFailure>,
    pub dispatch_success_count: usize,
    pub dispatch_failure_count: usize,
    pub elapsed_ms: u128,
}
