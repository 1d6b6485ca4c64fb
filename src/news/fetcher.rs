//! Per-topic article fetching with exponential backoff.
//!
//! # Retry Strategy
//!
//! - At most 3 attempts per topic
//! - Only transient [`SearchError`]s are retried
//! - Delay doubles from the base delay, capped, plus random jitter
//! - A rate limit's `Retry-After` hint raises the delay (still capped)
//! - Each attempt has its own timeout; a slow attempt is retried like any
//!   other transient error
//!
//! A topic whose search keeps failing yields no articles; the failure is
//! returned alongside so the run summary can report it.

use super::{NewsSearchClient, RawArticle, SearchError, SearchRequest};
use crate::models::{Article, Topic};
use crate::utils::html_to_text;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rand::{Rng, rng};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

const NO_TITLE: &str = "No Title";

/// Per-attempt search timeout; three attempts plus backoff fit in the
/// default 30 s topic budget.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("search failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: usize,
        #[source]
        source: SearchError,
    },
    #[error("search rejected: {0}")]
    Rejected(#[source] SearchError),
    #[error("fetch timed out after {0:?}")]
    TimedOut(Duration),
}

/// Backoff settings for one topic's search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: usize, hint: Option<Duration>) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        let mut delay = self.base_delay.saturating_mul(1 << shift);
        if let Some(hint) = hint {
            delay = delay.max(hint);
        }
        let delay = delay.min(self.max_delay);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            delay
        } else {
            delay + Duration::from_millis(rng().random_range(0..=jitter_ms))
        }
    }
}

/// Result of fetching one topic.
#[derive(Debug)]
pub struct TopicFetch {
    pub topic: Topic,
    pub articles: Vec<Article>,
    pub failure: Option<FetchError>,
}

impl TopicFetch {
    pub fn failed(topic: Topic, failure: FetchError) -> Self {
        Self {
            topic,
            articles: Vec::new(),
            failure: Some(failure),
        }
    }
}

/// Fetches a bounded number of articles per topic from a [`NewsSearchClient`].
#[derive(Debug)]
pub struct ArticleFetcher<C> {
    client: C,
    max_articles: usize,
    days_back: u64,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl<C> ArticleFetcher<C>
where
    C: NewsSearchClient,
{
    pub fn new(client: C, max_articles: usize, days_back: u64) -> Self {
        Self {
            client,
            max_articles,
            days_back,
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound each search attempt; a slow attempt counts as a transient
    /// [`SearchError::Timeout`] and is retried.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[cfg(test)]
    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    /// The search request for `topic` on a run dated `run_date`.
    pub fn request(&self, topic: &Topic, run_date: NaiveDate) -> SearchRequest {
        let (start_published, end_published) = published_window(run_date, self.days_back);
        SearchRequest {
            query: topic.query(),
            region: super::REGION.to_string(),
            num_results: self.max_articles,
            start_published,
            end_published,
        }
    }

    /// Fetch up to `max_articles` articles for `topic`. Never fails; search
    /// errors are reported in [`TopicFetch::failure`].
    #[instrument(level = "info", skip_all, fields(topic = %topic.name))]
    pub async fn fetch(&self, topic: &Topic, run_date: NaiveDate) -> TopicFetch {
        let request = self.request(topic, run_date);
        match self.search_with_backoff(&request).await {
            Ok(records) => {
                let articles = records
                    .into_iter()
                    .filter_map(|raw| to_article(raw, topic))
                    .take(self.max_articles)
                    .collect::<Vec<_>>();
                info!(count = articles.len(), "Fetched topic articles");
                TopicFetch {
                    topic: topic.clone(),
                    articles,
                    failure: None,
                }
            }
            Err(e) => {
                error!(error = %e, "Topic fetch failed; continuing without it");
                TopicFetch::failed(topic.clone(), e)
            }
        }
    }

    async fn search_with_backoff(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<RawArticle>, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            let outcome = timeout(self.request_timeout, self.client.search(request))
                .await
                .unwrap_or(Err(SearchError::Timeout));
            match outcome {
                Ok(records) => return Ok(records),
                Err(e) => {
                    attempt += 1;
                    if !e.is_transient() {
                        warn!(attempt, error = %e, "search() failed permanently");
                        return Err(FetchError::Rejected(e));
                    }
                    if attempt >= self.retry.max_attempts {
                        error!(
                            attempt,
                            max = self.retry.max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u128,
                            error = %e,
                            "search() exhausted retries"
                        );
                        return Err(FetchError::Exhausted {
                            attempts: attempt,
                            source: e,
                        });
                    }

                    let hint = match &e {
                        SearchError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    let delay = self.retry.delay(attempt, hint);
                    warn!(
                        attempt,
                        max = self.retry.max_attempts,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u128,
                        ?delay,
                        error = %e,
                        "search() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// The UTC window covering the whole calendar day `days_back` days before
/// `run_date`.
pub fn published_window(run_date: NaiveDate, days_back: u64) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = run_date
        .checked_sub_days(Days::new(days_back))
        .unwrap_or(run_date);
    let start = day.and_time(NaiveTime::default()).and_utc();
    let end = day
        .and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .unwrap_or(start);
    (start, end)
}

fn to_article(raw: RawArticle, topic: &Topic) -> Option<Article> {
    let url = raw.url.map(|u| u.trim().to_string()).unwrap_or_default();
    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());
    if url.is_empty() && title == NO_TITLE {
        debug!("Dropping search record with neither title nor URL");
        return None;
    }
    let body = raw.text.as_deref().map(html_to_text).unwrap_or_default();
    let published_at = raw
        .published_date
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.with_timezone(&Utc));
    Some(Article::new(title, body, url, published_at, topic.clone()))
}
