//! One end-to-end digest run.
//!
//! A run takes a subscriber snapshot, fetches every configured topic with
//! bounded concurrency, removes duplicates across all topics, summarizes the
//! survivors, assembles the digest and dispatches it. Nothing in a run is
//! fatal: failed topics and failed recipients are counted in the returned
//! [`RunSummary`].

use crate::config::RunConfig;
use crate::dedupe::dedupe;
use crate::digest::assemble;
use crate::dispatch::{DispatchEngine, MailSender};
use crate::models::{Article, Digest, RunSummary, Summary, Topic, TopicFailure, TopicFetchCount};
use crate::news::NewsSearchClient;
use crate::news::fetcher::{ArticleFetcher, FetchError, TopicFetch};
use crate::outputs::json::write_run;
use crate::scheduler::DigestRun;
use crate::subscribers::SubscriberStore;
use crate::summarize::Summarizer;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

#[derive(Debug)]
pub struct RunOrchestrator<C, M, S> {
    config: RunConfig,
    fetcher: ArticleFetcher<C>,
    summarizer: Summarizer,
    dispatcher: DispatchEngine<M>,
    store: S,
    archive_dir: Option<PathBuf>,
}

/// Everything a run produces before dispatch.
struct Prepared {
    digest: Digest,
    topic_fetches: Vec<TopicFetchCount>,
    topic_failures: Vec<TopicFailure>,
}

impl<C, M, S> RunOrchestrator<C, M, S>
where
    C: NewsSearchClient,
    M: MailSender,
    S: SubscriberStore,
{
    pub fn new(config: RunConfig, client: C, sender: M, store: S) -> Self {
        let fetcher = ArticleFetcher::new(client, config.max_articles_per_topic, config.days_back)
            .with_request_timeout(config.request_timeout);
        let summarizer = Summarizer::new(config.summary_sentence_count);
        let dispatcher =
            DispatchEngine::new(sender, config.dispatch_concurrency, config.send_timeout);
        Self {
            config,
            fetcher,
            summarizer,
            dispatcher,
            store,
            archive_dir: None,
        }
    }

    /// Also write each run's digest and summary under `dir`.
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the whole pipeline for `date` and report what happened.
    #[instrument(level = "info", skip_all, fields(%date))]
    pub async fn execute(&self, date: NaiveDate) -> RunSummary {
        let t0 = Instant::now();

        let subscribers = match self.store.list_active().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                error!(error = %e, "Subscriber snapshot failed; continuing with none");
                Vec::new()
            }
        };

        let search = !(subscribers.is_empty() && self.config.skip_fetch_without_subscribers);
        if !search {
            info!("No subscribers; skipping news search");
        }
        let prepared = self.prepare(date, search).await;

        let results = self
            .dispatcher
            .dispatch(&prepared.digest, &subscribers)
            .await;
        let sent = results.iter().filter(|r| r.is_sent()).count();

        let summary = RunSummary {
            date,
            topic_fetches: prepared.topic_fetches,
            topic_failures: prepared.topic_failures,
            dispatch_success_count: sent,
            dispatch_failure_count: results.len() - sent,
            elapsed_ms: t0.elapsed().as_millis(),
        };
        info!(
            topics = summary.topic_fetches.len(),
            failed_topics = summary.topic_failures.len(),
            articles = prepared.digest.article_count(),
            sent = summary.dispatch_success_count,
            failed = summary.dispatch_failure_count,
            elapsed_ms = summary.elapsed_ms,
            "Run complete"
        );

        if let Some(dir) = &self.archive_dir {
            if let Err(e) = write_run(dir, &prepared.digest, &summary).await {
                error!(error = %e, "Failed to archive run");
            }
        }
        summary
    }

    async fn prepare(&self, date: NaiveDate, search: bool) -> Prepared {
        let fetches = if search {
            self.fetch_all(date).await
        } else {
            Vec::new()
        };

        let mut fetched = HashMap::<String, usize>::new();
        let mut topic_failures = Vec::new();
        let mut candidates = Vec::new();
        for fetch in fetches {
            if let Some(e) = &fetch.failure {
                topic_failures.push(TopicFailure {
                    topic: fetch.topic.name.clone(),
                    reason: e.to_string(),
                });
            }
            fetched.insert(fetch.topic.name.clone(), fetch.articles.len());
            candidates.extend(fetch.articles);
        }

        // Candidates are in configured topic order, so a shared article stays
        // with the first topic that returned it.
        let unique = dedupe(candidates);

        let summarized = self
            .config
            .topics
            .iter()
            .map(|topic| (topic.clone(), self.summarize_topic(topic, &unique)))
            .collect::<Vec<(Topic, Vec<Summary>)>>();

        let topic_fetches = summarized
            .iter()
            .map(|(topic, summaries)| TopicFetchCount {
                topic: topic.name.clone(),
                fetched: fetched.get(&topic.name).copied().unwrap_or(0),
                kept: summaries.len(),
            })
            .collect::<Vec<_>>();

        Prepared {
            digest: assemble(date, &self.config.topics, summarized),
            topic_fetches,
            topic_failures,
        }
    }

    fn summarize_topic(&self, topic: &Topic, articles: &[Article]) -> Vec<Summary> {
        articles
            .iter()
            .filter(|a| a.topic.name == topic.name)
            .map(|a| self.summarizer.summarize(a))
            .collect()
    }

    /// Fetch all topics concurrently; results come back in configured order.
    async fn fetch_all(&self, date: NaiveDate) -> Vec<TopicFetch> {
        let limit = self.config.fetch_timeout;
        let mut fetches = stream::iter(self.config.topics.iter().cloned().enumerate())
            .map(|(index, topic)| async move {
                let fetch = timeout(limit, self.fetcher.fetch(&topic, date))
                    .await
                    .unwrap_or_else(|_| {
                        warn!(topic = %topic.name, ?limit, "Topic fetch timed out");
                        TopicFetch::failed(topic, FetchError::TimedOut(limit))
                    });
                (index, fetch)
            })
            .buffer_unordered(self.config.fetch_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;
        fetches.sort_by_key(|(index, _)| *index);
        fetches.into_iter().map(|(_, fetch)| fetch).collect()
    }
}

impl<C, M, S> DigestRun for RunOrchestrator<C, M, S>
where
    C: NewsSearchClient,
    M: MailSender,
    S: SubscriberStore,
{
    async fn run(&self, date: NaiveDate) -> RunSummary {
        self.execute(date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SendError;
    use crate::models::Subscriber;
    use crate::news::{RawArticle, SearchError, SearchRequest};
    use crate::subscribers::StoreError;
    use chrono::{NaiveTime, TimeZone, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Canned search results keyed by query.
    #[derive(Default)]
    struct Desk {
        results: HashMap<String, Vec<RawArticle>>,
        failing: Vec<String>,
        stalled: Vec<String>,
        calls: AtomicUsize,
    }

    impl NewsSearchClient for Desk {
        async fn search(&self, request: &SearchRequest) -> Result<Vec<RawArticle>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stalled.contains(&request.query) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.failing.contains(&request.query) {
                return Err(SearchError::Http {
                    status: 401,
                    body: "invalid api key".to_string(),
                });
            }
            Ok(self.results.get(&request.query).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl MailSender for Outbox {
        async fn send(&self, to: &str, _subject: &str, body: &str) -> Result<(), SendError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    struct Fixed(Option<Vec<Subscriber>>);

    impl SubscriberStore for Fixed {
        async fn list_active(&self) -> Result<Vec<Subscriber>, StoreError> {
            self.0.clone().ok_or_else(|| StoreError::Read {
                path: "subscribers.json".to_string(),
                source: std::io::Error::other("store offline"),
            })
        }
    }

    fn config() -> RunConfig {
        RunConfig {
            topics: vec![
                Topic::new("Economy", vec![]),
                Topic::new("Environment", vec![]),
            ],
            schedule_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            summary_sentence_count: 2,
            max_articles_per_topic: 5,
            max_topics_per_subscription: 10,
            days_back: 1,
            fetch_concurrency: 2,
            fetch_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(8),
            dispatch_concurrency: 2,
            send_timeout: Duration::from_secs(30),
            skip_fetch_without_subscribers: true,
        }
    }

    fn raw(title: &str, slug: &str) -> RawArticle {
        RawArticle {
            title: Some(title.to_string()),
            url: Some(format!("https://news.example.com/{slug}")),
            text: Some(format!(
                "<p>The report on {slug} came out today. Officials gave more detail later. \
                 Analysts expect further changes. Markets reacted calmly.</p>"
            )),
            published_date: Some("2025-05-05T09:00:00Z".to_string()),
        }
    }

    fn desk() -> Desk {
        let shared = raw("Budget targets green bonds", "budget-green-bonds");
        let mut results = HashMap::new();
        results.insert(
            "Economy".to_string(),
            vec![shared.clone(), raw("Rupee steadies", "rupee-steadies")],
        );
        results.insert(
            "Environment".to_string(),
            vec![shared, raw("Monsoon arrives early", "monsoon-early")],
        );
        Desk {
            results,
            ..Default::default()
        }
    }

    fn subscribers() -> Vec<Subscriber> {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        vec![
            Subscriber::new("a@example.com", at),
            Subscriber::new("broken-address", at),
            Subscriber::new("b@example.com", at),
        ]
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 6).unwrap()
    }

    fn titles(digest: &Digest, section: usize) -> Vec<&str> {
        digest.sections[section]
            .summaries
            .iter()
            .map(|s| s.title.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_end_to_end_run() {
        let orchestrator =
            RunOrchestrator::new(config(), desk(), Outbox::default(), Fixed(Some(subscribers())));

        let prepared = orchestrator.prepare(date(), true).await;
        assert_eq!(
            titles(&prepared.digest, 0),
            vec!["Budget targets green bonds", "Rupee steadies"]
        );
        assert_eq!(titles(&prepared.digest, 1), vec!["Monsoon arrives early"]);
        assert!(
            prepared
                .digest
                .summaries()
                .all(|s| !s.sentences.is_empty() && s.sentences.len() <= 2)
        );

        let summary = orchestrator.execute(date()).await;
        assert_eq!(summary.dispatch_success_count, 2);
        assert_eq!(summary.dispatch_failure_count, 1);
        assert!(summary.topic_failures.is_empty());
        assert_eq!(
            summary.topic_fetches,
            vec![
                TopicFetchCount {
                    topic: "Economy".to_string(),
                    fetched: 2,
                    kept: 2
                },
                TopicFetchCount {
                    topic: "Environment".to_string(),
                    fetched: 2,
                    kept: 1
                },
            ]
        );

        let sent = orchestrator.dispatcher.sender().sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        for (_, body) in sent.iter() {
            assert_eq!(body.matches("Budget targets green bonds").count(), 1);
        }
    }

    #[tokio::test]
    async fn test_failed_topic_is_isolated() {
        let desk = Desk {
            failing: vec!["Economy".to_string()],
            ..desk()
        };
        let orchestrator =
            RunOrchestrator::new(config(), desk, Outbox::default(), Fixed(Some(subscribers())));

        let prepared = orchestrator.prepare(date(), true).await;
        assert!(prepared.digest.sections[0].is_empty());
        assert_eq!(
            titles(&prepared.digest, 1),
            vec!["Budget targets green bonds", "Monsoon arrives early"]
        );
        assert_eq!(prepared.topic_failures.len(), 1);
        assert_eq!(prepared.topic_failures[0].topic, "Economy");
        assert!(prepared.topic_failures[0].reason.contains("401"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_topic_times_out() {
        let desk = Desk {
            stalled: vec!["Environment".to_string()],
            ..desk()
        };
        let orchestrator =
            RunOrchestrator::new(config(), desk, Outbox::default(), Fixed(Some(subscribers())));

        let summary = orchestrator.execute(date()).await;
        assert_eq!(summary.topic_failures.len(), 1);
        assert_eq!(summary.topic_failures[0].topic, "Environment");
        assert!(summary.topic_failures[0].reason.contains("timed out"));
        assert_eq!(summary.topic_fetches[0].kept, 2);
        assert_eq!(summary.topic_fetches[1].fetched, 0);
        assert_eq!(summary.dispatch_success_count, 2);
    }

    #[tokio::test]
    async fn test_no_subscribers_skips_search() {
        let orchestrator =
            RunOrchestrator::new(config(), desk(), Outbox::default(), Fixed(Some(vec![])));

        let summary = orchestrator.execute(date()).await;
        assert_eq!(orchestrator.fetcher.client().calls.load(Ordering::SeqCst), 0);
        assert_eq!(summary.dispatch_success_count, 0);
        assert_eq!(summary.dispatch_failure_count, 0);
        assert_eq!(summary.topic_fetches.len(), 2);
        assert!(summary.topic_fetches.iter().all(|t| t.fetched == 0 && t.kept == 0));
    }

    #[tokio::test]
    async fn test_store_failure_is_treated_as_empty() {
        let orchestrator = RunOrchestrator::new(config(), desk(), Outbox::default(), Fixed(None));

        let summary = orchestrator.execute(date()).await;
        assert_eq!(orchestrator.fetcher.client().calls.load(Ordering::SeqCst), 0);
        assert_eq!(summary.dispatch_success_count + summary.dispatch_failure_count, 0);
    }

    #[tokio::test]
    async fn test_run_is_archived() {
        let dir = std::env::temp_dir().join(format!("daily_digest_run_{}", std::process::id()));
        let orchestrator =
            RunOrchestrator::new(config(), desk(), Outbox::default(), Fixed(Some(subscribers())))
                .with_archive_dir(&dir);

        orchestrator.run(date()).await;
        let written: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.join("2025-05-06.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(written["summary"]["dispatch_success_count"], 2);
        assert_eq!(written["digest"]["sections"].as_array().unwrap().len(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    /// Hangs on the first search, then answers normally.
    struct HangsOnce {
        calls: AtomicUsize,
    }

    impl NewsSearchClient for HangsOnce {
        async fn search(&self, _request: &SearchRequest) -> Result<Vec<RawArticle>, SearchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(30)).await;
                return Err(SearchError::Timeout);
            }
            Ok(vec![raw("Rupee steadies", "rupee-steadies")])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_search_is_retried_within_topic_budget() {
        let config = RunConfig {
            topics: vec![Topic::new("Economy", vec![])],
            ..config()
        };
        let client = HangsOnce {
            calls: AtomicUsize::new(0),
        };
        let orchestrator =
            RunOrchestrator::new(config, client, Outbox::default(), Fixed(Some(subscribers())));

        let summary = orchestrator.execute(date()).await;
        assert_eq!(orchestrator.fetcher.client().calls.load(Ordering::SeqCst), 2);
        assert!(summary.topic_failures.is_empty());
        assert_eq!(summary.topic_fetches[0].fetched, 1);
    }

    #[tokio::test]
    async fn test_run_can_be_spawned() {
        let orchestrator =
            RunOrchestrator::new(config(), desk(), Outbox::default(), Fixed(Some(subscribers())));

        let summary = tokio::spawn(async move { orchestrator.run(date()).await })
            .await
            .unwrap();
        assert_eq!(summary.dispatch_success_count, 2);
    }
}
