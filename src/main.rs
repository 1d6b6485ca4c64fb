//! # Daily Digest
//!
//! A scheduled news digest service. Once a day, at a configured local time,
//! it searches a news provider for each configured topic, removes duplicate
//! stories across topics, summarizes every article extractively, and emails
//! one plain-text digest to every current subscriber.
//!
//! ## Usage
//!
//! ```sh
//! daily_digest --topics economy,environment --schedule-time 08:00
//! daily_digest -c digest.yaml --once
//! ```
//!
//! Secrets (`EXA_API_KEY`, `EMAIL_USER`, `EMAIL_PASS`) are read from the
//! environment or a `.env` file.
//!
//! ## Architecture
//!
//! Each run is a one-way pipeline:
//! 1. **Fetching**: Search every topic concurrently, with retries and a timeout
//! 2. **Deduplication**: Keep one copy of each story, under the first topic
//! 3. **Summarization**: LexRank, then term frequency, then the leading sentences
//! 4. **Assembly**: One section per configured topic, in configured order
//! 5. **Dispatch**: Render once and send to each subscriber independently

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dedupe;
mod digest;
mod dispatch;
mod models;
mod news;
mod orchestrator;
mod outputs;
mod scheduler;
mod subscribers;
mod summarize;
mod utils;

use cli::Cli;
use config::RunConfig;
use dispatch::smtp::SmtpMailSender;
use news::exa::ExaClient;
use orchestrator::RunOrchestrator;
use scheduler::{Scheduler, SystemClock};
use subscribers::JsonFileStore;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "daily_digest starting up");

    let args = Cli::parse();
    debug!(
        config = ?args.config,
        subscribers = %args.subscribers.display(),
        archive_dir = ?args.archive_dir,
        once = args.once,
        "Parsed CLI arguments"
    );

    // ---- Configuration; every error here is fatal ----
    let config = match RunConfig::load(args.config.as_deref(), &args.overrides()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    let (api_key, smtp) = match args
        .exa_api_key()
        .and_then(|key| args.smtp_settings().map(|smtp| (key, smtp)))
    {
        Ok(secrets) => secrets,
        Err(e) => {
            error!(error = %e, "Missing credentials");
            return Err(e.into());
        }
    };
    info!(
        topics = ?config.topic_names(),
        schedule_time = %config.schedule_time,
        sentences = config.summary_sentence_count,
        max_articles_per_topic = config.max_articles_per_topic,
        "Loaded configuration"
    );

    if let Some(dir) = &args.archive_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Archive directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    // ---- Collaborators ----
    let client = ExaClient::new(api_key, config.request_timeout)?;
    let sender = SmtpMailSender::new(&smtp)?;
    let store = JsonFileStore::new(&args.subscribers);
    let mut orchestrator = RunOrchestrator::new(config, client, sender, store);
    if let Some(dir) = &args.archive_dir {
        orchestrator = orchestrator.with_archive_dir(dir);
    }

    if args.once {
        let summary = orchestrator.execute(Local::now().date_naive()).await;
        info!(
            elapsed = ?start_time.elapsed(),
            sent = summary.dispatch_success_count,
            failed = summary.dispatch_failure_count,
            "Execution complete"
        );
        return Ok(());
    }

    // ---- Daily schedule ----
    let at = orchestrator.config().schedule_time;
    let mut scheduler = Scheduler::new(orchestrator, SystemClock, at).spawn();
    loop {
        tokio::select! {
            completion = scheduler.next_completion() => match completion {
                Some(c) => info!(
                    fired_at = %c.fired_at,
                    finished_at = %c.finished_at,
                    skipped_triggers = c.skipped_triggers,
                    sent = c.summary.dispatch_success_count,
                    failed = c.summary.dispatch_failure_count,
                    "Daily run finished"
                ),
                None => {
                    warn!("Scheduler exited unexpectedly");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!(
                    state = ?scheduler.state(),
                    "Shutdown requested; waiting for any active run to finish"
                );
                break;
            }
        }
    }
    scheduler.shutdown().await?;

    info!(uptime = ?start_time.elapsed(), "Execution complete");
    Ok(())
}
