//! Daily trigger loop.
//!
//! The scheduler runs on its own tokio task and moves through
//! `Idle -> Waiting -> Firing -> Idle`. It fires once per day at the
//! configured local wall-clock time, awaits the run, and reports a
//! [`RunCompletion`] on a channel. Runs never overlap: if a run is still
//! going when later trigger instants pass, those triggers are skipped and
//! logged, never queued. The next wait is always for a strictly future
//! trigger, so starting the service after today's time waits for tomorrow.

use crate::models::RunSummary;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::future::Future;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;
use tracing::{debug, info, warn};

const COMPLETION_BUFFER: usize = 16;

/// Something the scheduler can fire once per trigger.
pub trait DigestRun: Send + Sync {
    fn run(&self, date: NaiveDate) -> impl Future<Output = RunSummary> + Send;
}

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Waiting,
    Firing,
}

/// Reported after every run.
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub fired_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    /// Trigger instants that passed while the run was active.
    pub skipped_triggers: u32,
    pub summary: RunSummary,
}

/// The first occurrence of `at` strictly after `now`.
pub fn next_trigger(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        return today;
    }
    now.date()
        .succ_opt()
        .map(|tomorrow| tomorrow.and_time(at))
        .unwrap_or(today)
}

pub struct Scheduler<R, K> {
    runner: R,
    clock: K,
    at: NaiveTime,
}

impl<R, K> Scheduler<R, K>
where
    R: DigestRun + 'static,
    K: Clock + 'static,
{
    pub fn new(runner: R, clock: K, at: NaiveTime) -> Self {
        Self { runner, clock, at }
    }

    /// Start the trigger loop on its own task.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_BUFFER);
        let task = tokio::spawn(self.run_loop(shutdown_rx, state_tx, completion_tx));
        SchedulerHandle {
            shutdown: shutdown_tx,
            state: state_rx,
            completions: completion_rx,
            task,
        }
    }

    async fn run_loop(
        self,
        mut shutdown: watch::Receiver<bool>,
        state: watch::Sender<SchedulerState>,
        completions: mpsc::Sender<RunCompletion>,
    ) {
        let mut target = next_trigger(self.clock.now(), self.at);

        loop {
            state.send_replace(SchedulerState::Waiting);
            info!(next_trigger = %target, "Waiting for next trigger");

            loop {
                let now = self.clock.now();
                if now >= target {
                    break;
                }
                let wait = (target - now).to_std().unwrap_or_default();
                tokio::select! {
                    _ = sleep(wait) => {}
                    _ = shutdown.changed() => {
                        state.send_replace(SchedulerState::Idle);
                        info!("Scheduler stopped");
                        return;
                    }
                }
            }

            state.send_replace(SchedulerState::Firing);
            let fired_at = self.clock.now();
            info!(%fired_at, "Trigger fired; starting run");
            let summary = self.runner.run(fired_at.date()).await;
            let finished_at = self.clock.now();

            let deadline = next_trigger(target, self.at);
            let mut skipped_triggers = 0u32;
            let mut next = deadline;
            while next <= finished_at {
                skipped_triggers += 1;
                next = next_trigger(next, self.at);
            }
            if skipped_triggers > 0 {
                warn!(
                    %deadline,
                    %finished_at,
                    skipped_triggers,
                    "Run overran the next trigger; missed triggers skipped"
                );
            }
            target = next;

            let completion = RunCompletion {
                fired_at,
                finished_at,
                skipped_triggers,
                summary,
            };
            if completions.send(completion).await.is_err() {
                debug!("Completion receiver dropped");
            }
            state.send_replace(SchedulerState::Idle);
        }
    }
}

/// Control side of a spawned [`Scheduler`].
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<SchedulerState>,
    completions: mpsc::Receiver<RunCompletion>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Wait for the next finished run. `None` once the scheduler has stopped.
    pub async fn next_completion(&mut self) -> Option<RunCompletion> {
        self.completions.recv().await
    }

    /// Stop waiting for triggers. A run in progress is allowed to finish.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown.send(true);
        self.task.await
    }
}
