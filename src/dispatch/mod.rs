//! Digest delivery.
//!
//! The [`DispatchEngine`] renders a digest once and sends it to every
//! subscriber through a [`MailSender`]. Each recipient is handled
//! independently: an unusable address, an SMTP error or a timeout is recorded
//! as a failed [`DispatchResult`] and delivery continues with the others.
//! Failed sends are not retried within the run.

pub mod smtp;

use crate::models::{Digest, DispatchResult, DispatchStatus, Subscriber};
use crate::outputs::message::{self, RenderedDigest};
use crate::utils::is_plausible_email;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),
    #[error("message could not be built: {0}")]
    Message(String),
    #[error("mail transport error: {0}")]
    Transport(String),
    #[error("send timed out after {0:?}")]
    TimedOut(Duration),
}

/// The outbound mail collaborator.
pub trait MailSender: Send + Sync {
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), SendError>> + Send;
}

#[derive(Debug)]
pub struct DispatchEngine<M> {
    sender: M,
    concurrency: usize,
    send_timeout: Duration,
}

impl<M> DispatchEngine<M>
where
    M: MailSender,
{
    pub fn new(sender: M, concurrency: usize, send_timeout: Duration) -> Self {
        Self {
            sender,
            concurrency: concurrency.max(1),
            send_timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn sender(&self) -> &M {
        &self.sender
    }

    /// Send `digest` to every subscriber, returning one result per
    /// subscriber. Result order is unspecified.
    #[instrument(level = "info", skip_all, fields(date = %digest.date, recipients = subscribers.len()))]
    pub async fn dispatch(
        &self,
        digest: &Digest,
        subscribers: &[Subscriber],
    ) -> Vec<DispatchResult> {
        let t0 = Instant::now();
        let rendered = message::render(digest);
        let rendered = &rendered;

        let results = stream::iter(subscribers.iter().cloned())
            .map(|subscriber| async move {
                let status = self.send_one(&subscriber.email, rendered).await;
                DispatchResult { subscriber, status }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let sent = results.iter().filter(|r| r.is_sent()).count();
        info!(
            sent,
            failed = results.len() - sent,
            elapsed_ms = t0.elapsed().as_millis() as u128,
            "Dispatch complete"
        );
        results
    }

    async fn send_one(&self, email: &str, rendered: &RenderedDigest) -> DispatchStatus {
        let to = email.trim();
        if !is_plausible_email(to) {
            let e = SendError::InvalidAddress(to.to_string());
            warn!(recipient = %to, error = %e, "Skipping recipient");
            return DispatchStatus::Failed(e.to_string());
        }

        let outcome = timeout(
            self.send_timeout,
            self.sender.send(to, &rendered.subject, &rendered.body),
        )
        .await
        .unwrap_or(Err(SendError::TimedOut(self.send_timeout)));

        match outcome {
            Ok(()) => {
                debug!(recipient = %to, "Digest sent");
                DispatchStatus::Sent
            }
            Err(e) => {
                warn!(recipient = %to, error = %e, "Digest send failed");
                DispatchStatus::Failed(e.to_string())
            }
        }
    }
}
