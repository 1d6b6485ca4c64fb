//! SMTP mail sender using a STARTTLS relay.

use super::{MailSender, SendError};
use crate::config::SmtpSettings;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

/// Sends plain-text mail through one pooled SMTP connection.
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpMailSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailSender")
            .field("from", &self.from.to_string())
            .finish()
    }
}

impl SmtpMailSender {
    pub fn new(settings: &SmtpSettings) -> Result<Self, SendError> {
        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|e| SendError::InvalidAddress(format!("{}: {e}", settings.from)))?;

        let creds = Credentials::new(settings.username.clone(), settings.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| SendError::Transport(e.to_string()))?
            .port(settings.port)
            .credentials(creds)
            .build();

        Ok(Self { transport, from })
    }
}

impl MailSender for SmtpMailSender {
    #[instrument(level = "debug", skip_all, fields(%to))]
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
        let recipient = to
            .parse::<Mailbox>()
            .map_err(|e| SendError::InvalidAddress(format!("{to}: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| SendError::Message(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;
        debug!("SMTP accepted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(from: &str) -> SmtpSettings {
        SmtpSettings {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: "sender@gmail.com".to_string(),
            password: "app-password".to_string(),
            from: from.to_string(),
        }
    }

    #[tokio::test]
    async fn test_new_accepts_valid_sender() {
        assert!(SmtpMailSender::new(&settings("sender@gmail.com")).is_ok());
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_sender() {
        assert!(matches!(
            SmtpMailSender::new(&settings("not an address")),
            Err(SendError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_send_rejects_unparseable_recipient_before_connecting() {
        let sender = SmtpMailSender::new(&settings("sender@gmail.com")).unwrap();
        let result = sender.send("bad address", "Subject", "Body").await;
        assert!(matches!(result, Err(SendError::InvalidAddress(_))));
    }
}
