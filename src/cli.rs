//! Command-line interface definitions for the daily digest service.
//!
//! Every option can also be supplied through an environment variable, and a
//! `.env` file in the working directory is loaded before parsing.

use crate::config::{ConfigError, Overrides, SmtpSettings};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the daily digest service.
///
/// # Examples
///
/// ```sh
/// # Run every day at 08:00 for two topics
/// daily_digest --topics economy,environment --schedule-time 08:00 -s subscribers.json
///
/// # Topics and tuning from a config file, one immediate run
/// daily_digest -c digest.yaml --once
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "DIGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Comma-separated topic names; replaces the topics from the config file
    #[arg(short, long, env = "TOPICS", value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Daily trigger time in local time (HH:MM)
    #[arg(long, env = "SCHEDULE_TIME")]
    pub schedule_time: Option<String>,

    /// JSON file holding the current subscriber list
    #[arg(short, long, env = "SUBSCRIBERS_FILE", default_value = "subscribers.json")]
    pub subscribers: PathBuf,

    /// Optional directory for per-day JSON archives of each run
    #[arg(short, long, env = "ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,

    /// Run the pipeline once for today and exit
    #[arg(long)]
    pub once: bool,

    /// Exa search API key
    #[arg(long, env = "EXA_API_KEY", hide_env_values = true)]
    pub exa_api_key: Option<String>,

    /// Sender account for outgoing mail
    #[arg(long, env = "EMAIL_USER")]
    pub email_user: Option<String>,

    /// Password (or app password) for the sender account
    #[arg(long, env = "EMAIL_PASS", hide_env_values = true)]
    pub email_pass: Option<String>,

    /// SMTP relay host
    #[arg(long, env = "SMTP_HOST", default_value = "smtp.gmail.com")]
    pub smtp_host: String,

    /// SMTP submission port (STARTTLS)
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            topics: self.topics.clone(),
            schedule_time: self.schedule_time.clone(),
        }
    }

    pub fn exa_api_key(&self) -> Result<&str, ConfigError> {
        non_empty(&self.exa_api_key).ok_or(ConfigError::MissingSecret("EXA_API_KEY"))
    }

    pub fn smtp_settings(&self) -> Result<SmtpSettings, ConfigError> {
        let username = non_empty(&self.email_user).ok_or(ConfigError::MissingSecret("EMAIL_USER"))?;
        let password = non_empty(&self.email_pass).ok_or(ConfigError::MissingSecret("EMAIL_PASS"))?;
        Ok(SmtpSettings {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: username.to_string(),
            password: password.to_string(),
            from: username.to_string(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
