//! Plain-text rendering of a [`Digest`] for email.
//!
//! # Layout
//!
//! ```text
//! Subject: Daily News on Economy, Environment - 06 May 2025
//!
//! Your news digest for 06 May 2025
//!
//! == Economy ==
//!
//! 1. Budget passes
//!    https://example.com/budget
//!    First summary sentence. Second summary sentence.
//!
//! == Environment ==
//!
//! No news this period.
//! ```

use crate::models::Digest;
use crate::utils::upcase;
use std::fmt::Write;

pub const NO_NEWS: &str = "No news this period.";

/// A rendered message, ready for any recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub subject: String,
    pub body: String,
}

pub fn render(digest: &Digest) -> RenderedDigest {
    RenderedDigest {
        subject: subject(digest),
        body: body(digest),
    }
}

pub fn subject(digest: &Digest) -> String {
    let topics = digest
        .sections
        .iter()
        .map(|s| upcase(s.topic.name.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Daily News on {} - {}",
        topics,
        digest.date.format("%d %b %Y")
    )
}

pub fn body(digest: &Digest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Your news digest for {}", digest.date.format("%d %b %Y"));

    for section in &digest.sections {
        let _ = writeln!(out, "\n== {} ==\n", upcase(section.topic.name.trim()));
        if section.is_empty() {
            let _ = writeln!(out, "{NO_NEWS}");
            continue;
        }
        for (idx, summary) in section.summaries.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", idx + 1, summary.title);
            if !summary.source_url.is_empty() {
                let _ = writeln!(out, "   {}", summary.source_url);
            }
            let _ = writeln!(out, "   {}\n", summary.text());
        }
    }
    out
}
