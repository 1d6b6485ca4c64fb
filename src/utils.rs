//! Small helpers shared across the pipeline.
//!
//! - String truncation for log fields and capitalisation for subject lines
//! - HTML-to-text conversion for provider article bodies
//! - A cheap plausibility check for recipient addresses
//! - File system validation for the archive directory

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static BLOCK_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(br\s*/?|/p|/div|/h[1-6]|/li|/tr|/blockquote|/section|/article)\s*>")
        .expect("valid block regex")
});

static NON_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("valid script regex")
});

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary)
/// with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Capitalize the first character of a string.
///
/// Used for topic names in subject lines (e.g. "economy" -> "Economy").
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Convert an HTML fragment to plain text.
///
/// Block-level closing tags become paragraph breaks, scripts, styles and
/// comments are removed, entities are decoded, and whitespace inside each
/// line is collapsed. Plain text passes through with only whitespace
/// normalisation.
pub fn html_to_text(html: &str) -> String {
    let text = if html.contains('<') {
        let cleaned = NON_TEXT.replace_all(html, " ");
        let blocks = BLOCK_END.replace_all(&cleaned, "\n\n");
        let fragment = Html::parse_fragment(&blocks);
        fragment.root_element().text().collect::<String>()
    } else {
        html.to_string()
    };

    let mut out = String::with_capacity(text.len());
    let mut pending_break = false;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            pending_break = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        pending_break = false;
    }
    out
}

/// Whether `address` looks like a deliverable mailbox: one `@`, a non-empty
/// local part, a dotted domain, and no whitespace.
pub fn is_plausible_email(address: &str) -> bool {
    let address = address.trim();
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then writes and deletes a
/// scratch file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let scratch_path = path.join("..__write_check__");
    match stdfs::File::create(&scratch_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&scratch_path);
            info!("Archive directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
