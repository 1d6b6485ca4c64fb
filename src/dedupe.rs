//! Canonical article identity and cross-topic deduplication.
//!
//! Two articles are the same item when their normalized titles and
//! normalized source URLs match. Deduplication runs once per run over the
//! articles of every topic, in configured topic order, so a story returned
//! for several topics is kept under the first one.

use crate::models::{Article, ArticleId};
use itertools::Itertools;
use tracing::debug;
use url::Url;

/// Lower-case a title and collapse all whitespace runs to single spaces.
pub fn normalize_title(title: &str) -> String {
    title.to_lowercase().split_whitespace().join(" ")
}

/// Reduce a URL to scheme, host and path.
///
/// Query, fragment, port and credentials are dropped, and a trailing `/` is
/// removed from non-root paths. Unparseable input is lower-cased and cut at
/// the first `?` or `#`.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(url) => match url.host_str() {
            Some(host) => {
                let path = url.path();
                let path = if path.len() > 1 {
                    path.trim_end_matches('/')
                } else {
                    ""
                };
                format!("{}://{}{}", url.scheme(), host, path)
            }
            None => {
                let mut url = url;
                url.set_query(None);
                url.set_fragment(None);
                url.to_string()
            }
        },
        Err(_) => {
            let cut = raw.find(['?', '#']).unwrap_or(raw.len());
            raw[..cut].to_lowercase()
        }
    }
}

/// Derive the canonical identity for a title and source URL.
pub fn canonical_id(title: &str, source_url: &str) -> ArticleId {
    ArticleId::from_canonical(format!(
        "{}|{}",
        normalize_title(title),
        normalize_url(source_url)
    ))
}

/// Drop every article whose identity was already seen, keeping the first
/// occurrence and the relative order of the survivors.
pub fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    let before = articles.len();
    let kept = articles
        .into_iter()
        .unique_by(|a| a.id.clone())
        .collect::<Vec<_>>();
    debug!(before, after = kept.len(), "Deduplicated articles");
    kept
}
