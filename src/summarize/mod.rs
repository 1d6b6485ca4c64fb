//! Extractive article summarization.
//!
//! A [`Summarizer`] selects at most `n` sentences of an article body and
//! returns them in source order. Strategies are tried in a fixed chain:
//!
//! | Strategy | Module | Used when |
//! |----------|--------|-----------|
//! | Sentence graph | [`lexrank`] | Text has enough sentences to rank |
//! | Term frequency | [`statistical`] | The graph has no edges or fails to score |
//! | Leading sentences | [`Lead`] | Short text, or both rankers fail |
//!
//! Every step is deterministic: identical text and `n` always produce the
//! same sentences. Summarization never fails; an empty body yields a single
//! placeholder sentence.

pub mod lexrank;
pub mod statistical;
pub mod text;

use crate::models::{Article, Summary, SummaryMethod};
use lexrank::LexRank;
use statistical::TermFrequency;
use text::Sentence;
use thiserror::Error;
use tracing::debug;

/// Texts with fewer sentences than this skip ranking entirely.
pub const MIN_GRAPH_SENTENCES: usize = 3;

/// Sentence used when an article body has no usable text.
pub const NO_SUMMARY: &str = "No summary available.";

#[derive(Debug, Error)]
pub enum SummarizationError {
    #[error("text too short to rank ({sentences} sentences)")]
    TooShort { sentences: usize },
    #[error("no scorable terms in text")]
    NoTerms,
    #[error("sentence graph has no edges")]
    DisconnectedGraph,
    #[error("ranking produced non-finite scores")]
    NonFinite,
}

/// A way of choosing which sentences make up a summary.
pub trait SummaryStrategy: Send + Sync {
    fn method(&self) -> SummaryMethod;

    /// Indices into `sentences` of at most `n` chosen sentences.
    fn select(&self, sentences: &[Sentence], n: usize) -> Result<Vec<usize>, SummarizationError>;
}

/// The first `n` sentences, verbatim.
#[derive(Debug, Clone, Default)]
pub struct Lead;

impl SummaryStrategy for Lead {
    fn method(&self) -> SummaryMethod {
        SummaryMethod::TruncationFallback
    }

    fn select(&self, sentences: &[Sentence], n: usize) -> Result<Vec<usize>, SummarizationError> {
        Ok((0..sentences.len().min(n)).collect())
    }
}

pub struct Summarizer {
    sentence_count: usize,
    rankers: Vec<Box<dyn SummaryStrategy>>,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("sentence_count", &self.sentence_count)
            .field(
                "rankers",
                &self.rankers.iter().map(|r| r.method()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Summarizer {
    /// Graph ranking, then term frequency, then leading sentences.
    pub fn new(sentence_count: usize) -> Self {
        Self::with_rankers(
            sentence_count,
            vec![Box::new(LexRank::default()), Box::new(TermFrequency)],
        )
    }

    /// Use a custom ranking chain; [`Lead`] is always the final fallback.
    pub fn with_rankers(sentence_count: usize, rankers: Vec<Box<dyn SummaryStrategy>>) -> Self {
        Self {
            sentence_count,
            rankers,
        }
    }

    pub fn summarize(&self, article: &Article) -> Summary {
        let n = self.sentence_count;
        let sentences = text::sentences(&article.body_text);
        let (picked, method) = self.choose(&sentences, n);

        let mut out = picked
            .into_iter()
            .map(|i| sentences[i].text.clone())
            .collect::<Vec<_>>();
        if out.is_empty() && n > 0 {
            out.push(NO_SUMMARY.to_string());
        }

        debug!(
            article = %article.id,
            sentences = sentences.len(),
            kept = out.len(),
            %method,
            "Summarized article"
        );
        Summary {
            article_id: article.id.clone(),
            title: article.title.clone(),
            source_url: article.source_url.clone(),
            sentences: out,
            method,
        }
    }

    fn choose(&self, sentences: &[Sentence], n: usize) -> (Vec<usize>, SummaryMethod) {
        let fallback = || (Lead.select(sentences, n).unwrap_or_default(), Lead.method());
        if n == 0 || sentences.len() < MIN_GRAPH_SENTENCES || sentences.len() <= n {
            return fallback();
        }
        for ranker in &self.rankers {
            match ranker.select(sentences, n) {
                Ok(mut picked) if !picked.is_empty() => {
                    picked.sort_unstable();
                    picked.dedup();
                    picked.retain(|&i| i < sentences.len());
                    picked.truncate(n);
                    return (picked, ranker.method());
                }
                Ok(_) => debug!(method = %ranker.method(), "Ranker selected nothing"),
                Err(e) => {
                    debug!(method = %ranker.method(), error = %e, "Ranker failed; trying next")
                }
            }
        }
        fallback()
    }
}

/// Summarize `article` to at most `n` sentences with the default chain.
#[cfg(test)]
pub fn summarize(article: &Article, n: usize) -> Summary {
    Summarizer::new(n).summarize(article)
}

/// Indices of the `n` highest scores, earlier index first on ties, returned
/// in ascending index order.
pub(crate) fn top_n(scores: &[f64], n: usize) -> Vec<usize> {
    let mut order = (0..scores.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order.truncate(n);
    order.sort_unstable();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Topic;

    fn article(body: &str) -> Article {
        Article::new(
            "Title",
            body,
            "https://example.com/story",
            None,
            Topic::new("Economy", vec![]),
        )
    }

    const LONG_STORY: &str = "The central bank raised interest rates on Tuesday. \
        Interest rates rose as the central bank acted. \
        The central bank said rates would stay high. \
        A cat sat on a mat in Paris. \
        Bank officials expect interest rates to stay high. \
        Shares fell after the announcement.";

    #[test]
    fn test_top_n_breaks_ties_by_position() {
        assert_eq!(top_n(&[0.2, 0.5, 0.5, 0.1], 2), vec![1, 2]);
        assert_eq!(top_n(&[0.3, 0.3, 0.3], 2), vec![0, 1]);
        assert_eq!(top_n(&[0.9], 4), vec![0]);
    }

    #[test]
    fn test_graph_summary_in_source_order() {
        let summary = summarize(&article(LONG_STORY), 3);
        assert_eq!(summary.method, SummaryMethod::ExtractiveGraph);
        assert_eq!(summary.sentences.len(), 3);
        assert!(!summary.sentences.iter().any(|s| s.contains("cat")));
        let positions = summary
            .sentences
            .iter()
            .map(|s| LONG_STORY.find(s.as_str()).unwrap())
            .collect::<Vec<_>>();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_short_text_uses_truncation() {
        let summary = summarize(&article("First point. Second point."), 3);
        assert_eq!(summary.method, SummaryMethod::TruncationFallback);
        assert_eq!(summary.sentences, vec!["First point.", "Second point."]);
    }

    #[test]
    fn test_text_no_longer_than_n_uses_truncation() {
        let summary = summarize(&article("One fact. Two facts. Three facts."), 3);
        assert_eq!(summary.method, SummaryMethod::TruncationFallback);
        assert_eq!(summary.sentences.len(), 3);
    }

    #[test]
    fn test_disconnected_text_uses_statistical() {
        let body =
            "Apples grow quickly. Bridges collapse rarely. Comets travel far. Dolphins swim fast.";
        let summary = summarize(&article(body), 2);
        assert_eq!(summary.method, SummaryMethod::ExtractiveStatistical);
        assert_eq!(
            summary.sentences,
            vec!["Apples grow quickly.", "Bridges collapse rarely."]
        );
    }

    #[test]
    fn test_stop_word_text_falls_back_to_lead() {
        let summary = summarize(&article("It is. So it was. Then it was not. Or so they were."), 2);
        assert_eq!(summary.method, SummaryMethod::TruncationFallback);
        assert_eq!(summary.sentences, vec!["It is.", "So it was."]);
    }

    #[test]
    fn test_empty_body_gets_placeholder() {
        let summary = summarize(&article("   "), 3);
        assert_eq!(summary.sentences, vec![NO_SUMMARY]);
        assert_eq!(summary.method, SummaryMethod::TruncationFallback);
        assert!(summarize(&article(""), 0).sentences.is_empty());
    }

    #[test]
    fn test_sentence_count_never_exceeds_n() {
        let bodies = [
            "",
            "Single sentence without a stop",
            "One. Two. Three.",
            LONG_STORY,
            "Apples grow quickly. Bridges collapse rarely. Comets travel far. Dolphins swim fast.",
        ];
        for body in bodies {
            for n in 0..7 {
                let summary = summarize(&article(body), n);
                assert!(summary.sentences.len() <= n, "n = {n}, body = {body:?}");
            }
        }
    }

    #[test]
    fn test_summaries_are_deterministic() {
        for n in 1..5 {
            let a = summarize(&article(LONG_STORY), n);
            let b = summarize(&article(LONG_STORY), n);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_summary_carries_article_identity() {
        let a = article(LONG_STORY);
        let summary = summarize(&a, 2);
        assert_eq!(summary.article_id, a.id);
        assert_eq!(summary.title, "Title");
        assert_eq!(summary.source_url, "https://example.com/story");
    }

    struct Broken;

    impl SummaryStrategy for Broken {
        fn method(&self) -> SummaryMethod {
            SummaryMethod::ExtractiveGraph
        }

        fn select(&self, _: &[Sentence], _: usize) -> Result<Vec<usize>, SummarizationError> {
            Err(SummarizationError::NonFinite)
        }
    }

    #[test]
    fn test_failing_ranker_degrades_to_lead() {
        let summarizer = Summarizer::with_rankers(2, vec![Box::new(Broken)]);
        let summary = summarizer.summarize(&article(LONG_STORY));
        assert_eq!(summary.method, SummaryMethod::TruncationFallback);
        assert_eq!(summary.sentences.len(), 2);
        assert!(summary.sentences[0].starts_with("The central bank raised"));
    }
}
