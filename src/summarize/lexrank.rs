//! LexRank-style sentence centrality.
//!
//! Sentences become TF-IDF vectors; pairs whose cosine similarity exceeds
//! the threshold are joined by an edge, and a damped power iteration over
//! the degree-normalized graph scores each sentence. Term vectors are kept
//! in ordered maps so floating-point sums are evaluated in a fixed order.

use super::text::Sentence;
use super::{MIN_GRAPH_SENTENCES, SummarizationError, SummaryStrategy, top_n};
use crate::models::SummaryMethod;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct LexRank {
    /// Minimum cosine similarity for two sentences to be connected.
    pub threshold: f64,
    pub damping: f64,
    /// Convergence bound on the L1 change between iterations.
    pub epsilon: f64,
    pub max_iterations: usize,
}

impl Default for LexRank {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            damping: 0.85,
            epsilon: 1e-6,
            max_iterations: 100,
        }
    }
}

impl LexRank {
    /// Centrality score for every sentence, indexed like `sentences`.
    pub fn scores(&self, sentences: &[Sentence]) -> Result<Vec<f64>, SummarizationError> {
        let n = sentences.len();
        if n < MIN_GRAPH_SENTENCES {
            return Err(SummarizationError::TooShort { sentences: n });
        }

        let vectors = tf_idf(sentences);
        if vectors.iter().all(BTreeMap::is_empty) {
            return Err(SummarizationError::NoTerms);
        }
        let norms = vectors
            .iter()
            .map(|v| v.values().map(|w| w * w).sum::<f64>().sqrt())
            .collect::<Vec<_>>();

        let mut edges = vec![Vec::new(); n];
        for i in 0..n {
            for j in (i + 1)..n {
                let sim = cosine(&vectors[i], &vectors[j], norms[i], norms[j]);
                if sim > self.threshold {
                    edges[i].push(j);
                    edges[j].push(i);
                }
            }
        }
        if edges.iter().all(Vec::is_empty) {
            return Err(SummarizationError::DisconnectedGraph);
        }

        let uniform = 1.0 / n as f64;
        let mut rank = vec![uniform; n];
        for _ in 0..self.max_iterations {
            let mut next = vec![(1.0 - self.damping) * uniform; n];
            for (i, neighbours) in edges.iter().enumerate() {
                if neighbours.is_empty() {
                    // isolated sentences spread their mass evenly
                    let share = self.damping * rank[i] * uniform;
                    next.iter_mut().for_each(|r| *r += share);
                } else {
                    let share = self.damping * rank[i] / neighbours.len() as f64;
                    for &j in neighbours {
                        next[j] += share;
                    }
                }
            }
            let delta = next
                .iter()
                .zip(&rank)
                .map(|(a, b)| (a - b).abs())
                .sum::<f64>();
            rank = next;
            if delta < self.epsilon {
                break;
            }
        }

        if rank.iter().any(|r| !r.is_finite()) {
            return Err(SummarizationError::NonFinite);
        }
        Ok(rank)
    }
}

impl SummaryStrategy for LexRank {
    fn method(&self) -> SummaryMethod {
        SummaryMethod::ExtractiveGraph
    }

    fn select(&self, sentences: &[Sentence], n: usize) -> Result<Vec<usize>, SummarizationError> {
        let scores = self.scores(sentences)?;
        Ok(top_n(&scores, n))
    }
}

fn tf_idf(sentences: &[Sentence]) -> Vec<BTreeMap<&str, f64>> {
    let total = sentences.len() as f64;
    let mut document_frequency = BTreeMap::<&str, f64>::new();
    for sentence in sentences {
        let mut seen = sentence.terms.iter().map(String::as_str).collect::<Vec<_>>();
        seen.sort_unstable();
        seen.dedup();
        for term in seen {
            *document_frequency.entry(term).or_default() += 1.0;
        }
    }

    sentences
        .iter()
        .map(|sentence| {
            let mut tf = BTreeMap::<&str, f64>::new();
            for term in &sentence.terms {
                *tf.entry(term.as_str()).or_default() += 1.0;
            }
            for (term, weight) in tf.iter_mut() {
                let df = document_frequency.get(term).copied().unwrap_or(1.0);
                *weight *= ((1.0 + total) / (1.0 + df)).ln() + 1.0;
            }
            tf
        })
        .collect()
}

fn cosine(a: &BTreeMap<&str, f64>, b: &BTreeMap<&str, f64>, norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot = a
        .iter()
        .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
        .sum::<f64>();
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarize::text::sentences;

    const BANK_STORY: &str = "The central bank raised interest rates on Tuesday. \
        Interest rates rose as the central bank acted. \
        The central bank said rates would stay high. \
        A cat sat on a mat in Paris. \
        Bank officials expect interest rates to stay high.";

    #[test]
    fn test_isolated_sentence_ranks_last() {
        let s = sentences(BANK_STORY);
        let scores = LexRank::default().scores(&s).unwrap();
        let lowest = scores
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(lowest, Some(3));
    }

    #[test]
    fn test_scores_sum_to_one() {
        let s = sentences(BANK_STORY);
        let scores = LexRank::default().scores(&s).unwrap();
        let total = scores.iter().sum::<f64>();
        assert!((total - 1.0).abs() < 1e-6, "total = {total}");
    }

    #[test]
    fn test_select_returns_source_order() {
        let s = sentences(BANK_STORY);
        let picked = LexRank::default().select(&s, 2).unwrap();
        assert_eq!(picked.len(), 2);
        assert!(picked[0] < picked[1]);
        assert!(!picked.contains(&3));
    }

    #[test]
    fn test_disconnected_graph_is_an_error() {
        let s = sentences("Apples grow quickly. Bridges collapse rarely. Comets travel far.");
        assert!(matches!(
            LexRank::default().scores(&s),
            Err(SummarizationError::DisconnectedGraph)
        ));
    }

    #[test]
    fn test_too_short_is_an_error() {
        let s = sentences("Only one sentence here. And another one.");
        assert!(matches!(
            LexRank::default().scores(&s),
            Err(SummarizationError::TooShort { sentences: 2 })
        ));
    }
}
