//! Term-frequency sentence scoring.
//!
//! Each sentence scores the mean of its terms' document frequencies,
//! normalized by the most frequent term. Used when the sentence graph is
//! unusable, e.g. when no two sentences share vocabulary.

use super::text::Sentence;
use super::{SummarizationError, SummaryStrategy, top_n};
use crate::models::SummaryMethod;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct TermFrequency;

impl TermFrequency {
    pub fn scores(&self, sentences: &[Sentence]) -> Result<Vec<f64>, SummarizationError> {
        let mut frequency = BTreeMap::<&str, usize>::new();
        for term in sentences.iter().flat_map(|s| s.terms.iter()) {
            *frequency.entry(term.as_str()).or_default() += 1;
        }
        let max = match frequency.values().max() {
            Some(&max) => max as f64,
            None => return Err(SummarizationError::NoTerms),
        };

        Ok(sentences
            .iter()
            .map(|s| {
                if s.terms.is_empty() {
                    return 0.0;
                }
                let total = s
                    .terms
                    .iter()
                    .map(|t| frequency.get(t.as_str()).copied().unwrap_or(0) as f64 / max)
                    .sum::<f64>();
                total / s.terms.len() as f64
            })
            .collect())
    }
}

impl SummaryStrategy for TermFrequency {
    fn method(&self) -> SummaryMethod {
        SummaryMethod::ExtractiveStatistical
    }

    fn select(&self, sentences: &[Sentence], n: usize) -> Result<Vec<usize>, SummarizationError> {
        let scores = self.scores(sentences)?;
        Ok(top_n(&scores, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarize::text::sentences;

    #[test]
    fn test_frequent_terms_score_higher() {
        let s =
            sentences("Monsoon rains flood Mumbai. Monsoon rains delay trains. Cricket resumes.");
        let scores = TermFrequency.scores(&s).unwrap();
        assert!(scores[1] > scores[2]);
        assert!(scores[0] > scores[2]);
    }

    #[test]
    fn test_no_terms_is_an_error() {
        let s = sentences("It is. So it was. Then it was not.");
        assert!(matches!(
            TermFrequency.scores(&s),
            Err(SummarizationError::NoTerms)
        ));
    }
}
