//! Sentence splitting and term extraction for the summarizers.
//!
//! Sentences are split on terminal punctuation followed by whitespace and a
//! sentence-initial character, with a small abbreviation list to avoid
//! breaking on "Mr." or "U.S.". Blank lines always end a sentence. Terms are
//! lower-cased words with English stop words removed, reduced with the
//! Snowball English stemmer.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").expect("valid paragraph regex"));

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+(?:['’][\p{L}]+)?").expect("valid word regex"));

const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "inc", "ltd", "co", "corp",
    "gov", "sen", "rep", "gen", "lt", "col", "capt", "no", "fig", "approx", "dept", "est", "jan",
    "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec", "u.s", "u.k",
    "u.n", "e.g", "i.e", "a.m", "p.m", "rs",
];

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is",
        "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not",
        "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
        "out", "over", "own", "said", "same", "says", "she", "should", "so", "some", "such",
        "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these",
        "they", "this", "those", "through", "to", "too", "under", "until", "up", "very", "was",
        "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
        "with", "would", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// A sentence of the source text and its stemmed content terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    /// Position in the source text.
    pub index: usize,
    /// Sentence text with whitespace collapsed.
    pub text: String,
    pub terms: Vec<String>,
}

/// Split `text` into sentences and extract their terms.
pub fn sentences(text: &str) -> Vec<Sentence> {
    let stemmer = Stemmer::create(Algorithm::English);
    split_sentences(text)
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let terms = terms(&text, &stemmer);
            Sentence { index, text, terms }
        })
        .collect()
}

/// Split `text` into whitespace-collapsed sentences, in source order.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in PARAGRAPH_BREAK.split(text) {
        let chars = paragraph.char_indices().collect::<Vec<_>>();
        let mut start = 0usize;
        let mut i = 0usize;
        while i < chars.len() {
            let c = chars[i].1;
            if !is_terminator(c) {
                i += 1;
                continue;
            }
            let mut j = i + 1;
            while j < chars.len() && (is_terminator(chars[j].1) || is_closer(chars[j].1)) {
                j += 1;
            }
            let at_end = j >= chars.len();
            if at_end || chars[j].1.is_whitespace() {
                let end = if at_end { paragraph.len() } else { chars[j].0 };
                let candidate = &paragraph[start..end];
                let rest = &paragraph[end..];
                let boundary = c != '.'
                    || (!ends_with_abbreviation(candidate, rest)
                        && (at_end || next_starts_sentence(rest)));
                if boundary {
                    push_sentence(&mut out, candidate);
                    start = end;
                }
            }
            i = j;
        }
        push_sentence(&mut out, &paragraph[start..]);
    }
    out
}

/// Lower-cased, stemmed content terms of `sentence`.
pub fn terms(sentence: &str, stemmer: &Stemmer) -> Vec<String> {
    WORD.find_iter(sentence)
        .map(|m| m.as_str().to_lowercase().replace('’', "'"))
        .filter(|w| w.chars().count() > 1 && !STOP_WORDS.contains(w.as_str()))
        .map(|w| stemmer.stem(&w).into_owned())
        .collect()
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | '”' | '’' | ')' | ']')
}

fn next_starts_sentence(rest: &str) -> bool {
    match rest.trim_start().chars().next() {
        None => true,
        Some(c) => {
            c.is_uppercase()
                || c.is_numeric()
                || matches!(c, '"' | '“' | '\'' | '‘' | '(' | '[')
        }
    }
}

fn ends_with_abbreviation(candidate: &str, rest: &str) -> bool {
    let trimmed = candidate
        .trim_end()
        .trim_end_matches(|c: char| is_terminator(c) || is_closer(c));
    let mut words = trimmed
        .split_whitespace()
        .rev()
        .map(|word| word.trim_start_matches(|c: char| !c.is_alphanumeric()));
    let last = match words.next() {
        Some(word) => word,
        None => return false,
    };
    ABBREVIATIONS.contains(&last.to_lowercase().as_str())
        || is_initial(last, words.next(), rest.split_whitespace().next())
}

/// A lone capital other than "I" is an initial when it sits next to another
/// initial or is followed by a short capitalised name ("J. K. Das").
fn is_initial(word: &str, previous: Option<&str>, next: Option<&str>) -> bool {
    if word == "I" || !is_single_capital(word) {
        return false;
    }
    let is_dotted_initial = |w: &str| {
        w.strip_suffix('.')
            .is_some_and(|letter| letter != "I" && is_single_capital(letter))
    };
    if previous.is_some_and(is_dotted_initial) || next.is_some_and(is_dotted_initial) {
        return true;
    }
    next.is_some_and(|w| {
        let name = w.trim_end_matches(|c: char| !c.is_alphanumeric());
        name.chars().next().is_some_and(char::is_uppercase)
            && name.chars().count() <= 3
            && !STOP_WORDS.contains(name.to_lowercase().as_str())
    })
}

fn is_single_capital(word: &str) -> bool {
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase())
}

fn push_sentence(out: &mut Vec<String>, raw: &str) {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().any(char::is_alphanumeric) {
        out.push(collapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple_sentences() {
        let s =
            split_sentences("The budget passed. Markets rallied! Will rates fall? Nobody knows.");
        assert_eq!(
            s,
            vec![
                "The budget passed.",
                "Markets rallied!",
                "Will rates fall?",
                "Nobody knows."
            ]
        );
    }

    #[test]
    fn test_split_respects_abbreviations_and_initials() {
        let s = split_sentences("Mr. Sharma met Dr. Rao in the U.S. on Monday. J. K. Das agreed.");
        assert_eq!(
            s,
            vec!["Mr. Sharma met Dr. Rao in the U.S. on Monday.", "J. K. Das agreed."]
        );
    }

    #[test]
    fn test_split_single_letter_sentence_ends() {
        assert_eq!(
            split_sentences("So did I. Then he left."),
            vec!["So did I.", "Then he left."]
        );
        assert_eq!(
            split_sentences("Plan B. Next step."),
            vec!["Plan B.", "Next step."]
        );
        assert_eq!(
            split_sentences("The letter was A. The vote was close."),
            vec!["The letter was A.", "The vote was close."]
        );
        assert_eq!(
            split_sentences("Talks led by A. Roy stalled."),
            vec!["Talks led by A. Roy stalled."]
        );
    }

    #[test]
    fn test_split_keeps_decimals_and_lowercase_continuations() {
        let s = split_sentences("Growth hit 7.2 percent. e.g. it was strong. Next year too.");
        assert_eq!(s, vec!["Growth hit 7.2 percent. e.g. it was strong.", "Next year too."]);
    }

    #[test]
    fn test_split_on_blank_lines_and_collapses_whitespace() {
        let s = split_sentences("Headline without stop\n\nFirst   line\ncontinues here. Second.");
        assert_eq!(
            s,
            vec!["Headline without stop", "First line continues here.", "Second."]
        );
    }

    #[test]
    fn test_split_handles_closing_quotes() {
        let s = split_sentences("He said \"we will win.\" Then he left.");
        assert_eq!(s, vec!["He said \"we will win.\"", "Then he left."]);
    }

    #[test]
    fn test_split_empty_and_punctuation_only() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("  ... !! \n\n ?").is_empty());
    }

    #[test]
    fn test_terms_remove_stop_words_and_stem() {
        let stemmer = Stemmer::create(Algorithm::English);
        let t = terms("The markets were rallying and the banks rallied.", &stemmer);
        assert_eq!(t, vec!["market", "ralli", "bank", "ralli"]);
    }

    #[test]
    fn test_sentences_are_indexed_in_order() {
        let s = sentences("One fish swims. Two fish swim.");
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].index, 0);
        assert_eq!(s[1].index, 1);
        assert_eq!(s[1].terms, vec!["two", "fish", "swim"]);
    }
}
