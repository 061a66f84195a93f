// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query normalization: tokens plus underscore-joined n-grams.

use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashSet};

/// Common words excluded from single-token matching. Phrases are built from
/// the raw token stream before this filter, so "how_to" style n-grams still
/// form.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
        "by", "from", "as", "is", "was", "are", "were", "be", "been", "being", "have",
        "has", "had", "do", "does", "did", "will", "would", "should", "could", "may",
        "might", "must", "can", "this", "that", "these", "those", "i", "you", "he", "she",
        "it", "we", "they",
    ]
    .into_iter()
    .collect()
});

/// Minimum length for a single token to participate in matching.
const MIN_TOKEN_LEN: usize = 3;

/// Normalized query terms: lookup keys into the corpus inverted index.
#[derive(Debug, Default, Clone)]
pub struct QueryTerms {
    /// Single tokens, stop-word filtered.
    pub tokens: BTreeSet<String>,
    /// 2-gram and 3-gram underscore-joined windows over the raw token
    /// stream.
    pub ngrams: BTreeSet<String>,
}

impl QueryTerms {
    /// True when the term set contains `term`, whether token or phrase.
    pub fn contains(&self, term: &str) -> bool {
        if term.contains('_') {
            // A phrase keyword can also arrive verbatim as one token, e.g.
            // the slash command "/learning_loop".
            self.ngrams.contains(term) || self.tokens.contains(term)
        } else {
            self.tokens.contains(term)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.ngrams.is_empty()
    }

    /// All terms in deterministic order, tokens then n-grams.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.tokens.iter().chain(self.ngrams.iter())
    }

    /// Union another term set into this one. Used to fold request-context
    /// signals (touched file paths) into the message terms.
    pub fn extend(&mut self, other: QueryTerms) {
        self.tokens.extend(other.tokens);
        self.ngrams.extend(other.ngrams);
    }
}

/// Analyze a free-text message into query terms.
///
/// Lowercases, maps every character outside `[a-z0-9_]` to a space, splits
/// on whitespace. N-grams are generated over the full token stream before
/// stop-word removal, so phrase keywords can span common words.
pub fn analyze(message: &str) -> QueryTerms {
    let raw_tokens = raw_tokens(message);

    let mut terms = QueryTerms::default();
    for window in raw_tokens.windows(2) {
        terms.ngrams.insert(window.join("_"));
    }
    for window in raw_tokens.windows(3) {
        terms.ngrams.insert(window.join("_"));
    }
    for token in raw_tokens {
        if token.len() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(token.as_str()) {
            terms.tokens.insert(token);
        }
    }
    terms
}

fn raw_tokens(message: &str) -> Vec<String> {
    let mut normalized = String::with_capacity(message.len());
    for ch in message.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            for lower in ch.to_lowercase() {
                normalized.push(lower);
            }
        } else {
            normalized.push(' ');
        }
    }
    normalized.split_whitespace().map(ToOwned::to_owned).collect()
}
