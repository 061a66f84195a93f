// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-document match scoring.
//!
//! Scores are deterministic functions of the corpus and the query terms.
//! Constants are implementation detail; the required invariant is ordering:
//! phrase hits outweigh token hits, and the always-include bonus outweighs
//! any achievable keyword total.

use crate::corpus::InstructionDocument;

use super::tokenize::QueryTerms;

/// Weight of a single-token keyword hit.
pub const TOKEN_MATCH_WEIGHT: u32 = 5;
/// Weight of an underscore-joined phrase keyword hit.
pub const PHRASE_MATCH_WEIGHT: u32 = 15;
/// Bonus for always-include documents. Large enough that score-based
/// selection can never drop them.
pub const ALWAYS_INCLUDE_BONUS: u32 = 1000;

/// A scored document before ranking.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub id: String,
    pub keyword_score: u32,
    pub priority_score: u32,
    pub bonus_score: u32,
    pub matched_terms: Vec<String>,
}

impl MatchCandidate {
    pub fn total(&self) -> u32 {
        self.keyword_score + self.priority_score + self.bonus_score
    }
}

/// True when the document may be considered at all. Gating is a hard
/// filter, not a score penalty: an unmet requirement excludes the document
/// even from always-include injection.
pub fn passes_gate(doc: &InstructionDocument, capabilities: &[String]) -> bool {
    match &doc.requires {
        None => true,
        Some(required) => capabilities.iter().any(|c| c == required),
    }
}

/// Score one document against the query terms. Returns `None` when nothing
/// matched and no bonus applies.
pub fn score_document(doc: &InstructionDocument, terms: &QueryTerms) -> Option<MatchCandidate> {
    let mut keyword_score = 0u32;
    let mut matched_terms = Vec::new();

    for keyword in &doc.keywords {
        if terms.contains(keyword) {
            keyword_score += if keyword.contains('_') {
                PHRASE_MATCH_WEIGHT
            } else {
                TOKEN_MATCH_WEIGHT
            };
            matched_terms.push(keyword.clone());
        }
    }

    let bonus_score = if doc.always_include {
        ALWAYS_INCLUDE_BONUS
    } else {
        0
    };

    if keyword_score == 0 && bonus_score == 0 {
        return None;
    }

    Some(MatchCandidate {
        id: doc.id.clone(),
        keyword_score,
        priority_score: doc.priority_weight,
        bonus_score,
        matched_terms,
    })
}
