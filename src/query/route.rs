// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ranking and selection: the full routing pipeline over a corpus snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::corpus::{Corpus, InstructionDocument, PriorityTier};

use super::score::{passes_gate, score_document, MatchCandidate};
use super::tokenize::analyze;

/// A routing request: the agent's message plus optional structured context.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RouteRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<RequestContext>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Structured request context supplied by the calling agent.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RequestContext {
    pub files: Vec<String>,
    pub capabilities: Vec<String>,
}

/// One selected document with its selection rationale.
#[derive(Debug, Clone, Serialize)]
pub struct RoutedDocument {
    pub id: String,
    pub title: String,
    pub tier: PriorityTier,
    pub score: u32,
    pub keyword_score: u32,
    pub priority_score: u32,
    pub bonus_score: u32,
    pub matched_terms: Vec<String>,
    /// Set when the document was pulled in by another document's `includes`
    /// list rather than by its own score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_by: Option<String>,
}

/// Deduplicated, ordered routing output.
#[derive(Debug, Default, Serialize)]
pub struct RoutingResult {
    pub query_terms: Vec<String>,
    pub documents: Vec<RoutedDocument>,
}

/// Route a request against the corpus.
///
/// `base_capabilities` come from configuration; the request context may
/// assert additional ones. Deterministic: same corpus and request always
/// produce the same output.
pub fn route(corpus: &Corpus, request: &RouteRequest, base_capabilities: &[String]) -> RoutingResult {
    let mut terms = analyze(&request.message);
    // Touched files are a routing signal too: a path component naming a
    // keyword counts like the message mentioning it.
    if let Some(ctx) = request.context.as_ref() {
        for file in &ctx.files {
            terms.extend(analyze(file));
        }
    }
    let capabilities = effective_capabilities(base_capabilities, request.context.as_ref());
    let limit = request.limit.unwrap_or(5);

    let mut candidates: Vec<MatchCandidate> = corpus
        .documents()
        .filter(|doc| passes_gate(doc, &capabilities))
        .filter_map(|doc| score_document(doc, &terms))
        .collect();
    rank(corpus, &mut candidates);

    let mut selected: Vec<RoutedDocument> = Vec::new();
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut scored_slots = 0usize;

    // Always-include documents are injected outside the caller limit.
    for candidate in &candidates {
        let doc = match corpus.get(&candidate.id) {
            Some(doc) => doc,
            None => continue,
        };
        let forced = doc.always_include;
        if !forced {
            if scored_slots >= limit {
                continue;
            }
            scored_slots += 1;
        }
        if visited.insert(candidate.id.clone()) {
            selected.push(routed(doc, candidate, None));
        }
    }

    expand_includes(corpus, &capabilities, &mut selected, &mut visited);

    tracing::debug!(
        query = %request.message,
        selected = selected.len(),
        "routing complete"
    );

    RoutingResult {
        query_terms: terms.iter().cloned().collect(),
        documents: selected,
    }
}

fn effective_capabilities(base: &[String], context: Option<&RequestContext>) -> Vec<String> {
    let mut capabilities = base.to_vec();
    if let Some(ctx) = context {
        for cap in &ctx.capabilities {
            if !capabilities.contains(cap) {
                capabilities.push(cap.clone());
            }
        }
    }
    capabilities
}

/// Sort by total score descending. Ties: always-include first, then higher
/// priority tier, then lexical id.
fn rank(corpus: &Corpus, candidates: &mut [MatchCandidate]) {
    candidates.sort_by(|a, b| {
        b.total()
            .cmp(&a.total())
            .then_with(|| {
                let a_forced = a.bonus_score > 0;
                let b_forced = b.bonus_score > 0;
                b_forced.cmp(&a_forced)
            })
            .then_with(|| {
                let a_rank = corpus.get(&a.id).map(|d| d.tier.rank()).unwrap_or(u8::MAX);
                let b_rank = corpus.get(&b.id).map(|d| d.tier.rank()).unwrap_or(u8::MAX);
                a_rank.cmp(&b_rank)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Resolve `includes` exactly one level deep. Included documents are
/// appended after the scored selection, deduplicated, still subject to
/// capability gating. The visited set makes mutual includes safe.
fn expand_includes(
    corpus: &Corpus,
    capabilities: &[String],
    selected: &mut Vec<RoutedDocument>,
    visited: &mut BTreeSet<String>,
) {
    let origins: Vec<(String, Vec<String>)> = selected
        .iter()
        .filter_map(|routed| {
            let doc = corpus.get(&routed.id)?;
            if doc.includes.is_empty() {
                None
            } else {
                Some((doc.id.clone(), doc.includes.clone()))
            }
        })
        .collect();

    for (origin, includes) in origins {
        for include_id in includes {
            if visited.contains(&include_id) {
                continue;
            }
            let doc = match corpus.get(&include_id) {
                Some(doc) => doc,
                None => {
                    tracing::warn!(
                        id = %include_id,
                        included_by = %origin,
                        "include target not found in corpus"
                    );
                    continue;
                }
            };
            if !passes_gate(doc, capabilities) {
                continue;
            }
            visited.insert(include_id.clone());
            selected.push(RoutedDocument {
                id: doc.id.clone(),
                title: doc.title.clone(),
                tier: doc.tier,
                score: 0,
                keyword_score: 0,
                priority_score: doc.priority_weight,
                bonus_score: 0,
                matched_terms: Vec::new(),
                included_by: Some(origin.clone()),
            });
        }
    }
}

fn routed(
    doc: &InstructionDocument,
    candidate: &MatchCandidate,
    included_by: Option<String>,
) -> RoutedDocument {
    RoutedDocument {
        id: candidate.id.clone(),
        title: doc.title.clone(),
        tier: doc.tier,
        score: candidate.total(),
        keyword_score: candidate.keyword_score,
        priority_score: candidate.priority_score,
        bonus_score: candidate.bonus_score,
        matched_terms: candidate.matched_terms.clone(),
        included_by,
    }
}
