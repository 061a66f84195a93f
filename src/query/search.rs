// SPDX-License-Identifier: MIT OR Apache-2.0

//! Free-text substring search over instruction metadata and content.
//!
//! Narrower than full routing: no n-grams, no gating, no always-include
//! injection. Field hits are weighted so identifier and description matches
//! outrank incidental body matches.

use serde::Serialize;

use crate::corpus::Corpus;

const ID_WEIGHT: u32 = 10;
const DESCRIPTION_WEIGHT: u32 = 8;
const DOMAIN_WEIGHT: u32 = 7;
const KEYWORD_WEIGHT: u32 = 5;
const CONTENT_WEIGHT: u32 = 3;

/// Characters of body context shown on either side of a content hit.
const SNIPPET_RADIUS: usize = 100;

/// One search hit with the fields that matched.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub score: u32,
    pub matches: Vec<String>,
}

/// Case-insensitive substring search across id, description, domains,
/// keywords, and content. Results sorted by score descending, id ascending,
/// truncated to `limit`.
pub fn search(corpus: &Corpus, query: &str, limit: usize) -> Vec<SearchHit> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = Vec::new();
    for doc in corpus.documents() {
        let mut score = 0u32;
        let mut matches = Vec::new();

        if doc.id.to_lowercase().contains(&needle) {
            score += ID_WEIGHT;
            matches.push(format!("id: {}", doc.id));
        }
        if !doc.description.is_empty() && doc.description.to_lowercase().contains(&needle) {
            score += DESCRIPTION_WEIGHT;
            matches.push(format!("description: {}", doc.description));
        }
        for domain in &doc.domains {
            if domain.to_lowercase().contains(&needle) {
                score += DOMAIN_WEIGHT;
                matches.push(format!("domain: {domain}"));
            }
        }
        for keyword in &doc.keywords {
            if keyword.contains(&needle) {
                score += KEYWORD_WEIGHT;
                matches.push(format!("keyword: {keyword}"));
            }
        }
        let content_lower = doc.content.to_lowercase();
        if let Some(idx) = content_lower.find(&needle) {
            score += CONTENT_WEIGHT;
            matches.push(format!("content: ...{}...", snippet(&doc.content, idx)));
        }

        if score > 0 {
            hits.push(SearchHit {
                id: doc.id.clone(),
                title: doc.title.clone(),
                score,
                matches,
            });
        }
    }

    hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(limit);
    hits
}

/// Body excerpt around a match, clamped to char boundaries.
fn snippet(content: &str, match_idx: usize) -> String {
    let start = floor_char_boundary(content, match_idx.saturating_sub(SNIPPET_RADIUS));
    let end = floor_char_boundary(
        content,
        (match_idx + SNIPPET_RADIUS).min(content.len()),
    );
    content[start..end].trim().to_string()
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::document::parse_instruction_file;
    use crate::corpus::InstructionDocument;
    use std::path::Path;

    fn doc(path: &str, frontmatter: &str, body: &str) -> InstructionDocument {
        parse_instruction_file(Path::new(path), &format!("+++\n{frontmatter}\n+++\n{body}"))
            .expect("parse")
    }

    fn corpus() -> Corpus {
        Corpus::from_documents(vec![
            doc(
                "learning/learning_loop.instructions.md",
                "title = \"Loop\"\npriority = \"P1\"\nkeywords = [\"retrospective\"]\n\
                 description = \"Run a learning loop after work\"",
                "Start by listing lessons learned.",
            ),
            doc(
                "github/issues.instructions.md",
                "title = \"Issues\"\npriority = \"P2\"\nkeywords = [\"issues\"]",
                "Mention the learning loop doc when closing issues.",
            ),
        ])
    }

    #[test]
    fn id_matches_outrank_content_matches() {
        let hits = search(&corpus(), "learning", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "learning_loop");
        assert!(hits[0].score > hits[1].score);
        assert!(hits[1].matches[0].starts_with("content:"));
    }

    #[test]
    fn content_hits_carry_a_snippet() {
        let hits = search(&corpus(), "lessons learned", 10);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].matches[0].contains("lessons learned"));
    }

    #[test]
    fn limit_and_empty_query_apply() {
        assert_eq!(search(&corpus(), "learning", 1).len(), 1);
        assert!(search(&corpus(), "", 10).is_empty());
        assert!(search(&corpus(), "zzz_absent", 10).is_empty());
    }
}
