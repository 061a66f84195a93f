// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direct lookup by topic, category, or exact id.

use serde::Serialize;

use crate::corpus::{Corpus, InstructionDocument};

/// Filter parameters for a direct lookup.
#[derive(Debug, Default, Clone)]
pub struct GetQuery {
    pub topic: Option<String>,
    pub category: Option<String>,
    pub exact_match: bool,
}

/// A matched document rendered for lookup output.
#[derive(Debug, Clone, Serialize)]
pub struct GetHit {
    pub id: String,
    pub title: String,
    pub domains: Vec<String>,
    pub description: String,
    pub content: String,
}

impl GetHit {
    fn from_doc(doc: &InstructionDocument) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            domains: doc.domains.clone(),
            description: doc.description.clone(),
            content: doc.content.clone(),
        }
    }
}

/// Resolve a lookup. Cascade, most specific first:
/// exact id (optionally category-checked), then category filter (optionally
/// narrowed by topic substring over id/content), then topic substring over
/// all documents, then every document.
pub fn get(corpus: &Corpus, query: &GetQuery) -> Vec<GetHit> {
    if query.exact_match {
        if let Some(topic) = &query.topic {
            return corpus
                .get(topic)
                .filter(|doc| match &query.category {
                    Some(category) => doc.domains.contains(category),
                    None => true,
                })
                .map(|doc| vec![GetHit::from_doc(doc)])
                .unwrap_or_default();
        }
        return Vec::new();
    }

    if let Some(category) = &query.category {
        return corpus
            .documents()
            .filter(|doc| doc.domains.contains(category))
            .filter(|doc| match &query.topic {
                Some(topic) => topic_matches(doc, topic),
                None => true,
            })
            .map(GetHit::from_doc)
            .collect();
    }

    if let Some(topic) = &query.topic {
        return corpus
            .documents()
            .filter(|doc| topic_matches(doc, topic))
            .map(GetHit::from_doc)
            .collect();
    }

    corpus.documents().map(GetHit::from_doc).collect()
}

fn topic_matches(doc: &InstructionDocument, topic: &str) -> bool {
    let needle = topic.to_lowercase();
    doc.id.to_lowercase().contains(&needle) || doc.content.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::document::parse_instruction_file;
    use std::path::Path;

    fn corpus() -> Corpus {
        let parse = |path: &str, fm: &str, body: &str| {
            parse_instruction_file(Path::new(path), &format!("+++\n{fm}\n+++\n{body}"))
                .expect("parse")
        };
        Corpus::from_documents(vec![
            parse(
                "learning/learning_loop.instructions.md",
                "title = \"Loop\"\npriority = \"P1\"\nkeywords = [\"loop\"]",
                "Conduct a retrospective.",
            ),
            parse(
                "github/issues.instructions.md",
                "title = \"Issues\"\npriority = \"P2\"\nkeywords = [\"issues\"]",
                "Issue lifecycle.",
            ),
        ])
    }

    fn ids(hits: &[GetHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn exact_match_requires_topic_and_checks_category() {
        let corpus = corpus();
        let hits = get(
            &corpus,
            &GetQuery {
                topic: Some("learning_loop".into()),
                category: Some("learning".into()),
                exact_match: true,
            },
        );
        assert_eq!(ids(&hits), vec!["learning_loop"]);

        let wrong_category = get(
            &corpus,
            &GetQuery {
                topic: Some("learning_loop".into()),
                category: Some("github".into()),
                exact_match: true,
            },
        );
        assert!(wrong_category.is_empty());

        let no_topic = get(
            &corpus,
            &GetQuery {
                exact_match: true,
                ..GetQuery::default()
            },
        );
        assert!(no_topic.is_empty());
    }

    #[test]
    fn category_filter_narrows_by_topic() {
        let corpus = corpus();
        let hits = get(
            &corpus,
            &GetQuery {
                category: Some("github".into()),
                ..GetQuery::default()
            },
        );
        assert_eq!(ids(&hits), vec!["issues"]);

        let narrowed = get(
            &corpus,
            &GetQuery {
                category: Some("github".into()),
                topic: Some("retrospective".into()),
                ..GetQuery::default()
            },
        );
        assert!(narrowed.is_empty());
    }

    #[test]
    fn topic_searches_id_and_content() {
        let corpus = corpus();
        let hits = get(
            &corpus,
            &GetQuery {
                topic: Some("retrospective".into()),
                ..GetQuery::default()
            },
        );
        assert_eq!(ids(&hits), vec!["learning_loop"]);
    }

    #[test]
    fn no_filters_returns_everything() {
        let corpus = corpus();
        let hits = get(&corpus, &GetQuery::default());
        assert_eq!(ids(&hits), vec!["issues", "learning_loop"]);
    }
}
