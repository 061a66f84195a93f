// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instruction corpus: load-time immutable snapshot of every instruction
//! document plus the derived keyword inverted index.

pub mod document;
pub mod loader;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub use document::{InstructionDocument, PriorityTier};

use crate::errors::LoadError;

/// Immutable corpus snapshot. Built once at startup; routing holds it behind
/// an `Arc` and never mutates it. Reload means building a new snapshot.
#[derive(Debug, Default)]
pub struct Corpus {
    documents: BTreeMap<String, InstructionDocument>,
    /// keyword term (token or underscore-joined phrase) -> document ids
    index: BTreeMap<String, BTreeSet<String>>,
}

impl Corpus {
    /// Scan the given directories and build the snapshot. Fatal on any
    /// load error.
    pub fn build(dirs: &[PathBuf], enabled_domains: &[String]) -> Result<Self, LoadError> {
        let documents = loader::scan_documents(dirs, enabled_domains)?;
        let corpus = Self::from_documents(documents);
        tracing::info!(
            documents = corpus.len(),
            terms = corpus.index.len(),
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// Assemble a snapshot from already-parsed documents. Used by tests and
    /// by the loader after duplicate resolution.
    pub fn from_documents(documents: Vec<InstructionDocument>) -> Self {
        let mut corpus = Self::default();
        for doc in documents {
            for keyword in &doc.keywords {
                corpus
                    .index
                    .entry(keyword.clone())
                    .or_default()
                    .insert(doc.id.clone());
            }
            corpus.documents.insert(doc.id.clone(), doc);
        }
        corpus
    }

    pub fn get(&self, id: &str) -> Option<&InstructionDocument> {
        self.documents.get(id)
    }

    /// Documents in deterministic (id) order.
    pub fn documents(&self) -> impl Iterator<Item = &InstructionDocument> {
        self.documents.values()
    }

    /// Document ids whose keyword set contains the exact term.
    pub fn ids_for_term(&self, term: &str) -> Option<&BTreeSet<String>> {
        self.index.get(term)
    }

    /// Documents flagged for unconditional inclusion, in id order.
    pub fn always_include(&self) -> impl Iterator<Item = &InstructionDocument> {
        self.documents.values().filter(|d| d.always_include)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document::parse_instruction_file;
    use std::path::Path;

    pub(crate) fn doc_from(path: &str, frontmatter: &str) -> InstructionDocument {
        let content = format!("+++\n{frontmatter}\n+++\nbody");
        parse_instruction_file(Path::new(path), &content).expect("parse test document")
    }

    #[test]
    fn index_maps_terms_to_ids() {
        let corpus = Corpus::from_documents(vec![
            doc_from(
                "learning/learning_loop.instructions.md",
                "title = \"Loop\"\npriority = \"P1\"\nkeywords = [\"learning_loop\", \"retro\"]",
            ),
            doc_from(
                "learning/work_logging.instructions.md",
                "title = \"Log\"\npriority = \"P2\"\nkeywords = [\"retro\"]",
            ),
        ]);

        assert_eq!(corpus.len(), 2);
        let retro: Vec<_> = corpus.ids_for_term("retro").unwrap().iter().collect();
        assert_eq!(retro, vec!["learning_loop", "work_logging"]);
        assert!(corpus.ids_for_term("nope").is_none());
    }

    #[test]
    fn always_include_iterates_flagged_docs() {
        let corpus = Corpus::from_documents(vec![
            doc_from(
                "core/core_rules.instructions.md",
                "title = \"Core\"\npriority = \"P0\"\nalways_include = true",
            ),
            doc_from(
                "learning/other.instructions.md",
                "title = \"Other\"\npriority = \"P2\"\nkeywords = [\"misc\"]",
            ),
        ]);
        let ids: Vec<_> = corpus.always_include().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["core_rules"]);
    }
}
