// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory scanning and duplicate-revision resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::LoadError;

use super::document::{parse_instruction_file, InstructionDocument};

const INSTRUCTION_FILE_SUFFIX: &str = ".instructions.md";

/// Scan directories recursively for `*.instructions.md` files and parse
/// every one. Any parse failure is fatal; a corpus is never served
/// partially loaded.
///
/// When `enabled_domains` is non-empty, documents whose domains do not
/// intersect it are skipped after parsing.
pub fn scan_documents(
    dirs: &[PathBuf],
    enabled_domains: &[String],
) -> Result<Vec<InstructionDocument>, LoadError> {
    let mut documents = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            return Err(LoadError::DirectoryNotFound { path: dir.clone() });
        }

        for entry in WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || !is_instruction_file(entry.path()) {
                continue;
            }

            let content =
                std::fs::read_to_string(entry.path()).map_err(|source| LoadError::Unreadable {
                    path: entry.path().to_path_buf(),
                    source,
                })?;
            let doc = parse_instruction_file(entry.path(), &content)?;

            if !enabled_domains.is_empty()
                && !doc.domains.iter().any(|d| enabled_domains.contains(d))
            {
                tracing::debug!(id = %doc.id, "skipping document outside enabled domains");
                continue;
            }

            documents.push(doc);
        }
    }

    Ok(resolve_duplicates(documents))
}

fn is_instruction_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(INSTRUCTION_FILE_SUFFIX))
}

/// Collapse documents sharing a logical id to a single deterministic
/// winner. A protected document cannot be shadowed; otherwise the highest
/// version (numeric dot-segment comparison) wins, ties broken by lexically
/// greatest source path. Conflicts are logged, never silent.
fn resolve_duplicates(documents: Vec<InstructionDocument>) -> Vec<InstructionDocument> {
    let mut winners: BTreeMap<String, InstructionDocument> = BTreeMap::new();

    for doc in documents {
        match winners.remove(&doc.id) {
            None => {
                winners.insert(doc.id.clone(), doc);
            }
            Some(existing) => {
                let challenger_key = (doc.protected, doc.version_key(), doc.source.clone());
                let existing_key = (
                    existing.protected,
                    existing.version_key(),
                    existing.source.clone(),
                );
                let (winner, dropped) = if challenger_key > existing_key {
                    (doc, existing.source)
                } else {
                    (existing, doc.source)
                };
                tracing::warn!(
                    id = %winner.id,
                    kept = %winner.source.display(),
                    dropped = %dropped.display(),
                    "duplicate instruction id, keeping highest revision"
                );
                winners.insert(winner.id.clone(), winner);
            }
        }
    }

    winners.into_values().collect()
}
