// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instruction document records and frontmatter parsing.
//!
//! Instruction files are markdown with a TOML frontmatter block delimited by
//! `+++` lines:
//!
//! ```text
//! +++
//! title = "Learning loop protocol"
//! priority = "P1"
//! keywords = ["learning_loop", "retrospective"]
//! +++
//! # body...
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::LoadError;

const INSTRUCTION_SUFFIX: &str = ".instructions";

/// Priority tier declared in frontmatter. P0 outranks P1 outranks P2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityTier {
    P0,
    P1,
    P2,
}

impl PriorityTier {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "P0" => Some(Self::P0),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            _ => None,
        }
    }

    /// Fixed score bonus by tier. Part of the load-time priority mapping
    /// table; scoring never re-derives tier weights.
    pub fn base_weight(self) -> u32 {
        match self {
            Self::P0 => 30,
            Self::P1 => 20,
            Self::P2 => 10,
        }
    }

    /// Rank for tie-breaking (lower sorts first).
    pub fn rank(self) -> u8 {
        match self {
            Self::P0 => 0,
            Self::P1 => 1,
            Self::P2 => 2,
        }
    }
}

impl std::fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P0 => write!(f, "P0"),
            Self::P1 => write!(f, "P1"),
            Self::P2 => write!(f, "P2"),
        }
    }
}

/// A single instruction document: routing metadata plus an opaque markdown
/// body. Immutable after load.
#[derive(Debug, Clone, Serialize)]
pub struct InstructionDocument {
    pub id: String,
    pub title: String,
    pub version: String,
    pub description: String,
    pub domains: Vec<String>,
    pub tier: PriorityTier,
    pub routing_priority: u32,
    /// Normalized priority weight: tier base + clamped routing_priority,
    /// reconciled once at load time.
    pub priority_weight: u32,
    pub keywords: Vec<String>,
    pub includes: Vec<String>,
    /// Capability gate: the document is excluded from candidates entirely
    /// unless the caller asserts this capability.
    pub requires: Option<String>,
    pub always_include: bool,
    /// Protected documents cannot be shadowed by a duplicate id, whatever
    /// its version.
    pub protected: bool,
    pub content: String,
    pub source: PathBuf,
}

impl InstructionDocument {
    /// Dot-separated numeric version key for duplicate-revision resolution.
    /// Non-numeric segments compare as 0.
    pub fn version_key(&self) -> Vec<u64> {
        self.version
            .split('.')
            .map(|seg| seg.parse::<u64>().unwrap_or(0))
            .collect()
    }
}

/// Raw frontmatter as written by instruction authors. Unknown fields are
/// tolerated: descriptive/semantic text beyond the routing schema is
/// metadata only.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFrontmatter {
    id: Option<String>,
    title: Option<String>,
    version: Option<String>,
    description: Option<String>,
    domains: Vec<String>,
    priority: Option<String>,
    routing_priority: Option<u32>,
    keywords: Option<Vec<String>>,
    includes: Vec<String>,
    requires: Option<String>,
    always_include: bool,
    protected: bool,
}

static FRONTMATTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A\+\+\+[ \t]*\r?\n(.*?)\r?\n\+\+\+[ \t]*(?:\r?\n(.*))?\z")
        .expect("frontmatter regex")
});

/// Clamp applied to `routing_priority` when folding it into the normalized
/// weight, so the numeric vocabulary can refine but never override the tier.
const ROUTING_PRIORITY_CAP: u32 = 9;

/// Parse one instruction file into a document record.
///
/// Fatal on malformed frontmatter, invalid priority tier, missing required
/// routing fields, and keywords that cannot be auto-normalized.
pub fn parse_instruction_file(path: &Path, content: &str) -> Result<InstructionDocument, LoadError> {
    let captures = FRONTMATTER_RE
        .captures(content)
        .ok_or_else(|| LoadError::MissingFrontmatter {
            path: path.to_path_buf(),
        })?;

    let raw: RawFrontmatter =
        toml::from_str(&captures[1]).map_err(|e| LoadError::InvalidFrontmatter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    let body = captures.get(2).map(|m| m.as_str()).unwrap_or("").trim();

    let title = raw.title.ok_or_else(|| LoadError::MissingField {
        path: path.to_path_buf(),
        field: "title",
    })?;

    let tier_value = raw.priority.ok_or_else(|| LoadError::MissingField {
        path: path.to_path_buf(),
        field: "priority",
    })?;
    let tier = PriorityTier::parse(&tier_value).ok_or_else(|| LoadError::InvalidPriority {
        path: path.to_path_buf(),
        value: tier_value,
    })?;

    let always_include = raw.always_include;
    let raw_keywords = match raw.keywords {
        Some(keywords) => keywords,
        None if always_include => Vec::new(),
        None => {
            return Err(LoadError::MissingField {
                path: path.to_path_buf(),
                field: "keywords",
            })
        }
    };

    let mut keywords = Vec::with_capacity(raw_keywords.len());
    for raw_keyword in &raw_keywords {
        let normalized = normalize_keyword(raw_keyword);
        if normalized.is_empty() {
            return Err(LoadError::UnusableKeyword {
                path: path.to_path_buf(),
                keyword: raw_keyword.clone(),
            });
        }
        if normalized != *raw_keyword {
            tracing::warn!(
                file = %path.display(),
                keyword = %raw_keyword,
                normalized = %normalized,
                "normalized space-containing keyword"
            );
        }
        if !keywords.contains(&normalized) {
            keywords.push(normalized);
        }
    }

    let id = raw.id.unwrap_or_else(|| id_from_path(path));
    let domains = if raw.domains.is_empty() {
        domain_from_path(path).into_iter().collect()
    } else {
        raw.domains
    };

    let routing_priority = raw.routing_priority.unwrap_or(0);
    let priority_weight = tier.base_weight() + routing_priority.min(ROUTING_PRIORITY_CAP);

    Ok(InstructionDocument {
        id,
        title,
        version: raw.version.unwrap_or_else(|| "1.0.0".to_string()),
        description: raw.description.unwrap_or_default(),
        domains,
        tier,
        routing_priority,
        priority_weight,
        keywords,
        includes: raw.includes,
        requires: raw.requires,
        always_include,
        protected: raw.protected,
        content: body.to_string(),
        source: path.to_path_buf(),
    })
}

/// Normalize a keyword entry: lowercase, collapse whitespace runs into
/// underscores, drop everything but alphanumerics and underscores. Spaces in
/// multi-word entries cause substring-collision false positives, so they are
/// never stored raw.
pub fn normalize_keyword(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = true;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            last_underscore = false;
        } else if (ch.is_whitespace() || ch == '_' || ch == '-') && !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn id_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.strip_suffix(INSTRUCTION_SUFFIX)
        .unwrap_or(stem)
        .to_string()
}

fn domain_from_path(path: &Path) -> Option<String> {
    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
        .map(ToOwned::to_owned)
}
