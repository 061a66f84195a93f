// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types with helpful suggestions
//!
//! Load errors are fatal: the process refuses to serve requests on a
//! partially loaded corpus. Request-level validation errors are recoverable
//! and reported back to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal corpus loading errors. Any of these aborts startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "instruction directory not found: '{path}'\n\n\
         Suggestion: create the directory or point iroute at an existing one.\n\
         Example: iroute --dir .iroute/instructions route \"...\""
    )]
    DirectoryNotFound { path: PathBuf },

    #[error("failed to read instruction file '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "missing '+++' frontmatter in '{path}'\n\n\
         Instruction files start with a TOML frontmatter block:\n\
         +++\n\
         title = \"...\"\n\
         priority = \"P1\"\n\
         keywords = [\"...\"]\n\
         +++"
    )]
    MissingFrontmatter { path: PathBuf },

    #[error("invalid frontmatter in '{path}': {message}")]
    InvalidFrontmatter { path: PathBuf, message: String },

    #[error(
        "missing required routing field '{field}' in '{path}'\n\n\
         Required fields: title, priority, keywords (keywords may be empty\n\
         only when always_include = true)."
    )]
    MissingField { path: PathBuf, field: &'static str },

    #[error(
        "invalid priority tier '{value}' in '{path}'\n\n\
         Valid tiers: P0, P1, P2"
    )]
    InvalidPriority { path: PathBuf, value: String },

    #[error(
        "keyword '{keyword}' in '{path}' normalizes to nothing\n\n\
         Multi-word keywords must be underscore-joined, e.g. \"learning_loop\".\n\
         Space-separated entries are auto-normalized; entries with no usable\n\
         characters are rejected."
    )]
    UnusableKeyword { path: PathBuf, keyword: String },
}

/// Recoverable request-level validation errors. The protocol adapter maps
/// these onto invalid-params responses; the connection stays open.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("limit must be a positive integer, got {0}")]
    NonPositiveLimit(i64),

    #[error("malformed parameter '{name}': {message}")]
    MalformedParameter {
        name: &'static str,
        message: String,
    },
}

/// Ground-truth dataset errors (evaluation harness).
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read ground-truth dataset '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed ground-truth dataset '{path}': {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("event '{event_id}' has an empty expected_instructions list")]
    EmptyExpectation { event_id: String },
}
