// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// iroute - Deterministic instruction routing for AI coding agents
///
/// Routes free-text messages to the most relevant instruction documents
/// using keyword/phrase matching, priority tiers, and activation rules.
#[derive(Parser, Debug)]
#[command(name = "iroute")]
#[command(
    author,
    version,
    about,
    long_about = None,
    override_usage = "iroute [OPTIONS] <COMMAND>",
    after_help = "Routing quickstart:\n  iroute route \"how do I conduct a learning loop?\"\n  iroute search epic\n  iroute eval --dataset ground_truth.json"
)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Instruction directory (repeatable; overrides config)
    #[arg(short = 'd', long = "dir", global = true)]
    pub dirs: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Result limits must be positive on every surface.
fn parse_limit(value: &str) -> Result<usize, String> {
    let limit: usize = value
        .parse()
        .map_err(|_| "limit must be a positive integer".to_string())?;
    if limit == 0 {
        return Err("limit must be a positive integer, got 0".to_string());
    }
    Ok(limit)
}

#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Run iroute as an MCP stdio server
    #[command(visible_aliases = ["run"])]
    Serve,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Route a message to the most relevant instruction documents
    #[command(
        visible_aliases = ["r"],
        after_help = "Examples:\n  iroute route \"rebase my feature branch\"\n  iroute route -m 3 \"/learning_loop\"\n  iroute route --capability issue_tracker \"close the epic\""
    )]
    Route {
        /// Message to route (natural language or slash command)
        message: String,

        /// Maximum number of scored results
        #[arg(short = 'm', long = "limit", value_parser = parse_limit)]
        limit: Option<usize>,

        /// Assert a capability for this request (repeatable)
        #[arg(long = "capability")]
        capabilities: Vec<String>,
    },

    /// Free-text search across instruction metadata and content
    #[command(visible_aliases = ["s", "find"])]
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'm', long = "limit", value_parser = parse_limit)]
        limit: Option<usize>,
    },

    /// Fetch instruction documents by topic, category, or exact id
    #[command(visible_aliases = ["g"])]
    Get {
        /// Topic or document id to look up
        #[arg(long)]
        topic: Option<String>,

        /// Category (domain) to filter by
        #[arg(long)]
        category: Option<String>,

        /// Treat topic as an exact document id
        #[arg(long)]
        exact: bool,
    },

    /// Replay a ground-truth dataset and gate on accuracy thresholds
    #[command(visible_aliases = ["e"])]
    Eval {
        /// Ground-truth dataset (JSON)
        #[arg(long, default_value = "ground_truth.json")]
        dataset: PathBuf,

        /// Minimum micro-averaged precision
        #[arg(long)]
        precision: Option<f64>,

        /// Minimum micro-averaged recall
        #[arg(long)]
        recall: Option<f64>,

        /// Minimum micro-averaged F1
        #[arg(long)]
        f1: Option<f64>,

        /// Routing limit used when replaying events
        #[arg(short = 'm', long = "limit", value_parser = parse_limit)]
        limit: Option<usize>,
    },

    /// MCP server integration
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
