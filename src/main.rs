// SPDX-License-Identifier: MIT OR Apache-2.0

//! iroute - Deterministic instruction routing for AI coding agents
//!
//! Binary entry point: loads configuration, builds the corpus snapshot,
//! and dispatches to the routing, search, lookup, evaluation, or MCP
//! server commands.

mod cli;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use cli::{Cli, Commands, McpCommands, OutputFormat};
use iroute::config::Config;
use iroute::corpus::Corpus;
use iroute::eval;
use iroute::mcp::McpServer;
use iroute::query::{self, GetQuery, RouteRequest};

fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout is reserved for command output and
    // the MCP wire.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = Config::load();
    let format = cli.format.unwrap_or(OutputFormat::Text);
    let compact = cli.compact;

    match cli.command {
        Commands::Route {
            message,
            limit,
            capabilities,
        } => {
            let corpus = load_corpus(&config, &cli.dirs)?;
            let mut effective = config.capabilities.clone();
            for cap in capabilities {
                if !effective.contains(&cap) {
                    effective.push(cap);
                }
            }
            let request = RouteRequest {
                message,
                context: None,
                limit: Some(config.merge_limit(limit)),
            };
            let result = query::route(&corpus, &request, &effective);
            match format {
                OutputFormat::Json => print_json(&result, compact)?,
                OutputFormat::Text => print_routing(&result),
            }
        }

        Commands::Search { query, limit } => {
            let corpus = load_corpus(&config, &cli.dirs)?;
            let hits = query::search(&corpus, &query, limit.unwrap_or(10));
            match format {
                OutputFormat::Json => print_json(&hits, compact)?,
                OutputFormat::Text => {
                    if hits.is_empty() {
                        println!("no matches");
                    }
                    for hit in &hits {
                        println!("{} ({})  score {}", hit.id.bold(), hit.title, hit.score);
                        for m in &hit.matches {
                            println!("  {m}");
                        }
                    }
                }
            }
        }

        Commands::Get {
            topic,
            category,
            exact,
        } => {
            let corpus = load_corpus(&config, &cli.dirs)?;
            let lookup = GetQuery {
                topic,
                category,
                exact_match: exact,
            };
            let hits = query::get(&corpus, &lookup);
            match format {
                OutputFormat::Json => print_json(&hits, compact)?,
                OutputFormat::Text => {
                    if hits.is_empty() {
                        println!("no matching instructions");
                    }
                    for hit in &hits {
                        println!(
                            "{} [{}] {}",
                            hit.id.bold(),
                            hit.domains.join(", "),
                            hit.title
                        );
                    }
                }
            }
        }

        Commands::Eval {
            dataset,
            precision,
            recall,
            f1,
            limit,
        } => {
            let corpus = Arc::new(load_corpus(&config, &cli.dirs)?);
            let dataset = eval::load_dataset(&dataset)
                .with_context(|| "failed to load ground-truth dataset")?;
            let thresholds = eval::Thresholds {
                precision: precision.unwrap_or(config.eval.precision_threshold),
                recall: recall.unwrap_or(config.eval.recall_threshold),
                f1: f1.unwrap_or(config.eval.f1_threshold),
            };
            let report = eval::evaluate(
                corpus,
                &dataset,
                thresholds,
                &config.capabilities,
                config.merge_limit(limit),
            );
            match format {
                OutputFormat::Json => print_json(&report, compact)?,
                OutputFormat::Text => print!("{}", report.render()),
            }
            if !report.passed {
                std::process::exit(1);
            }
        }

        Commands::Mcp {
            command: McpCommands::Serve,
        } => {
            let corpus = Arc::new(load_corpus(&config, &cli.dirs)?);
            let default_limit = config.merge_limit(None);
            let mut server = McpServer::new(corpus, config.capabilities.clone(), default_limit);
            server.run().context("MCP server failed")?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "iroute", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn load_corpus(config: &Config, cli_dirs: &[PathBuf]) -> Result<Corpus> {
    let dirs = config.merge_instruction_dirs(cli_dirs);
    let corpus = Corpus::build(&dirs, &config.enabled_domains)?;
    Ok(corpus)
}

fn print_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{rendered}");
    Ok(())
}

fn print_routing(result: &query::RoutingResult) {
    if result.documents.is_empty() {
        println!("no matching instructions");
        return;
    }
    for doc in &result.documents {
        let id = doc.id.bold();
        match &doc.included_by {
            Some(origin) => println!("{id} ({})  included by {origin}", doc.title),
            None => {
                println!(
                    "{id} ({})  score {}  [{}]",
                    doc.title, doc.score, doc.tier
                );
                if !doc.matched_terms.is_empty() {
                    println!("  matched: {}", doc.matched_terms.join(", "));
                }
            }
        }
    }
}
