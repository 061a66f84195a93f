// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ground-truth evaluation harness.
//!
//! Replays a fixed dataset of query/expectation events through the routing
//! engine and computes precision/recall/F1. Aggregation is micro-averaged:
//! tp/fp/fn are summed across events and the metrics computed once. The
//! mean of per-event F1s is a different (and rejected) convention.

use colored::Colorize;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::corpus::Corpus;
use crate::errors::DatasetError;
use crate::query::{route, RequestContext, RouteRequest};

/// Tag marking an event whose expectations must be recalled perfectly.
const CRITICAL_TAG: &str = "critical";

/// Ground-truth dataset: `{version, events: [...]}`.
#[derive(Debug, Deserialize)]
pub struct GroundTruthSet {
    pub version: String,
    pub events: Vec<GroundTruthEvent>,
}

/// One replayable event: a query and the instruction ids it must route to.
#[derive(Debug, Deserialize)]
pub struct GroundTruthEvent {
    pub id: String,
    pub query: String,
    #[serde(default)]
    pub category: String,
    pub expected_instructions: Vec<String>,
    #[serde(default)]
    pub context: Option<RequestContext>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl GroundTruthEvent {
    pub fn is_critical(&self) -> bool {
        self.tags.iter().any(|t| t == CRITICAL_TAG)
    }
}

/// Pass/fail thresholds for the aggregate gate.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Per-event score.
#[derive(Debug, Serialize)]
pub struct EventScore {
    pub event_id: String,
    pub category: String,
    pub critical: bool,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub missed: Vec<String>,
    pub unexpected: Vec<String>,
}

/// Micro-averaged aggregate over all events.
#[derive(Debug, Default, Serialize)]
pub struct AggregateScore {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Full evaluation output with the gate verdict.
#[derive(Debug, Serialize)]
pub struct ScoreReport {
    pub dataset_version: String,
    pub events: Vec<EventScore>,
    pub aggregate: AggregateScore,
    pub passed: bool,
    pub failures: Vec<String>,
}

/// Load a ground-truth dataset from disk. Events with empty expectation
/// lists are rejected.
pub fn load_dataset(path: &Path) -> Result<GroundTruthSet, DatasetError> {
    let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset: GroundTruthSet =
        serde_json::from_str(&content).map_err(|e| DatasetError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    for event in &dataset.events {
        if event.expected_instructions.is_empty() {
            return Err(DatasetError::EmptyExpectation {
                event_id: event.id.clone(),
            });
        }
    }
    Ok(dataset)
}

/// Run every event through the engine and gate the aggregate.
///
/// Events run in parallel over a shared corpus snapshot; per-event tallies
/// are merged once at the end, then metrics are computed from the sums.
pub fn evaluate(
    corpus: Arc<Corpus>,
    dataset: &GroundTruthSet,
    thresholds: Thresholds,
    capabilities: &[String],
    limit: usize,
) -> ScoreReport {
    let mut events: Vec<EventScore> = dataset
        .events
        .par_iter()
        .map(|event| score_event(&corpus, event, capabilities, limit))
        .collect();
    events.sort_by(|a, b| a.event_id.cmp(&b.event_id));

    let mut aggregate = AggregateScore::default();
    for event in &events {
        aggregate.true_positives += event.true_positives;
        aggregate.false_positives += event.false_positives;
        aggregate.false_negatives += event.false_negatives;
    }
    aggregate.precision = ratio(
        aggregate.true_positives,
        aggregate.true_positives + aggregate.false_positives,
    );
    aggregate.recall = ratio(
        aggregate.true_positives,
        aggregate.true_positives + aggregate.false_negatives,
    );
    aggregate.f1 = f1(aggregate.precision, aggregate.recall);

    let mut failures = Vec::new();
    if aggregate.precision < thresholds.precision {
        failures.push(format!(
            "precision {:.3} below threshold {:.3}",
            aggregate.precision, thresholds.precision
        ));
    }
    if aggregate.recall < thresholds.recall {
        failures.push(format!(
            "recall {:.3} below threshold {:.3}",
            aggregate.recall, thresholds.recall
        ));
    }
    if aggregate.f1 < thresholds.f1 {
        failures.push(format!(
            "f1 {:.3} below threshold {:.3}",
            aggregate.f1, thresholds.f1
        ));
    }
    for event in &events {
        if event.critical && event.recall < 1.0 {
            failures.push(format!(
                "critical event '{}' missed: {}",
                event.event_id,
                event.missed.join(", ")
            ));
        }
    }

    ScoreReport {
        dataset_version: dataset.version.clone(),
        passed: failures.is_empty(),
        events,
        aggregate,
        failures,
    }
}

fn score_event(
    corpus: &Corpus,
    event: &GroundTruthEvent,
    capabilities: &[String],
    limit: usize,
) -> EventScore {
    let request = RouteRequest {
        message: event.query.clone(),
        context: event.context.clone(),
        limit: Some(limit),
    };
    let result = route(corpus, &request, capabilities);

    let actual: BTreeSet<&str> = result.documents.iter().map(|d| d.id.as_str()).collect();
    let expected: BTreeSet<&str> = event
        .expected_instructions
        .iter()
        .map(String::as_str)
        .collect();

    let true_positives = expected.intersection(&actual).count();
    let false_positives = actual.difference(&expected).count();
    let false_negatives = expected.difference(&actual).count();

    let precision = ratio(true_positives, true_positives + false_positives);
    let recall = ratio(true_positives, true_positives + false_negatives);

    EventScore {
        event_id: event.id.clone(),
        category: event.category.clone(),
        critical: event.is_critical(),
        true_positives,
        false_positives,
        false_negatives,
        precision,
        recall,
        f1: f1(precision, recall),
        missed: expected
            .difference(&actual)
            .map(|s| s.to_string())
            .collect(),
        unexpected: actual
            .difference(&expected)
            .map(|s| s.to_string())
            .collect(),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl ScoreReport {
    /// Human-readable report for terminal output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} (dataset v{}, {} events)\n\n",
            "Routing accuracy".bold(),
            self.dataset_version,
            self.events.len()
        ));

        for event in &self.events {
            let marker = if event.false_negatives == 0 && event.false_positives == 0 {
                "ok".green()
            } else if event.critical && event.recall < 1.0 {
                "CRITICAL MISS".red().bold()
            } else {
                "partial".yellow()
            };
            out.push_str(&format!(
                "  {:<24} P {:.2}  R {:.2}  F1 {:.2}  [{}]\n",
                event.event_id, event.precision, event.recall, event.f1, marker
            ));
            if !event.missed.is_empty() {
                out.push_str(&format!(
                    "    missed: {}\n",
                    event.missed.join(", ").red()
                ));
            }
            if !event.unexpected.is_empty() {
                out.push_str(&format!(
                    "    unexpected: {}\n",
                    event.unexpected.join(", ").yellow()
                ));
            }
        }

        out.push_str(&format!(
            "\n{}: P {:.3}  R {:.3}  F1 {:.3}\n",
            "aggregate (micro)".bold(),
            self.aggregate.precision,
            self.aggregate.recall,
            self.aggregate.f1
        ));
        if self.passed {
            out.push_str(&format!("{}\n", "PASS".green().bold()));
        } else {
            out.push_str(&format!("{}\n", "FAIL".red().bold()));
            for failure in &self.failures {
                out.push_str(&format!("  {failure}\n"));
            }
        }
        out
    }
}
