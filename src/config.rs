// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for iroute
//!
//! Loads configuration from .iroutrc.toml in the current directory or
//! ~/.config/iroute/config.toml

use serde::Deserialize;
use std::path::PathBuf;

/// Default corpus location relative to the working directory.
pub const DEFAULT_INSTRUCTION_DIR: &str = ".iroute/instructions";

/// Configuration loaded from .iroutrc.toml or ~/.config/iroute/config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directories scanned for *.instructions.md files
    pub instruction_dirs: Vec<PathBuf>,
    /// Domains enabled for routing; empty means all domains
    pub enabled_domains: Vec<String>,
    /// Capabilities asserted by this runtime (capability-gated documents
    /// only become candidates when their requirement is listed here or in
    /// the request context)
    pub capabilities: Vec<String>,
    /// Default maximum number of routed instructions
    pub default_limit: Option<usize>,
    /// Evaluation harness thresholds
    pub eval: EvalConfig,
}

/// Pass/fail thresholds for the ground-truth evaluation gate.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub precision_threshold: f64,
    pub recall_threshold: f64,
    pub f1_threshold: f64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            precision_threshold: 0.80,
            recall_threshold: 0.85,
            f1_threshold: 0.82,
        }
    }
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .iroutrc.toml in current directory
    /// 2. ~/.config/iroute/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(&PathBuf::from(".iroutrc.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("iroute").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    pub fn load_from_path(path: &PathBuf) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Resolve instruction directories (CLI wins, then config, then default)
    pub fn merge_instruction_dirs(&self, cli_dirs: &[PathBuf]) -> Vec<PathBuf> {
        if !cli_dirs.is_empty() {
            return cli_dirs.to_vec();
        }
        if !self.instruction_dirs.is_empty() {
            return self.instruction_dirs.clone();
        }
        vec![PathBuf::from(DEFAULT_INSTRUCTION_DIR)]
    }

    /// Merge CLI result limit with config (CLI wins)
    pub fn merge_limit(&self, cli_value: Option<usize>) -> usize {
        cli_value.or(self.default_limit).unwrap_or(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).expect("create");
        write!(
            f,
            r#"
instruction_dirs = ["kb/instructions"]
enabled_domains = ["learning", "github"]
capabilities = ["issue_tracker"]
default_limit = 7

[eval]
precision_threshold = 0.9
"#
        )
        .expect("write");

        let config = Config::load_from_path(&path).expect("load");
        assert_eq!(config.instruction_dirs, vec![PathBuf::from("kb/instructions")]);
        assert_eq!(config.enabled_domains, vec!["learning", "github"]);
        assert_eq!(config.capabilities, vec!["issue_tracker"]);
        assert_eq!(config.merge_limit(None), 7);
        assert_eq!(config.eval.precision_threshold, 0.9);
        // unspecified thresholds keep their defaults
        assert_eq!(config.eval.recall_threshold, 0.85);
    }

    #[test]
    fn cli_values_win_over_config() {
        let config = Config {
            instruction_dirs: vec![PathBuf::from("from-config")],
            default_limit: Some(9),
            ..Config::default()
        };
        assert_eq!(
            config.merge_instruction_dirs(&[PathBuf::from("from-cli")]),
            vec![PathBuf::from("from-cli")]
        );
        assert_eq!(config.merge_limit(Some(3)), 3);
    }

    #[test]
    fn defaults_apply_when_nothing_configured() {
        let config = Config::default();
        assert_eq!(
            config.merge_instruction_dirs(&[]),
            vec![PathBuf::from(DEFAULT_INSTRUCTION_DIR)]
        );
        assert_eq!(config.merge_limit(None), 5);
    }
}
