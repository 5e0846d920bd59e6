//! Configuration document.
//!
//! One JSON document covers repos, storage, policy, indexing, slices and
//! caches. `${NAME}` references are expanded from the environment before
//! parsing; unknown fields and out-of-range values are rejected.

use crate::errors::{CoreError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use slice_engine::EdgeWeights;
use std::path::Path;

/// Upper bound on the indexing worker pool.
pub const MAX_INDEXING_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LedgerConfig {
    pub repos: Vec<RepoConfig>,
    pub db_path: String,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub slice: SliceConfig,
    #[serde(default)]
    pub cache: CacheConfigs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RepoConfig {
    pub repo_id: String,
    pub root_path: String,
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Language names (empty = all built-ins).
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub workspaces: Option<Vec<String>>,
}

fn default_max_file_bytes() -> u64 {
    2 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PolicyConfig {
    pub max_window_lines: usize,
    pub max_window_tokens: usize,
    pub require_identifiers: bool,
    pub allow_break_glass: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_window_lines: 2_000,
            max_window_tokens: 32_000,
            require_identifiers: false,
            allow_break_glass: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct IndexingConfig {
    pub concurrency: usize,
    #[serde(default = "default_per_file_timeout_ms")]
    pub per_file_timeout_ms: u64,
}

fn default_per_file_timeout_ms() -> u64 {
    20_000
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            per_file_timeout_ms: default_per_file_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SliceConfig {
    pub default_max_cards: usize,
    pub default_max_tokens: usize,
    #[serde(default)]
    pub edge_weights: EdgeWeights,
    /// Adaptive confidence-floor tuning.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_floor_raise_step")]
    pub floor_raise_step: f64,
    #[serde(default = "default_floor_relax_step")]
    pub floor_relax_step: f64,
}

fn default_min_confidence() -> f64 {
    0.25
}
fn default_floor_raise_step() -> f64 {
    0.10
}
fn default_floor_relax_step() -> f64 {
    0.05
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            default_max_cards: 24,
            default_max_tokens: 8_000,
            edge_weights: EdgeWeights::default(),
            min_confidence: default_min_confidence(),
            floor_raise_step: default_floor_raise_step(),
            floor_relax_step: default_floor_relax_step(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CacheBudget {
    pub max_entries: usize,
    pub max_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CacheConfigs {
    pub symbol_card: CacheBudget,
    pub graph_slice: CacheBudget,
}

impl Default for CacheConfigs {
    fn default() -> Self {
        Self {
            symbol_card: CacheBudget {
                max_entries: 4_096,
                max_size_bytes: 64 * 1024 * 1024,
            },
            graph_slice: CacheBudget {
                max_entries: 256,
                max_size_bytes: 64 * 1024 * 1024,
            },
        }
    }
}

impl LedgerConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::InvalidConfig(format!("read {}: {e}", path.display()))
        })?;
        Self::load_from_str(&raw)
    }

    pub fn load_from_str(raw: &str) -> Result<Self> {
        let expanded = expand_env(raw)?;
        let config: LedgerConfig = serde_json::from_str(&expanded)
            .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(CoreError::InvalidConfig("dbPath must not be empty".into()));
        }
        if self.indexing.concurrency == 0 || self.indexing.concurrency > MAX_INDEXING_CONCURRENCY {
            return Err(CoreError::InvalidConfig(format!(
                "indexing.concurrency must be in 1..={MAX_INDEXING_CONCURRENCY}"
            )));
        }
        if self.slice.default_max_cards == 0 || self.slice.default_max_tokens == 0 {
            return Err(CoreError::InvalidConfig(
                "slice.defaultMaxCards and slice.defaultMaxTokens must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.slice.min_confidence) {
            return Err(CoreError::InvalidConfig(
                "slice.minConfidence must be within [0, 1]".into(),
            ));
        }
        let weights = &self.slice.edge_weights;
        if weights.call < 0.0 || weights.import < 0.0 || weights.config < 0.0 {
            return Err(CoreError::InvalidConfig(
                "slice.edgeWeights must be non-negative".into(),
            ));
        }
        if self.policy.max_window_tokens == 0 {
            return Err(CoreError::InvalidConfig(
                "policy.maxWindowTokens must be positive".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for repo in &self.repos {
            if repo.repo_id.trim().is_empty() {
                return Err(CoreError::InvalidConfig("repoId must not be empty".into()));
            }
            if !seen.insert(&repo.repo_id) {
                return Err(CoreError::InvalidConfig(format!(
                    "duplicate repoId: {}",
                    repo.repo_id
                )));
            }
            if repo.max_file_bytes == 0 {
                return Err(CoreError::InvalidConfig(format!(
                    "repo {}: maxFileBytes must be positive",
                    repo.repo_id
                )));
            }
            for language in &repo.languages {
                if code_indexer::LanguageKind::parse(language).is_none() {
                    return Err(CoreError::InvalidConfig(format!(
                        "repo {}: unknown language {language}",
                        repo.repo_id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Expand `${NAME}` references from the environment before parsing.
fn expand_env(raw: &str) -> Result<String> {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env pattern");
    let mut missing: Vec<String> = Vec::new();
    let expanded = pattern
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match std::env::var(name) {
                Ok(value) => value,
                Err(_) => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        })
        .into_owned();
    if let Some(name) = missing.first() {
        return Err(CoreError::InvalidConfig(format!(
            "environment variable {name} referenced by config is not set"
        )));
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(db_path: &str) -> String {
        format!(
            r#"{{"repos":[{{"repoId":"r1","rootPath":"/tmp/r1"}}],"dbPath":"{db_path}"}}"#
        )
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config = LedgerConfig::load_from_str(&minimal("/tmp/ledger.db")).unwrap();
        assert_eq!(config.repos.len(), 1);
        assert_eq!(config.indexing.concurrency, 8);
        assert_eq!(config.slice.default_max_cards, 24);
        assert_eq!(config.cache.symbol_card.max_entries, 4_096);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"{"repos":[],"dbPath":"/tmp/x.db","surprise":true}"#;
        assert!(LedgerConfig::load_from_str(raw).is_err());
    }

    #[test]
    fn out_of_range_concurrency_is_rejected() {
        let raw = r#"{"repos":[],"dbPath":"/tmp/x.db","indexing":{"concurrency":64}}"#;
        assert!(LedgerConfig::load_from_str(raw).is_err());
    }

    #[test]
    fn env_references_expand_before_validation() {
        unsafe { std::env::set_var("LEDGER_TEST_DB", "/tmp/expanded.db") };
        let config = LedgerConfig::load_from_str(&minimal("${LEDGER_TEST_DB}")).unwrap();
        assert_eq!(config.db_path, "/tmp/expanded.db");

        let missing = minimal("${LEDGER_TEST_DB_MISSING}");
        assert!(LedgerConfig::load_from_str(&missing).is_err());
    }

    #[test]
    fn unknown_language_is_rejected() {
        let raw = r#"{"repos":[{"repoId":"r1","rootPath":"/r","languages":["cobol"]}],"dbPath":"/tmp/x.db"}"#;
        assert!(LedgerConfig::load_from_str(raw).is_err());
    }
}
