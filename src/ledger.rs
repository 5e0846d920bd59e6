//! Process context and the small core operations.
//!
//! A [`Ledger`] owns the storage handle, the adapter registry and the two
//! process-wide caches; every exposed operation goes through it rather than
//! ambient module state. Slice building lives in the `slices` module.

use crate::config::{LedgerConfig, RepoConfig};
use crate::errors::{CoreError, Result};
use code_indexer::{
    AdapterRegistry, IndexMode, IndexOptions, IndexStats, ProgressFn, RepoSpec, ScanFilters,
};
use ledger_store::Store;
use ledger_store::rows::{SymbolRow, VersionRow};
use slice_engine::cards::{self, DetailLevel, SymbolCard};
use slice_engine::graph::EdgeData;
use slice_engine::{CacheKey, VersionCache};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::slices::BuiltSlice;

/// Outcome of a `getCard` call.
#[derive(Debug, Clone)]
pub enum CardOutcome {
    Card(Box<SymbolCard>),
    NotModified { etag: String },
}

pub struct Ledger {
    config: LedgerConfig,
    store: Arc<Store>,
    registry: Arc<AdapterRegistry>,
    pub(crate) card_cache: VersionCache<SymbolCard>,
    pub(crate) slice_cache: VersionCache<Arc<BuiltSlice>>,
}

impl Ledger {
    /// Open storage, register built-in adapters, size the caches, and make
    /// sure every configured repo has its row.
    pub fn open(config: LedgerConfig) -> Result<Self> {
        let store = Arc::new(Store::open(Path::new(&config.db_path))?);
        for repo in &config.repos {
            store.create_repo(&repo.repo_id, &repo.root_path, None)?;
        }
        let card_budget = config.cache.symbol_card;
        let slice_budget = config.cache.graph_slice;
        let ledger = Self {
            store,
            registry: Arc::new(AdapterRegistry::with_builtins()),
            card_cache: VersionCache::new(card_budget.max_entries, card_budget.max_size_bytes),
            slice_cache: VersionCache::new(slice_budget.max_entries, slice_budget.max_size_bytes),
            config,
        };
        info!(repos = ledger.config.repos.len(), "ledger: opened");
        Ok(ledger)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn repo_config(&self, repo_id: &str) -> Result<&RepoConfig> {
        self.config
            .repos
            .iter()
            .find(|r| r.repo_id == repo_id)
            .ok_or_else(|| CoreError::InvalidRepo(repo_id.to_string()))
    }

    pub(crate) fn require_repo(&self, repo_id: &str) -> Result<()> {
        if self.store.get_repo(repo_id)?.is_none() {
            return Err(CoreError::InvalidRepo(repo_id.to_string()));
        }
        Ok(())
    }

    pub(crate) fn latest_version(&self, repo_id: &str) -> Result<VersionRow> {
        self.store
            .get_latest_version(repo_id)?
            .ok_or_else(|| CoreError::NoVersion(repo_id.to_string()))
    }

    /// Index one configured repo; on success the previous version's cache
    /// entries are invalidated (ordered after the commit).
    pub async fn index_repo(
        &self,
        repo_id: &str,
        mode: IndexMode,
        progress: Option<ProgressFn>,
    ) -> Result<IndexStats> {
        let repo = self.repo_config(repo_id)?;
        let spec = RepoSpec {
            repo_id: repo.repo_id.clone(),
            root_path: PathBuf::from(&repo.root_path),
            filters: ScanFilters {
                ignore: merged_ignore(repo),
                workspaces: repo.workspaces.clone().unwrap_or_default(),
                languages: repo
                    .languages
                    .iter()
                    .filter_map(|l| code_indexer::LanguageKind::parse(l))
                    .collect(),
                max_file_bytes: repo.max_file_bytes,
            },
        };
        let opts = IndexOptions {
            mode,
            concurrency: self.config.indexing.concurrency,
            per_file_timeout: Duration::from_millis(self.config.indexing.per_file_timeout_ms),
        };

        let stats =
            code_indexer::index_repo(&self.store, &self.registry, &spec, &opts, progress).await?;

        if let Some(prior) = &stats.prior_version {
            self.card_cache.invalidate_version(prior);
            self.slice_cache.invalidate_version(prior);
        }
        Ok(stats)
    }

    /// Ordered symbol search (prefix first, then substring).
    pub fn search_symbols(
        &self,
        repo_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SymbolRow>> {
        self.require_repo(repo_id)?;
        Ok(self.store.search_symbols(repo_id, query, limit)?)
    }

    /// Card retrieval with ETag validation; cached per `(symbol, version)`.
    pub async fn get_card(
        &self,
        repo_id: &str,
        symbol_id: &str,
        known_etag: Option<&str>,
    ) -> Result<CardOutcome> {
        self.require_repo(repo_id)?;
        let version = self.latest_version(repo_id)?;
        let card = self
            .project_card_at(repo_id, symbol_id, &version.version_id, DetailLevel::Compact)?
            .ok_or_else(|| CoreError::internal(format!("unknown symbol {symbol_id}")))?;
        if known_etag == Some(card.etag.as_str()) {
            return Ok(CardOutcome::NotModified { etag: card.etag });
        }
        Ok(CardOutcome::Card(Box::new(card)))
    }

    /// Exported for tests and operations tooling.
    pub fn invalidate_version(&self, version_id: &str) {
        self.card_cache.invalidate_version(version_id);
        self.slice_cache.invalidate_version(version_id);
    }

    /// `(symbol-card, slice)` cache counters.
    pub fn cache_stats(&self) -> (slice_engine::CacheStatsSnapshot, slice_engine::CacheStatsSnapshot) {
        (self.card_cache.stats(), self.slice_cache.stats())
    }

    /// Scheduled sweep of expired slice handles.
    pub fn sweep_expired_handles(&self) -> Result<usize> {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        Ok(self.store.delete_expired_slice_handles(&now)?)
    }

    /// Project (or fetch from cache) one symbol card at a detail level.
    /// Returns `None` for unknown symbols or symbols of another repo.
    pub(crate) fn project_card_at(
        &self,
        repo_id: &str,
        symbol_id: &str,
        version_id: &str,
        level: DetailLevel,
    ) -> Result<Option<SymbolCard>> {
        let key = CacheKey::new(
            repo_id,
            &format!("card:{symbol_id}@{}", level.as_str()),
            version_id,
        );
        if let Some(card) = self.card_cache.get(&key) {
            return Ok(Some(card));
        }

        let Some(row) = self.store.get_symbol(symbol_id)? else {
            return Ok(None);
        };
        if row.repo_id != repo_id {
            return Ok(None);
        }
        let rel_path = self
            .store
            .get_file_by_id(&row.file_id)?
            .map(|f| f.rel_path)
            .unwrap_or_default();
        let edges = self.store.get_edges_from(symbol_id)?;
        let edge_refs: Vec<(&str, EdgeData)> = edges
            .iter()
            .map(|e| {
                (
                    e.to_symbol_id.as_str(),
                    EdgeData {
                        edge_type: e.edge_type,
                        weight: e.weight,
                        confidence: e.confidence,
                    },
                )
            })
            .collect();
        let metrics = self.store.get_metrics(symbol_id)?;

        let card = cards::project_card(&row, &rel_path, &edge_refs, metrics.as_ref(), level, version_id)
            .map_err(CoreError::from)?;
        let bytes = serde_json::to_string(&card)
            .map(|s| s.len())
            .unwrap_or(1024);
        self.card_cache.put(key, card.clone(), bytes);
        Ok(Some(card))
    }
}

fn merged_ignore(repo: &RepoConfig) -> Vec<String> {
    let mut ignore = ScanFilters::default().ignore;
    ignore.extend(repo.ignore.iter().cloned());
    ignore
}
