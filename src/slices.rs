//! Slice building, refresh and spillover operations.
//!
//! `build_slice` wires the whole §slice path: seed resolution, graph load
//! (bulk or neighborhood), beam search, detail-level fitting, card
//! projection, wire encoding and handle leasing. Results are deterministic
//! given `(version, request)` and cached under the version they were built
//! at.

use crate::errors::{CoreError, Result};
use crate::ledger::Ledger;
use code_indexer::ids;
use ledger_store::rows::SymbolRow;
use serde::{Deserialize, Serialize};
use slice_engine::beam::{self, BASE_OVERHEAD_TOKENS, BeamOptions, DroppedCandidate};
use slice_engine::cards::{
    CardDetailDecision, DetailLevel, DetailLevelMetadata, estimate_tokens, fit_level,
};
use slice_engine::graph::{BULK_THRESHOLD, CodeGraph, NeighborhoodOptions};
use slice_engine::session::{self, Lease, RefreshOutcome, SliceMember, SpilloverPage};
use slice_engine::wire::{self, DEFAULT_WIRE_VERSION, Slice, SliceEdge, Truncation};
use slice_engine::{CacheKey, SeedInputs, SliceBudget, resolve_seeds};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SliceRequest {
    pub repo_id: String,
    #[serde(default)]
    pub entry_symbols: Vec<String>,
    #[serde(default)]
    pub task_text: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<String>,
    #[serde(default)]
    pub failing_test_path: Option<String>,
    #[serde(default)]
    pub edited_files: Vec<String>,
    #[serde(default)]
    pub budget: Option<SliceBudget>,
    #[serde(default)]
    pub detail_level: Option<DetailLevel>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
    #[serde(default)]
    pub wire_format_version: Option<u8>,
    #[serde(default)]
    pub break_glass: bool,
}

/// Fully built slice plus the dropped list backing spillover; this is the
/// slice-cache value.
#[derive(Debug, Clone)]
pub struct BuiltSlice {
    pub slice: Slice,
    pub dropped: Vec<DroppedCandidate>,
    pub members: Vec<SliceMember>,
}

#[derive(Debug, Clone)]
pub struct SliceResponse {
    pub payload: serde_json::Value,
    pub lease: Lease,
    pub version: String,
    pub truncation: Truncation,
    pub detail_level_metadata: DetailLevelMetadata,
}

#[derive(Debug, Clone)]
pub enum RefreshResponse {
    NotModified {
        lease: Lease,
    },
    Modified {
        delta: slice_engine::SliceDelta,
        lease: Lease,
    },
}

impl Ledger {
    pub async fn build_slice(&self, request: &SliceRequest) -> Result<SliceResponse> {
        self.require_repo(&request.repo_id)?;
        let version = self.latest_version(&request.repo_id)?;
        let budget = self.effective_budget(request)?;
        let wire_version = request.wire_format_version.unwrap_or(DEFAULT_WIRE_VERSION);

        let inputs = SeedInputs {
            entry_symbols: request.entry_symbols.clone(),
            stack_trace: request.stack_trace.clone(),
            failing_test_path: request.failing_test_path.clone(),
            edited_files: request.edited_files.clone(),
            task_text: request.task_text.clone(),
        };
        if inputs.is_empty() {
            if self.config().policy.require_identifiers {
                return Err(CoreError::PolicyDenied {
                    reason: "request carries no identifiers".to_string(),
                    next_best_action: "provide entrySymbols, a stack trace, edited files or task text"
                        .to_string(),
                });
            }
            return Err(CoreError::NoSymbols);
        }

        // Deterministic request identity for the slice cache.
        let cache_key = CacheKey::new(
            &request.repo_id,
            &format!("slice:{}", request_hash(request, budget)),
            &version.version_id,
        );
        if let Some(built) = self.slice_cache.get(&cache_key) {
            debug!(repo = %request.repo_id, "slice: cache hit");
            return self.respond(&built, wire_version);
        }

        let built = self.assemble_slice(request, &version.version_id, budget, &inputs)?;
        let built = Arc::new(built);
        let bytes = serde_json::to_string(&built.slice)
            .map(|s| s.len())
            .unwrap_or(4096);
        self.slice_cache.put(cache_key, built.clone(), bytes);
        self.respond(&built, wire_version)
    }

    fn effective_budget(&self, request: &SliceRequest) -> Result<SliceBudget> {
        let slice_config = &self.config().slice;
        let budget = request.budget.unwrap_or(SliceBudget {
            max_cards: slice_config.default_max_cards,
            max_estimated_tokens: slice_config.default_max_tokens,
        });
        let policy = &self.config().policy;
        let break_glass = request.break_glass && policy.allow_break_glass;
        if budget.max_estimated_tokens > policy.max_window_tokens && !break_glass {
            return Err(CoreError::PolicyDenied {
                reason: format!(
                    "budget.maxEstimatedTokens {} exceeds the policy cap {}",
                    budget.max_estimated_tokens, policy.max_window_tokens
                ),
                next_best_action: format!(
                    "retry with budget.maxEstimatedTokens <= {}",
                    policy.max_window_tokens
                ),
            });
        }
        if budget.max_cards == 0 || budget.max_estimated_tokens == 0 {
            return Err(CoreError::PolicyDenied {
                reason: "budget must be positive".to_string(),
                next_best_action: "set budget.maxCards and budget.maxEstimatedTokens above zero"
                    .to_string(),
            });
        }
        Ok(budget)
    }

    fn assemble_slice(
        &self,
        request: &SliceRequest,
        version_id: &str,
        budget: SliceBudget,
        inputs: &SeedInputs,
    ) -> Result<BuiltSlice> {
        let store = self.store();
        let seeds = resolve_seeds(store, &request.repo_id, inputs)?;
        if seeds.is_empty() {
            return Err(CoreError::NoSymbols);
        }

        let graph = if store.count_symbols(&request.repo_id)? < BULK_THRESHOLD {
            CodeGraph::load_bulk(store, &request.repo_id)?
        } else {
            let seed_ids: Vec<String> = seeds.iter().map(|s| s.symbol_id.clone()).collect();
            CodeGraph::load_neighborhood(
                store,
                &request.repo_id,
                &seed_ids,
                &NeighborhoodOptions::default(),
            )?
        };

        let slice_config = &self.config().slice;
        let opts = BeamOptions {
            budget,
            min_confidence: request.min_confidence.unwrap_or(slice_config.min_confidence),
            weights: slice_config.edge_weights,
            raise_step: slice_config.floor_raise_step,
            relax_step: slice_config.floor_relax_step,
            ..BeamOptions::default()
        };
        // The beam admits cards priced at the floor level; the serializer
        // spends whatever budget remains on richer detail.
        let outcome = beam::run(&graph, &seeds, &opts, &|row| {
            estimate_tokens(row, DetailLevel::Minimal)
        });
        if outcome.slice.is_empty() {
            return Err(CoreError::NoSymbols);
        }

        let requested = request.detail_level.unwrap_or(DetailLevel::Compact);
        let mut selected = outcome.slice;
        let mut dropped = outcome.dropped;
        let mut truncated = outcome.truncated;

        // Highest detail level whose total fits; shed tail cards if even
        // minimal cannot fit. Shed members keep their admission score and
        // seed-provenance priority in the dropped list.
        let effective = loop {
            let rows: Vec<&SymbolRow> = selected
                .iter()
                .filter_map(|c| graph.symbol(&c.symbol_id))
                .collect();
            let (level, _) = fit_level(
                &rows,
                requested,
                budget.max_estimated_tokens,
                BASE_OVERHEAD_TOKENS,
            );
            let total: usize = BASE_OVERHEAD_TOKENS
                + rows.iter().map(|r| estimate_tokens(r, level)).sum::<usize>();
            if total <= budget.max_estimated_tokens {
                break level;
            }
            let Some(shed) = selected.pop() else {
                break DetailLevel::Minimal;
            };
            truncated = true;
            dropped.insert(
                0,
                DroppedCandidate {
                    symbol_id: shed.symbol_id,
                    score: shed.score,
                    reason: "token budget exhausted".to_string(),
                    priority: shed.priority,
                },
            );
        };
        if selected.is_empty() {
            return Err(CoreError::NoSymbols);
        }
        let member_ids: Vec<String> = selected.iter().map(|c| c.symbol_id.clone()).collect();
        let budget_adaptive = effective != requested;

        // Project cards at the effective level.
        let mut cards = Vec::with_capacity(member_ids.len());
        let mut members = Vec::with_capacity(member_ids.len());
        let mut per_card = Vec::with_capacity(member_ids.len());
        for id in &member_ids {
            let Some(card) = self.project_card_at(&request.repo_id, id, version_id, effective)?
            else {
                continue;
            };
            members.push(SliceMember {
                symbol_id: card.symbol_id.clone(),
                etag: card.etag.clone(),
                detail: effective,
            });
            per_card.push(CardDetailDecision {
                symbol_id: card.symbol_id.clone(),
                requested,
                effective,
                downgraded: budget_adaptive,
            });
            cards.push(card);
        }
        if cards.is_empty() {
            return Err(CoreError::NoSymbols);
        }

        // Edges among slice members (unresolved placeholders included as
        // targets so consumers see dangling calls).
        let member_set: std::collections::HashSet<&str> =
            member_ids.iter().map(String::as_str).collect();
        let mut edges = Vec::new();
        for id in &member_ids {
            for (to, data) in graph.out_edges(id) {
                let target_in_slice = member_set.contains(to);
                let target_is_placeholder = graph.symbol(to).is_none();
                if target_in_slice || target_is_placeholder {
                    edges.push(SliceEdge {
                        from: id.clone(),
                        to: to.to_string(),
                        edge_type: data.edge_type,
                        confidence: data.confidence,
                    });
                }
            }
        }

        let slice = Slice {
            repo_id: request.repo_id.clone(),
            version: version_id.to_string(),
            cards,
            edges,
            frontier: outcome.frontier,
            truncation: Truncation {
                truncated,
                dropped: dropped.len(),
            },
            detail_level_metadata: DetailLevelMetadata {
                requested,
                effective,
                budget_adaptive,
                per_card,
            },
        };
        info!(
            repo = %request.repo_id,
            version = version_id,
            cards = slice.cards.len(),
            edges = slice.edges.len(),
            truncated,
            effective = effective.as_str(),
            "slice: built"
        );
        Ok(BuiltSlice {
            slice,
            dropped,
            members,
        })
    }

    fn respond(&self, built: &BuiltSlice, wire_version: u8) -> Result<SliceResponse> {
        let handle = session::create_handle(
            self.store(),
            &built.slice.repo_id,
            &built.slice.version,
            &built.members,
            &built.dropped,
        )
        .map_err(CoreError::from)?;
        let payload = wire::encode(&built.slice, wire_version).map_err(CoreError::from)?;
        Ok(SliceResponse {
            payload,
            lease: Lease {
                handle: handle.handle,
                expires_at: handle.expires_at,
            },
            version: built.slice.version.clone(),
            truncation: built.slice.truncation.clone(),
            detail_level_metadata: built.slice.detail_level_metadata.clone(),
        })
    }

    /// Refresh a leased slice: either the lease alone (same version) or a
    /// symbol-level delta against the current version.
    pub async fn refresh_slice(
        &self,
        handle: &str,
        _known_version: Option<&str>,
    ) -> Result<RefreshResponse> {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let row = self
            .store()
            .get_slice_handle(handle, &now)?
            .ok_or_else(|| CoreError::HandleExpired(handle.to_string()))?;
        let current = self.latest_version(&row.repo_id)?;

        let repo_id = row.repo_id.clone();
        let outcome = session::refresh_handle(
            self.store(),
            handle,
            &current.version_id,
            |member: &SliceMember| {
                self.project_card_at(
                    &repo_id,
                    &member.symbol_id,
                    &current.version_id,
                    member.detail,
                )
                .map(|card| card.map(|c| c.etag))
                .map_err(|e| slice_engine::Error::Projection(e.to_string()))
            },
        )
        .map_err(CoreError::from)?;

        Ok(match outcome {
            RefreshOutcome::NotModified { lease } => RefreshResponse::NotModified { lease },
            RefreshOutcome::Modified { delta, lease } => {
                RefreshResponse::Modified { delta, lease }
            }
        })
    }

    /// One cursor-paginated page of a handle's recorded spillover.
    pub async fn get_spillover(
        &self,
        handle: &str,
        cursor: Option<&str>,
        page_size: Option<usize>,
    ) -> Result<SpilloverPage> {
        session::spillover_page(self.store(), handle, cursor, page_size).map_err(CoreError::from)
    }
}

/// Canonical request identity: the fields that influence slice content.
fn request_hash(request: &SliceRequest, budget: SliceBudget) -> String {
    let canonical = serde_json::json!({
        "entry_symbols": request.entry_symbols,
        "task_text": request.task_text,
        "stack_trace": request.stack_trace,
        "failing_test_path": request.failing_test_path,
        "edited_files": request.edited_files,
        "max_cards": budget.max_cards,
        "max_tokens": budget.max_estimated_tokens,
        "detail": request.detail_level.map(|d| d.as_str()),
        "min_confidence": request.min_confidence,
    });
    let mut hash = ids::sha256_hex(canonical.to_string().as_bytes());
    hash.truncate(32);
    hash
}
