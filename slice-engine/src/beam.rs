//! Confidence-weighted, budgeted beam search over the symbol graph.
//!
//! Scores flow multiplicatively: `child = parent × weight(type) × confidence
//! × decay`. Ties break by lexicographic symbol ID, so identical inputs
//! produce identical slices on every machine. The confidence floor adapts to
//! candidate pressure within fixed, configured bounds.

use crate::graph::CodeGraph;
use crate::seeds::Seed;
use ledger_store::model::EdgeType;
use ledger_store::rows::SymbolRow;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tracing::debug;

/// Fixed serialization overhead of a slice envelope, in estimated tokens.
pub const BASE_OVERHEAD_TOKENS: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeWeights {
    pub call: f64,
    pub import: f64,
    pub config: f64,
}

impl Default for EdgeWeights {
    fn default() -> Self {
        Self {
            call: 1.0,
            import: 0.7,
            config: 0.5,
        }
    }
}

impl EdgeWeights {
    fn weight(&self, edge_type: EdgeType) -> f64 {
        match edge_type {
            EdgeType::Call => self.call,
            EdgeType::Import => self.import,
            EdgeType::Config => self.config,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SliceBudget {
    pub max_cards: usize,
    pub max_estimated_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct BeamOptions {
    pub budget: SliceBudget,
    pub min_confidence: f64,
    pub weights: EdgeWeights,
    pub decay: f64,
    pub frontier_k: usize,
    /// Floor raise step when candidate influx exceeds 4× the card budget.
    pub raise_step: f64,
    pub raise_cap: f64,
    /// Floor relax step when few candidates survive.
    pub relax_step: f64,
    pub relax_floor: f64,
}

impl Default for BeamOptions {
    fn default() -> Self {
        Self {
            budget: SliceBudget {
                max_cards: 24,
                max_estimated_tokens: 8_000,
            },
            min_confidence: 0.25,
            weights: EdgeWeights::default(),
            decay: 0.85,
            frontier_k: 16,
            raise_step: 0.10,
            raise_cap: 0.80,
            relax_step: 0.05,
            relax_floor: 0.05,
        }
    }
}

/// A scored candidate, either still in the frontier or reported at the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierItem {
    pub symbol_id: String,
    pub score: f64,
    pub why: String,
}

/// A symbol dropped by truncation, ordered by score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedCandidate {
    pub symbol_id: String,
    pub score: f64,
    pub reason: String,
    pub priority: u32,
}

/// A selected member with its admission score and seed provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceCandidate {
    pub symbol_id: String,
    pub score: f64,
    pub why: String,
    pub priority: u32,
}

#[derive(Debug, Clone)]
pub struct BeamOutcome {
    /// Selected members in insertion (score) order.
    pub slice: Vec<SliceCandidate>,
    /// Top-K remaining candidates at termination.
    pub frontier: Vec<FrontierItem>,
    pub truncated: bool,
    pub dropped: Vec<DroppedCandidate>,
}

#[derive(Debug, Clone)]
struct HeapItem {
    symbol_id: String,
    score: f64,
    why: &'static str,
    /// Discrete priority of the seed this candidate descends from.
    priority: u32,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.score.to_bits() == other.score.to_bits() && self.symbol_id == other.symbol_id
    }
}
impl Eq for HeapItem {}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap by score; within a score bucket smaller IDs pop first.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.symbol_id.cmp(&self.symbol_id))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn why_for(edge_type: EdgeType) -> &'static str {
    match edge_type {
        EdgeType::Call => "calls",
        EdgeType::Import => "imports",
        EdgeType::Config => "configures",
    }
}

/// Run the traversal. `estimate` prices a card at the floor detail level;
/// the serializer may spend the remaining budget on richer levels.
pub fn run(
    graph: &CodeGraph,
    seeds: &[Seed],
    opts: &BeamOptions,
    estimate: &dyn Fn(&SymbolRow) -> usize,
) -> BeamOutcome {
    let mut heap: BinaryHeap<HeapItem> = BinaryHeap::new();
    for seed in seeds {
        if graph.contains(&seed.symbol_id) {
            heap.push(HeapItem {
                symbol_id: seed.symbol_id.clone(),
                score: seed.score,
                why: seed.source.why(),
                priority: seed.source.priority(),
            });
        }
    }

    let mut slice: Vec<SliceCandidate> = Vec::new();
    let mut in_slice: HashSet<String> = HashSet::new();
    let mut token_total = BASE_OVERHEAD_TOKENS;
    let mut floor = opts.min_confidence;
    let mut truncated = false;
    let mut dropped: Vec<DroppedCandidate> = Vec::new();

    let mut break_reason: Option<&'static str> = None;
    loop {
        if slice.len() >= opts.budget.max_cards && !heap.is_empty() {
            break_reason = Some("card budget exhausted");
            break;
        }
        let Some(item) = heap.pop() else {
            break;
        };
        if in_slice.contains(&item.symbol_id) {
            continue;
        }
        // Placeholder targets are frontier-visible but never become cards.
        let Some(row) = graph.symbol(&item.symbol_id) else {
            continue;
        };

        let cost = estimate(row);
        if token_total + cost > opts.budget.max_estimated_tokens {
            break_reason = Some("token budget exhausted");
            truncated = true;
            dropped.push(drop_item(item, "token budget exhausted"));
            break;
        }

        token_total += cost;
        in_slice.insert(item.symbol_id.clone());
        slice.push(SliceCandidate {
            symbol_id: item.symbol_id.clone(),
            score: item.score,
            why: item.why.to_string(),
            priority: item.priority,
        });

        // Adaptive floor: damp noisy fan-out, relax when starved.
        if heap.len() > 4 * opts.budget.max_cards {
            floor = (floor + opts.raise_step).min(opts.raise_cap);
        } else if heap.len() < opts.budget.max_cards / 2 && slice.len() < opts.budget.max_cards / 2
        {
            floor = (floor - opts.relax_step).max(opts.relax_floor);
        }

        for (to, edge) in graph.out_edges(&item.symbol_id) {
            if edge.confidence < floor {
                continue;
            }
            if in_slice.contains(to) {
                continue;
            }
            let child_score =
                item.score * opts.weights.weight(edge.edge_type) * edge.confidence * opts.decay;
            heap.push(HeapItem {
                symbol_id: to.to_string(),
                score: child_score,
                why: why_for(edge.edge_type),
                // Provenance priority survives expansion undecayed.
                priority: item.priority,
            });
        }
    }

    // Frontier snapshot: best remaining candidate per symbol, top-K. After a
    // budget break every remaining real candidate is also recorded in the
    // dropped list (score order) — that list is what spillover pages serve.
    let mut frontier: Vec<FrontierItem> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    while let Some(item) = heap.pop() {
        if in_slice.contains(&item.symbol_id) || !seen.insert(item.symbol_id.clone()) {
            continue;
        }
        if frontier.len() < opts.frontier_k {
            frontier.push(FrontierItem {
                symbol_id: item.symbol_id.clone(),
                score: item.score,
                why: item.why.to_string(),
            });
        }
        if let Some(reason) = break_reason {
            if graph.symbol(&item.symbol_id).is_some() {
                truncated = true;
                dropped.push(drop_item(item, reason));
            }
        }
    }

    debug!(
        cards = slice.len(),
        frontier = frontier.len(),
        dropped = dropped.len(),
        truncated,
        final_floor = floor,
        "beam: finished"
    );

    BeamOutcome {
        slice,
        frontier,
        truncated,
        dropped,
    }
}

fn drop_item(item: HeapItem, reason: &str) -> DroppedCandidate {
    DroppedCandidate {
        symbol_id: item.symbol_id,
        score: item.score,
        reason: reason.to_string(),
        priority: item.priority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::SeedSource;
    use ledger_store::model::{ResolutionStrategy, SymbolKind, SymbolRange};
    use ledger_store::rows::{EdgeRow, FileRow, SymbolRow};
    use ledger_store::{IndexCommit, Store};

    fn symbol(id: &str, name: &str) -> SymbolRow {
        SymbolRow {
            symbol_id: id.to_string(),
            repo_id: "r1".to_string(),
            file_id: "f1".to_string(),
            kind: SymbolKind::Function,
            name: name.to_string(),
            exported: true,
            visibility: None,
            language: "typescript".to_string(),
            range: SymbolRange::new(0, 0, 1, 0),
            ast_fingerprint: format!("fp_{id}"),
            signature_json: None,
            summary: None,
            invariants_json: None,
            side_effects_json: None,
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn edge(from: &str, to: &str, confidence: f64) -> EdgeRow {
        EdgeRow {
            repo_id: "r1".to_string(),
            from_symbol_id: from.to_string(),
            to_symbol_id: to.to_string(),
            edge_type: ledger_store::model::EdgeType::Call,
            weight: 1.0,
            confidence,
            resolution_strategy: ResolutionStrategy::SameFile,
            provenance: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn graph_with(symbols: Vec<SymbolRow>, edges: Vec<EdgeRow>) -> CodeGraph {
        let store = Store::open_in_memory().unwrap();
        store.create_repo("r1", "/tmp/r1", None).unwrap();
        let version = store.next_version("r1").unwrap();
        let file = FileRow {
            file_id: "f1".to_string(),
            repo_id: "r1".to_string(),
            rel_path: "a.ts".to_string(),
            content_hash: "h".to_string(),
            language: "typescript".to_string(),
            bytes: 1,
            last_seen_version: version.version_id.clone(),
        };
        store
            .commit_index_run(&IndexCommit {
                repo_id: "r1".to_string(),
                version: Some(version),
                files: vec![file],
                symbols: vec![("f1".to_string(), symbols)],
                purge_edges_from: vec![],
                edges,
            })
            .unwrap();
        CodeGraph::load_bulk(&store, "r1").unwrap()
    }

    fn seed(id: &str) -> Seed {
        Seed {
            symbol_id: id.to_string(),
            source: SeedSource::EntrySymbol,
            score: SeedSource::EntrySymbol.score(),
        }
    }

    fn slice_ids(out: &BeamOutcome) -> Vec<&str> {
        out.slice.iter().map(|c| c.symbol_id.as_str()).collect()
    }

    #[test]
    fn traversal_is_deterministic_and_tie_breaks_by_id() {
        let graph = graph_with(
            vec![
                symbol("id_a", "a"),
                symbol("id_b", "b"),
                symbol("id_c", "c"),
            ],
            vec![edge("id_a", "id_c", 0.9), edge("id_a", "id_b", 0.9)],
        );
        let opts = BeamOptions::default();
        let out1 = run(&graph, &[seed("id_a")], &opts, &|_| 10);
        let out2 = run(&graph, &[seed("id_a")], &opts, &|_| 10);
        assert_eq!(out1.slice, out2.slice);
        // Equal child scores: id_b pops before id_c.
        assert_eq!(slice_ids(&out1), vec!["id_a", "id_b", "id_c"]);
    }

    #[test]
    fn card_budget_truncates_and_reports_drops() {
        let graph = graph_with(
            vec![
                symbol("id_a", "a"),
                symbol("id_b", "b"),
                symbol("id_c", "c"),
                symbol("id_d", "d"),
            ],
            vec![
                edge("id_a", "id_b", 0.9),
                edge("id_a", "id_c", 0.8),
                edge("id_a", "id_d", 0.7),
            ],
        );
        let mut opts = BeamOptions::default();
        opts.budget.max_cards = 2;
        let out = run(&graph, &[seed("id_a")], &opts, &|_| 10);
        assert_eq!(out.slice.len(), 2);
        assert!(out.truncated);
        assert!(!out.dropped.is_empty());
        // Dropped candidates keep the discrete provenance priority of their
        // originating seed while the score carries the decayed value.
        let entry_priority = SeedSource::EntrySymbol.priority();
        assert!(out.dropped.iter().all(|d| d.priority == entry_priority));
        assert!(
            out.dropped
                .iter()
                .all(|d| d.score < SeedSource::EntrySymbol.score())
        );
    }

    #[test]
    fn token_budget_is_never_exceeded() {
        let graph = graph_with(
            vec![
                symbol("id_a", "a"),
                symbol("id_b", "b"),
                symbol("id_c", "c"),
            ],
            vec![edge("id_a", "id_b", 0.9), edge("id_b", "id_c", 0.9)],
        );
        let mut opts = BeamOptions::default();
        opts.budget.max_estimated_tokens = BASE_OVERHEAD_TOKENS + 25;
        let out = run(&graph, &[seed("id_a")], &opts, &|_| 10);
        assert_eq!(out.slice.len(), 2);
        assert!(out.truncated);
    }

    #[test]
    fn low_confidence_edges_are_filtered_by_the_floor() {
        let graph = graph_with(
            vec![symbol("id_a", "a"), symbol("id_b", "b")],
            vec![edge("id_a", "id_b", 0.1)],
        );
        let out = run(&graph, &[seed("id_a")], &BeamOptions::default(), &|_| 10);
        assert_eq!(slice_ids(&out), vec!["id_a"]);
    }

    #[test]
    fn unresolved_placeholders_never_become_cards() {
        let graph = graph_with(
            vec![symbol("id_a", "a")],
            vec![edge("id_a", "unresolved:call:mystery", 0.9)],
        );
        let out = run(&graph, &[seed("id_a")], &BeamOptions::default(), &|_| 10);
        assert_eq!(slice_ids(&out), vec!["id_a"]);
    }
}
