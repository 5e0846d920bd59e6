//! In-memory symbol graph loader.
//!
//! The graph is an arena of symbol IDs (petgraph node indices) with adjacency
//! kept on the edges; symbol rows are borrowed into a side map so placeholder
//! targets (`unresolved:call:*`) can exist as vertices without rows. The
//! structure is immutable after load and safe to share across readers.

use crate::errors::Result;
use ledger_store::Store;
use ledger_store::model::{EdgeType, UNRESOLVED_CALL_PREFIX};
use ledger_store::rows::{EdgeRow, FileRow, SymbolRow};
use petgraph::Direction as PetDirection;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;
use tracing::info;

/// Repos below this symbol count load in one sweep.
pub const BULK_THRESHOLD: u64 = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Bulk,
    Neighborhood,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

#[derive(Debug, Clone)]
pub struct NeighborhoodOptions {
    pub max_hops: usize,
    pub direction: Direction,
    pub max_symbols: usize,
}

impl Default for NeighborhoodOptions {
    fn default() -> Self {
        Self {
            max_hops: 2,
            direction: Direction::Both,
            max_symbols: 200_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeData {
    pub edge_type: EdgeType,
    pub weight: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct GraphStats {
    pub mode: LoadMode,
    pub symbols_loaded: usize,
    pub duration_ms: u64,
    pub hops_reached: usize,
}

pub struct CodeGraph {
    graph: DiGraph<String, EdgeData>,
    index: HashMap<String, NodeIndex>,
    symbols: HashMap<String, SymbolRow>,
    files: HashMap<String, FileRow>,
    stats: GraphStats,
}

impl CodeGraph {
    /// One sweep per table; used below [`BULK_THRESHOLD`].
    pub fn load_bulk(store: &Store, repo_id: &str) -> Result<CodeGraph> {
        let started = Instant::now();
        let symbol_rows = store.get_symbols_by_repo(repo_id)?;
        let edge_rows = store.get_edges_by_repo(repo_id)?;
        let file_rows = store.get_files(repo_id)?;

        let mut graph = Self::assemble(symbol_rows, edge_rows, file_rows);
        graph.stats = GraphStats {
            mode: LoadMode::Bulk,
            symbols_loaded: graph.symbols.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            hops_reached: 0,
        };
        info!(
            mode = "bulk",
            symbols_loaded = graph.stats.symbols_loaded,
            duration_ms = graph.stats.duration_ms,
            "graph: loaded"
        );
        Ok(graph)
    }

    /// Breadth-first expansion from a seed set, capped by hops and symbols.
    pub fn load_neighborhood(
        store: &Store,
        repo_id: &str,
        seeds: &[String],
        opts: &NeighborhoodOptions,
    ) -> Result<CodeGraph> {
        let started = Instant::now();

        let mut wanted: HashSet<String> = seeds.iter().cloned().collect();
        let mut frontier: VecDeque<String> = seeds.iter().cloned().collect();
        let mut edge_rows: Vec<EdgeRow> = Vec::new();
        let mut hops_reached = 0usize;

        for hop in 0..opts.max_hops {
            if frontier.is_empty() || wanted.len() >= opts.max_symbols {
                break;
            }
            hops_reached = hop + 1;
            let batch: Vec<String> = frontier.drain(..).collect();
            let mut next: Vec<String> = Vec::new();

            if opts.direction != Direction::In {
                for edge in store.get_edges_from_symbols(&batch)? {
                    if wanted.insert(edge.to_symbol_id.clone()) {
                        next.push(edge.to_symbol_id.clone());
                    }
                    edge_rows.push(edge);
                }
            }
            if opts.direction != Direction::Out {
                for id in &batch {
                    for edge in store.get_edges_to(id)? {
                        if wanted.insert(edge.from_symbol_id.clone()) {
                            next.push(edge.from_symbol_id.clone());
                        }
                        edge_rows.push(edge);
                    }
                }
            }

            for id in next {
                if wanted.len() >= opts.max_symbols {
                    break;
                }
                frontier.push_back(id);
            }
        }

        let ids: Vec<String> = {
            let mut v: Vec<String> = wanted
                .iter()
                .filter(|id| !id.starts_with(UNRESOLVED_CALL_PREFIX))
                .cloned()
                .collect();
            v.sort();
            v.truncate(opts.max_symbols);
            v
        };
        let symbol_rows = store.get_symbols_by_ids(&ids)?;
        let file_rows = store.get_files(repo_id)?;

        let mut graph = Self::assemble(symbol_rows, edge_rows, file_rows);
        graph.stats = GraphStats {
            mode: LoadMode::Neighborhood,
            symbols_loaded: graph.symbols.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            hops_reached,
        };
        info!(
            mode = "neighborhood",
            symbols_loaded = graph.stats.symbols_loaded,
            hops_reached,
            duration_ms = graph.stats.duration_ms,
            "graph: loaded"
        );
        Ok(graph)
    }

    fn assemble(
        symbol_rows: Vec<SymbolRow>,
        edge_rows: Vec<EdgeRow>,
        file_rows: Vec<FileRow>,
    ) -> CodeGraph {
        let mut graph: DiGraph<String, EdgeData> = DiGraph::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();
        let mut symbols: HashMap<String, SymbolRow> = HashMap::new();

        for row in symbol_rows {
            let idx = graph.add_node(row.symbol_id.clone());
            index.insert(row.symbol_id.clone(), idx);
            symbols.insert(row.symbol_id.clone(), row);
        }

        let mut seen_edges = HashSet::new();
        for edge in edge_rows {
            if !seen_edges.insert((
                edge.from_symbol_id.clone(),
                edge.to_symbol_id.clone(),
                edge.edge_type,
            )) {
                continue;
            }
            let from = *index
                .entry(edge.from_symbol_id.clone())
                .or_insert_with(|| graph.add_node(edge.from_symbol_id.clone()));
            let to = *index
                .entry(edge.to_symbol_id.clone())
                .or_insert_with(|| graph.add_node(edge.to_symbol_id.clone()));
            graph.add_edge(
                from,
                to,
                EdgeData {
                    edge_type: edge.edge_type,
                    weight: edge.weight,
                    confidence: edge.confidence,
                },
            );
        }

        let files = file_rows
            .into_iter()
            .map(|f| (f.file_id.clone(), f))
            .collect();

        CodeGraph {
            graph,
            index,
            symbols,
            files,
            stats: GraphStats {
                mode: LoadMode::Bulk,
                symbols_loaded: 0,
                duration_ms: 0,
                hops_reached: 0,
            },
        }
    }

    pub fn symbol(&self, symbol_id: &str) -> Option<&SymbolRow> {
        self.symbols.get(symbol_id)
    }

    pub fn file(&self, file_id: &str) -> Option<&FileRow> {
        self.files.get(file_id)
    }

    pub fn contains(&self, symbol_id: &str) -> bool {
        self.index.contains_key(symbol_id)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// Outgoing edges sorted by `(target, type)` for deterministic traversal.
    pub fn out_edges(&self, symbol_id: &str) -> Vec<(&str, EdgeData)> {
        self.edges(symbol_id, PetDirection::Outgoing)
    }

    /// Incoming edges sorted by `(source, type)`.
    pub fn in_edges(&self, symbol_id: &str) -> Vec<(&str, EdgeData)> {
        self.edges(symbol_id, PetDirection::Incoming)
    }

    fn edges(&self, symbol_id: &str, direction: PetDirection) -> Vec<(&str, EdgeData)> {
        let Some(&idx) = self.index.get(symbol_id) else {
            return Vec::new();
        };
        let mut out: Vec<(&str, EdgeData)> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    PetDirection::Outgoing => e.target(),
                    PetDirection::Incoming => e.source(),
                };
                (self.graph[other].as_str(), *e.weight())
            })
            .collect();
        out.sort_by(|a, b| (a.0, a.1.edge_type.as_str()).cmp(&(b.0, b.1.edge_type.as_str())));
        out
    }
}
