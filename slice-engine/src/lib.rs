//! Slice building over the versioned symbol graph.
//!
//! Loads a read-only graph from `ledger-store`, resolves heterogeneous
//! request inputs into seeds, runs a budgeted beam search, projects symbol
//! cards at a negotiated detail level, and serializes compact wire payloads
//! with leased, ETag-validated handles.

pub mod beam;
pub mod cache;
pub mod cards;
pub mod errors;
pub mod graph;
pub mod seeds;
pub mod session;
pub mod wire;

pub use beam::{
    BeamOptions, BeamOutcome, DroppedCandidate, EdgeWeights, FrontierItem, SliceBudget,
    SliceCandidate,
};
pub use cache::{CacheKey, CacheStatsSnapshot, VersionCache};
pub use cards::{DetailLevel, DetailLevelMetadata, SymbolCard};
pub use errors::{Error, Result};
pub use graph::{CodeGraph, Direction, GraphStats, LoadMode, NeighborhoodOptions};
pub use seeds::{Seed, SeedInputs, SeedSource, resolve_seeds};
pub use session::{Lease, RefreshOutcome, SliceDelta, SliceMember, SpilloverPage};
pub use wire::{DEFAULT_WIRE_VERSION, Slice, SliceEdge, Truncation};
