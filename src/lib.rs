//! Code-intelligence ledger core.
//!
//! Continuously ingests multi-language repositories, maintains a versioned
//! symbol/edge graph in an embedded store, and serves token-efficient,
//! cache-validated slices of that graph to an agent-facing request layer.
//!
//! The crate exposes the core operations (`indexRepo`, `buildSlice`,
//! `refreshSlice`, `getCard`, `searchSymbols`, `getSpillover`,
//! `invalidateVersion`) as methods on [`Ledger`]; transport, CLI and policy
//! rules beyond the hooks here live with the caller.

pub mod config;
pub mod errors;
pub mod ledger;
pub mod slices;
pub mod telemetry;

pub use config::{LedgerConfig, PolicyConfig, RepoConfig};
pub use errors::{CoreError, Result};
pub use ledger::{CardOutcome, Ledger};
pub use slices::{RefreshResponse, SliceRequest, SliceResponse};

pub use code_indexer::{IndexMode, IndexStats};
pub use slice_engine::{DetailLevel, SliceBudget};
