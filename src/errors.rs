//! Core error taxonomy surfaced to the request layer.
//!
//! Indexing isolates per-file adapter failures; slice building returns the
//! typed variants below; cache and serializer problems are recovered
//! internally and never reach the caller. `Corruption` is fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown repo: {0}")]
    InvalidRepo(String),

    #[error("repo has never been indexed: {0}")]
    NoVersion(String),

    #[error("slice produced zero cards")]
    NoSymbols,

    #[error("policy denied: {reason}")]
    PolicyDenied {
        reason: String,
        next_best_action: String,
    },

    #[error("slice handle expired or unknown: {0}")]
    HandleExpired(String),

    #[error("storage corruption: {0}")]
    Corruption(String),

    #[error("adapter failure: {0}")]
    AdapterFailure(String),

    #[error("configuration error: {0}")]
    InvalidConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal(message.into())
    }
}

impl From<ledger_store::Error> for CoreError {
    fn from(err: ledger_store::Error) -> Self {
        match err {
            ledger_store::Error::Corruption(msg) => CoreError::Corruption(msg),
            other => CoreError::Internal(format!("storage operation failed: {other}")),
        }
    }
}

impl From<code_indexer::Error> for CoreError {
    fn from(err: code_indexer::Error) -> Self {
        match err {
            code_indexer::Error::Adapter { path, message } => {
                CoreError::AdapterFailure(format!("{path}: {message}"))
            }
            code_indexer::Error::Store(inner) => CoreError::from(inner),
            other => CoreError::Internal(format!("indexing failed: {other}")),
        }
    }
}

impl From<slice_engine::Error> for CoreError {
    fn from(err: slice_engine::Error) -> Self {
        match err {
            slice_engine::Error::NoSymbols => CoreError::NoSymbols,
            slice_engine::Error::HandleExpired(handle) => CoreError::HandleExpired(handle),
            slice_engine::Error::Store(inner) => CoreError::from(inner),
            other => CoreError::Internal(format!("slice engine failed: {other}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
