use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] ledger_store::Error),

    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("slice produced zero cards")]
    NoSymbols,

    #[error("slice handle expired or unknown: {0}")]
    HandleExpired(String),

    #[error("malformed wire payload: {0}")]
    MalformedWire(String),

    #[error("card projection failed: {0}")]
    Projection(String),

    #[error("invalid spillover cursor: {0}")]
    InvalidCursor(String),
}

pub type Result<T> = std::result::Result<T, Error>;
