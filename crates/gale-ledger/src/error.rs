//! Ledger error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
