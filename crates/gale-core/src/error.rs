//! Error types for gale-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("Unknown result token: {0}")]
    InvalidResult(String),

    #[error("Invalid expiration: {0}")]
    InvalidExpiration(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("PnL already settled for trade {0}")]
    AlreadySettled(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
