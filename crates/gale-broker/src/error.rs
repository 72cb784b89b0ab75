//! Broker gateway error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Operation not supported by {venue}: {operation}")]
    Unsupported {
        venue: &'static str,
        operation: &'static str,
    },
}

impl BrokerError {
    /// Whether retrying the same call cannot help.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
