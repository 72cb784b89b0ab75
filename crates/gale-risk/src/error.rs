//! Risk error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Risk state unavailable: {0}")]
    StateUnavailable(#[from] gale_ledger::LedgerError),

    #[error("Stop notification failed: {0}")]
    Notification(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
