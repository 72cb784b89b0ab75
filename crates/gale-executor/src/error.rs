//! Executor error types.

use gale_broker::BrokerError;
use gale_core::{Money, Stage};
use gale_ledger::LedgerError;
use gale_risk::RiskError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid bot options: {0}")]
    Config(String),

    #[error("Order placement failed at {stage}: {reason}")]
    OrderPlacement { stage: Stage, reason: String },

    #[error("No outcome for {stage} within {timeout_secs}s")]
    CorrelationTimeout { stage: Stage, timeout_secs: u64 },

    #[error("Balance did not increase after win on order {order_id}: before {before}, last seen {last_seen:?}")]
    BalanceInconsistency {
        order_id: String,
        before: Money,
        last_seen: Option<Money>,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] BrokerError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    #[error("Execution cancelled")]
    Cancelled,
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
