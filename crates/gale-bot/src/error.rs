//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(#[from] gale_channel::ChannelError),

    #[error("Broker error: {0}")]
    Broker(#[from] gale_broker::BrokerError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] gale_ledger::LedgerError),

    #[error("Risk error: {0}")]
    Risk(#[from] gale_risk::RiskError),

    #[error("Executor error: {0}")]
    Executor(#[from] gale_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] gale_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
