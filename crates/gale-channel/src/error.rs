//! Channel error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Heartbeat timeout")]
    HeartbeatTimeout,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Invalid field: {0}")]
    InvalidField(#[from] gale_core::CoreError),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ChannelResult<T> = Result<T, ChannelError>;
