//! Signal relay subscriber.
//!
//! Handles connection lifecycle, automatic reconnection with exponential
//! backoff, and re-subscription after reconnection. Every text frame received
//! on the subscribed channel is forwarded verbatim; parsing happens in the
//! consumer so a malformed message never tears down the connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ChannelError, ChannelResult};

/// Feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Relay WebSocket URL.
    pub url: String,
    /// Channel name to subscribe to.
    pub channel: String,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Interval between pings.
    pub ping_interval_ms: u64,
    /// Silence after which the connection is considered dead.
    pub idle_timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            channel: "signals".to_string(),
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60000,
            ping_interval_ms: 30000,
            idle_timeout_ms: 90000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// WebSocket subscriber feeding raw payloads into an mpsc channel.
pub struct SignalFeed {
    config: FeedConfig,
    state: Arc<RwLock<FeedState>>,
    message_tx: mpsc::Sender<String>,
    reconnect_count: Arc<RwLock<u32>>,
    shutdown_token: CancellationToken,
}

impl SignalFeed {
    pub fn new(config: FeedConfig, message_tx: mpsc::Sender<String>) -> Self {
        Self::with_shutdown(config, message_tx, CancellationToken::new())
    }

    /// Create a feed that stops when `shutdown_token` is cancelled.
    pub fn with_shutdown(
        config: FeedConfig,
        message_tx: mpsc::Sender<String>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(FeedState::Disconnected)),
            message_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            shutdown_token,
        }
    }

    pub fn state(&self) -> FeedState {
        *self.state.read()
    }

    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown.
    pub fn shutdown(&self) {
        info!("SignalFeed shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and run until shutdown or the reconnect budget is spent.
    pub async fn run(&self) -> ChannelResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting feed loop");
                *self.state.write() = FeedState::Disconnected;
                return Ok(());
            }

            *self.state.write() = FeedState::Connecting;

            match self.try_connect().await {
                Ok(()) => info!("Signal feed connection closed"),
                Err(e) => error!(?e, "Signal feed connection error"),
            }

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                *self.state.write() = FeedState::Disconnected;
                return Ok(());
            }

            attempt += 1;
            *self.reconnect_count.write() = attempt;

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                *self.state.write() = FeedState::Disconnected;
                return Err(ChannelError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            *self.state.write() = FeedState::Reconnecting;

            let delay = self.backoff_delay(attempt);
            warn!(attempt, delay_ms = delay.as_millis(), "Reconnecting signal feed");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    *self.state.write() = FeedState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> ChannelResult<()> {
        info!(url = %self.config.url, channel = %self.config.channel, "Connecting to signal relay");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = json!({"method": "subscribe", "channel": self.config.channel});
        write.send(Message::Text(subscribe.to_string())).await?;

        *self.state.write() = FeedState::Connected;
        *self.reconnect_count.write() = 0;
        info!("Signal feed subscribed");

        let idle_timeout = Duration::from_millis(self.config.idle_timeout_ms);
        let mut ping = tokio::time::interval(Duration::from_millis(self.config.ping_interval_ms));
        ping.reset();
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in feed loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    *self.state.write() = FeedState::Disconnected;
                    return Ok(());
                }

                msg = read.next() => {
                    last_seen = Instant::now();
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            debug!(len = text.len(), "Signal payload received");
                            if self.message_tx.send(text).await.is_err() {
                                warn!("Message receiver dropped");
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason): (u16, String) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Signal relay closed connection");
                            return Err(ChannelError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "Signal feed read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("Signal feed stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                _ = ping.tick() => {
                    if last_seen.elapsed() > idle_timeout {
                        error!(idle_ms = last_seen.elapsed().as_millis(), "Signal feed idle timeout");
                        return Err(ChannelError::HeartbeatTimeout);
                    }
                    write.send(Message::Ping(Vec::new())).await?;
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_base_delay_ms;
        let max = self.config.reconnect_max_delay_ms;

        // base * 2^(attempt-1), capped
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = base.saturating_mul(1u64 << exponent).min(max);

        Duration::from_millis(delay + jitter_ms())
    }
}

/// Random jitter in 0..1000ms.
fn jitter_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos % 1000)
}
