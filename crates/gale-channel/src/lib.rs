//! Signal channel subscriber and message parsing.
//!
//! Provides:
//! - [`SignalFeed`]: WebSocket subscriber with automatic reconnection
//!   (exponential backoff plus jitter) forwarding raw payloads into an mpsc
//!   channel
//! - [`parse_message`]: typed decoding of `entry` / `result` / `gale` events

pub mod error;
pub mod feed;
pub mod message;

pub use error::{ChannelError, ChannelResult};
pub use feed::{FeedConfig, FeedState, SignalFeed};
pub use message::{parse_message, ChannelMessage};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Install the process-wide TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
