//! Trade ledger and bot-options client.
//!
//! The ledger records one row per trade attempt and keeps the per-account
//! win/loss accumulators that drive the risk governor. The same service also
//! serves per-account bot options, exposed through [`ConfigSource`].

pub mod client;
pub mod error;
pub mod ledger;

pub use client::{BotApiClient, BotApiConfig};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{ConfigSource, DynConfigSource, DynLedger, Ledger, MockLedger, NewTradeRecord};
