//! Core domain types for the gale execution bot.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `Signal`, `Direction`, `ClockTime`: parsed trading signals
//! - `Stage`, `TradeAttempt`, `TerminalState`: martingale progression
//! - `OutcomeEvent`, `TradeResult`: asynchronous result notifications
//! - `Money`: precision-safe stake and PnL amounts
//! - `AccountId`, `BotOptions`, `AccountRiskState`: per-account settings

pub mod account;
pub mod error;
pub mod money;
pub mod outcome;
pub mod signal;
pub mod trade;

pub use account::{AccountId, AccountRiskState, AccountType, BotOptions};
pub use error::{CoreError, Result};
pub use money::Money;
pub use outcome::{OutcomeEvent, TradeResult};
pub use signal::{parse_expiration, ClockTime, Direction, Signal};
pub use trade::{Stage, TerminalState, TradeAttempt, TradeId, TradeStatus};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
