//! Session risk limits.
//!
//! After every settled trade the governor compares the account's accumulated
//! wins and losses against its stop limits:
//! - STOP_WIN when `win_accum >= stop_win`
//! - otherwise STOP_LOSS when `loss_accum >= stop_loss`
//!
//! A stop is advisory: it never cancels an order already placed. It is latched
//! per account ([`StopLatch`]) so the dispatcher can refuse new entries, and an
//! optional [`StopNotifier`] tells the orchestrator.

pub mod error;
pub mod governor;
pub mod latch;
pub mod notifier;

pub use error::{RiskError, RiskResult};
pub use governor::{evaluate, RiskGovernor, StopSignal};
pub use latch::{StopLatch, StopRecord};
pub use notifier::{DynStopNotifier, MockStopNotifier, OrchestratorNotifier, StopNotifier};
