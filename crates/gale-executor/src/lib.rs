//! Signal execution for the gale bot.
//!
//! Drives one signal for one account through ENTRY, GALE1 and GALE2:
//! - [`ExecutionEngine`]: the per-signal state machine
//! - [`OutcomeRouter`]: single-slot rendezvous between the channel consumer
//!   and the attempt currently waiting for its result
//! - [`Scheduler`]: waits for the signal's wall-clock times
//! - [`PnlResolver`]: infers PnL from balance movement when the venue is silent
//! - [`AccountLocks`]: one execution per account at a time

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod pnl;
pub mod router;
pub mod schedule;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{EngineConfig, ScheduleConfig};
pub use engine::{ExecutionContext, ExecutionEngine, ExecutionReport};
pub use error::{ExecutorError, ExecutorResult};
pub use locks::AccountLocks;
pub use pnl::{BalanceMismatch, PnlOutcome, PnlResolver};
pub use router::{Delivery, OutcomeRouter, OutcomeSlot};
pub use schedule::Scheduler;
