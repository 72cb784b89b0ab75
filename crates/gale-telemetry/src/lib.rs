//! Prometheus metrics and structured logging for the gale bot.
//!
//! - Prometheus counters for signals, attempts, settlements and risk stops
//! - Structured logging with tracing (JSON in production)
//! - Periodic per-account session summary

pub mod error;
pub mod logging;
pub mod metrics;
pub mod session_stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use session_stats::{AccountSessionStats, SessionStatsReporter};
