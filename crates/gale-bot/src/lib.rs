//! Signal-driven binary-option martingale bot.
//!
//! Main application that orchestrates all components:
//! - Signal relay subscription
//! - Per-account dispatch of entry signals to the execution engine
//! - Outcome routing to the attempt awaiting it
//! - Session statistics

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
