//! Execution engine configuration.

use std::time::Duration;

use gale_core::{Money, Stage};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Timeouts, polling cadence and stake policy for the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Wait for the entry outcome before falling back to status polling.
    #[serde(default = "default_entry_timeout_secs")]
    pub entry_timeout_secs: u64,

    /// Same for gale attempts.
    #[serde(default = "default_gale_timeout_secs")]
    pub gale_timeout_secs: u64,

    #[serde(default = "default_status_poll_secs")]
    pub status_poll_secs: u64,

    #[serde(default = "default_balance_poll_secs")]
    pub balance_poll_secs: u64,

    /// How long a reported win may take to show up in the balance.
    #[serde(default = "default_balance_timeout_secs")]
    pub balance_timeout_secs: u64,

    /// Upper bound applied after doubling.
    #[serde(default = "default_max_stake")]
    pub max_stake: Money,

    /// Retry a rejected placement once with the inverted pair.
    #[serde(default = "default_true")]
    pub invert_symbol_retry: bool,

    /// Run an enabled gale immediately when the signal has no time for it.
    #[serde(default)]
    pub gale_without_schedule: bool,

    /// Poll the venue's order status after the outcome timeout.
    #[serde(default = "default_true")]
    pub fallback_polling: bool,

    /// Also poll order status while still waiting for the channel outcome.
    /// Venues without a status endpoint are detected on the first poll.
    #[serde(default = "default_true")]
    pub poll_status_during_wait: bool,
}

fn default_entry_timeout_secs() -> u64 {
    60
}

fn default_gale_timeout_secs() -> u64 {
    70
}

fn default_status_poll_secs() -> u64 {
    5
}

fn default_balance_poll_secs() -> u64 {
    2
}

fn default_balance_timeout_secs() -> u64 {
    45
}

fn default_max_stake() -> Money {
    Money(Decimal::from(1000))
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry_timeout_secs: default_entry_timeout_secs(),
            gale_timeout_secs: default_gale_timeout_secs(),
            status_poll_secs: default_status_poll_secs(),
            balance_poll_secs: default_balance_poll_secs(),
            balance_timeout_secs: default_balance_timeout_secs(),
            max_stake: default_max_stake(),
            invert_symbol_retry: true,
            gale_without_schedule: false,
            fallback_polling: true,
            poll_status_during_wait: true,
        }
    }
}

impl EngineConfig {
    pub fn outcome_timeout(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Entry => Duration::from_secs(self.entry_timeout_secs),
            Stage::Gale1 | Stage::Gale2 => Duration::from_secs(self.gale_timeout_secs),
        }
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_secs.max(1))
    }

    pub fn balance_poll_interval(&self) -> Duration {
        Duration::from_secs(self.balance_poll_secs.max(1))
    }

    pub fn balance_timeout(&self) -> Duration {
        Duration::from_secs(self.balance_timeout_secs)
    }
}

/// Wall-clock scheduling of signal times.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// IANA timezone the signal times are expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_timezone() -> String {
    "America/Sao_Paulo".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}
