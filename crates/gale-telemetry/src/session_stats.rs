//! Periodic session summary.
//!
//! Reads the Prometheus counters back and logs a per-account block of
//! attempts, wins, losses, reclassifications, stops and realized pnl.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::metrics::{
    ATTEMPTS_TOTAL, EXECUTIONS_TOTAL, FALLBACK_POLLS_TOTAL, RECLASSIFIED_TOTAL, RISK_STOPS_TOTAL,
    SESSION_PNL, SETTLED_TOTAL, SIGNALS_TOTAL,
};

const STAGES: [&str; 3] = ["ENTRY", "GALE1", "GALE2"];
const RESULTS: [&str; 3] = ["WIN", "LOSS", "DRAW"];
const SIGNAL_KINDS: [&str; 4] = ["entry", "result", "gale_trigger", "invalid"];
const STOPS: [&str; 2] = ["STOP_WIN", "STOP_LOSS"];
const TERMINALS: [&str; 7] = [
    "WON_AT_ENTRY",
    "WON_AT_GALE1",
    "WON_AT_GALE2",
    "LOST_FINAL",
    "ABORTED_CONFIG",
    "ABORTED_NO_ORDER",
    "ABORTED_TIMEOUT",
];

/// Session statistics for one account.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountSessionStats {
    pub account: String,
    pub attempts: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub executions_won: u64,
    pub executions_lost: u64,
    pub executions_aborted: u64,
    pub reclassified: u64,
    pub fallback_polls: u64,
    /// Stop reason, if the account was stopped this session.
    pub stop: Option<&'static str>,
    pub pnl: f64,
}

/// Session statistics reporter.
pub struct SessionStatsReporter {
    accounts: Vec<String>,
    start_time: DateTime<Utc>,
}

impl SessionStatsReporter {
    pub fn new(accounts: Vec<String>) -> Self {
        Self {
            accounts,
            start_time: Utc::now(),
        }
    }

    /// Channel messages seen this session, by kind.
    pub fn signal_counts(&self) -> Vec<(&'static str, u64)> {
        SIGNAL_KINDS
            .iter()
            .map(|kind| (*kind, counter(&SIGNALS_TOTAL, &[*kind])))
            .collect()
    }

    pub fn get_stats(&self) -> Vec<AccountSessionStats> {
        self.accounts
            .iter()
            .map(|account| self.get_account_stats(account))
            .collect()
    }

    fn get_account_stats(&self, account: &str) -> AccountSessionStats {
        let mut stats = AccountSessionStats {
            account: account.to_string(),
            ..Default::default()
        };

        for stage in STAGES {
            stats.attempts += counter(&ATTEMPTS_TOTAL, &[account, stage]);
            for result in RESULTS {
                let n = counter(&SETTLED_TOTAL, &[account, stage, result]);
                match result {
                    "WIN" => stats.wins += n,
                    "LOSS" => stats.losses += n,
                    _ => stats.draws += n,
                }
            }
        }

        for terminal in TERMINALS {
            let n = counter(&EXECUTIONS_TOTAL, &[account, terminal]);
            if terminal.starts_with("WON") {
                stats.executions_won += n;
            } else if terminal.starts_with("LOST") {
                stats.executions_lost += n;
            } else {
                stats.executions_aborted += n;
            }
        }

        stats.reclassified = counter(&RECLASSIFIED_TOTAL, &[account]);
        stats.fallback_polls = counter(&FALLBACK_POLLS_TOTAL, &[account]);
        stats.stop = STOPS
            .into_iter()
            .find(|signal| counter(&RISK_STOPS_TOTAL, &[account, *signal]) > 0);
        stats.pnl = SESSION_PNL.with_label_values(&[account]).get();
        stats
    }

    /// Output session statistics to logs.
    pub fn output_summary(&self) {
        let duration = Utc::now() - self.start_time;
        let hours = duration.num_hours();
        let minutes = duration.num_minutes() % 60;

        info!("========== Session Statistics ==========");
        info!(
            "Since: {} ({} hours {} minutes)",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            hours,
            minutes
        );
        let signals: Vec<String> = self
            .signal_counts()
            .into_iter()
            .map(|(kind, n)| format!("{kind}: {n}"))
            .collect();
        info!("Signals: {}", signals.join(", "));

        for s in self.get_stats() {
            info!("--- {} ---", s.account);
            info!(
                "  Attempts: {} (win: {}, loss: {}, draw: {})",
                s.attempts, s.wins, s.losses, s.draws
            );
            info!(
                "  Executions: won {}, lost {}, aborted {}",
                s.executions_won, s.executions_lost, s.executions_aborted
            );
            info!(
                "  Reclassified: {}, fallback polls: {}",
                s.reclassified, s.fallback_polls
            );
            if let Some(stop) = s.stop {
                info!("  Stopped: {}", stop);
            }
            info!("  PnL: {:.2}", s.pnl);
        }

        info!("========================================");
    }
}

fn counter(vec: &prometheus::CounterVec, labels: &[&str]) -> u64 {
    vec.with_label_values(labels).get() as u64
}
