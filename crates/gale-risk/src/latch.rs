//! Per-account stop latch.
//!
//! Once an account hits a stop it stays stopped until manually reset. The
//! first trigger wins; later triggers keep the original record.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gale_core::{AccountId, AccountRiskState};
use tracing::{error, info, warn};

use crate::governor::StopSignal;

/// Snapshot taken when an account was stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct StopRecord {
    pub signal: StopSignal,
    pub state: AccountRiskState,
    pub triggered_at: DateTime<Utc>,
}

/// Thread-safe set of stopped accounts.
#[derive(Debug, Default)]
pub struct StopLatch {
    stopped: DashMap<AccountId, StopRecord>,
}

impl StopLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self, account: &AccountId) -> bool {
        self.stopped.contains_key(account)
    }

    pub fn record(&self, account: &AccountId) -> Option<StopRecord> {
        self.stopped.get(account).map(|r| r.value().clone())
    }

    /// Latch the account. Returns `true` only for the first trigger.
    pub fn trigger(&self, account: &AccountId, signal: StopSignal, state: &AccountRiskState) -> bool {
        if !signal.is_stop() {
            return false;
        }

        match self.stopped.entry(account.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(StopRecord {
                    signal,
                    state: *state,
                    triggered_at: Utc::now(),
                });
                error!(
                    %account,
                    %signal,
                    win_accum = %state.win_accum,
                    loss_accum = %state.loss_accum,
                    "ACCOUNT STOPPED"
                );
                true
            }
            Entry::Occupied(existing) => {
                warn!(
                    %account,
                    new_signal = %signal,
                    original = %existing.get().signal,
                    "Account already stopped, ignoring new trigger"
                );
                false
            }
        }
    }

    /// Manually clear an account's stop.
    pub fn reset(&self, account: &AccountId) {
        if let Some((_, record)) = self.stopped.remove(account) {
            info!(%account, previous = %record.signal, "Account stop manually reset");
        }
    }

    pub fn stopped_accounts(&self) -> Vec<AccountId> {
        self.stopped.iter().map(|e| e.key().clone()).collect()
    }
}
