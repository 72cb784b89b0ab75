//! Ledger and config-source traits plus an in-memory mock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gale_core::{
    AccountId, AccountRiskState, BotOptions, BoxFuture, Direction, Money, TradeStatus,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};

/// Row written when an order is accepted by the venue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTradeRecord {
    pub account: AccountId,
    pub order_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub stake: Money,
    pub open_price: Option<Decimal>,
    pub status: TradeStatus,
    pub opened_at: DateTime<Utc>,
}

/// Durable record of trade attempts and per-account accumulators.
///
/// Writes are at-least-once; implementations must tolerate repeats.
pub trait Ledger: Send + Sync {
    fn create_trade_record(&self, record: NewTradeRecord) -> BoxFuture<'_, LedgerResult<()>>;

    fn update_trade_record<'a>(
        &'a self,
        account: &'a AccountId,
        order_id: &'a str,
        status: TradeStatus,
        pnl: Money,
    ) -> BoxFuture<'a, LedgerResult<()>>;

    fn get_risk_state<'a>(
        &'a self,
        account: &'a AccountId,
    ) -> BoxFuture<'a, LedgerResult<AccountRiskState>>;

    fn accumulate_win<'a>(
        &'a self,
        account: &'a AccountId,
        amount: Money,
    ) -> BoxFuture<'a, LedgerResult<()>>;

    fn accumulate_loss<'a>(
        &'a self,
        account: &'a AccountId,
        amount: Money,
    ) -> BoxFuture<'a, LedgerResult<()>>;
}

/// Source of per-account bot options.
pub trait ConfigSource: Send + Sync {
    fn get_bot_options<'a>(&'a self, account: &'a AccountId)
        -> BoxFuture<'a, LedgerResult<BotOptions>>;
}

pub type DynLedger = Arc<dyn Ledger>;
pub type DynConfigSource = Arc<dyn ConfigSource>;

// ============================================================================
// MockLedger
// ============================================================================

/// In-memory ledger and config source for testing.
#[derive(Debug, Default)]
pub struct MockLedger {
    records: Mutex<Vec<NewTradeRecord>>,
    updates: Mutex<Vec<(String, TradeStatus, Money)>>,
    risk: Mutex<HashMap<AccountId, AccountRiskState>>,
    options: Mutex<HashMap<AccountId, BotOptions>>,
    fail_writes: AtomicBool,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install options; stop limits are mirrored into the risk state.
    pub fn set_options(&self, account: &AccountId, options: BotOptions) {
        {
            let mut risk = self.risk.lock();
            let state = risk.entry(account.clone()).or_default();
            state.stop_win = options.stop_win.unwrap_or_default();
            state.stop_loss = options.stop_loss.unwrap_or_default();
        }
        self.options.lock().insert(account.clone(), options);
    }

    pub fn set_risk_state(&self, account: &AccountId, state: AccountRiskState) {
        self.risk.lock().insert(account.clone(), state);
    }

    /// Make every write fail with an HTTP error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<NewTradeRecord> {
        self.records.lock().clone()
    }

    pub fn updates(&self) -> Vec<(String, TradeStatus, Money)> {
        self.updates.lock().clone()
    }

    pub fn risk_state(&self, account: &AccountId) -> AccountRiskState {
        self.risk.lock().get(account).copied().unwrap_or_default()
    }

    fn check_writable(&self) -> LedgerResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(LedgerError::HttpClient("ledger unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Ledger for MockLedger {
    fn create_trade_record(&self, record: NewTradeRecord) -> BoxFuture<'_, LedgerResult<()>> {
        Box::pin(async move {
            self.check_writable()?;
            self.records.lock().push(record);
            Ok(())
        })
    }

    fn update_trade_record<'a>(
        &'a self,
        _account: &'a AccountId,
        order_id: &'a str,
        status: TradeStatus,
        pnl: Money,
    ) -> BoxFuture<'a, LedgerResult<()>> {
        Box::pin(async move {
            self.check_writable()?;
            self.updates.lock().push((order_id.to_string(), status, pnl));
            Ok(())
        })
    }

    fn get_risk_state<'a>(
        &'a self,
        account: &'a AccountId,
    ) -> BoxFuture<'a, LedgerResult<AccountRiskState>> {
        Box::pin(async move { Ok(self.risk_state(account)) })
    }

    fn accumulate_win<'a>(
        &'a self,
        account: &'a AccountId,
        amount: Money,
    ) -> BoxFuture<'a, LedgerResult<()>> {
        Box::pin(async move {
            self.check_writable()?;
            self.risk.lock().entry(account.clone()).or_default().win_accum += amount;
            Ok(())
        })
    }

    fn accumulate_loss<'a>(
        &'a self,
        account: &'a AccountId,
        amount: Money,
    ) -> BoxFuture<'a, LedgerResult<()>> {
        Box::pin(async move {
            self.check_writable()?;
            self.risk.lock().entry(account.clone()).or_default().loss_accum += amount;
            Ok(())
        })
    }
}

impl ConfigSource for MockLedger {
    fn get_bot_options<'a>(
        &'a self,
        account: &'a AccountId,
    ) -> BoxFuture<'a, LedgerResult<BotOptions>> {
        Box::pin(async move {
            self.options
                .lock()
                .get(account)
                .cloned()
                .ok_or_else(|| LedgerError::NotFound(format!("bot options for {account}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account() -> AccountId {
        AccountId::new("1", "2")
    }

    #[tokio::test]
    async fn test_mock_accumulates() {
        let ledger = MockLedger::new();
        let acc = account();
        ledger.accumulate_win(&acc, Money(dec!(8.5))).await.unwrap();
        ledger.accumulate_win(&acc, Money(dec!(1.5))).await.unwrap();
        ledger.accumulate_loss(&acc, Money(dec!(10))).await.unwrap();

        let state = ledger.get_risk_state(&acc).await.unwrap();
        assert_eq!(state.win_accum, Money(dec!(10)));
        assert_eq!(state.loss_accum, Money(dec!(10)));
    }

    #[tokio::test]
    async fn test_mock_options_mirror_limits() {
        let ledger = MockLedger::new();
        let acc = account();
        assert!(ledger.get_bot_options(&acc).await.is_err());

        ledger.set_options(
            &acc,
            BotOptions {
                stake: Some(Money(dec!(10))),
                is_demo: true,
                gale1_enabled: true,
                gale2_enabled: true,
                stop_win: Some(Money(dec!(50))),
                stop_loss: Some(Money(dec!(70))),
            },
        );
        let state = ledger.get_risk_state(&acc).await.unwrap();
        assert_eq!(state.stop_win, Money(dec!(50)));
        assert_eq!(state.stop_loss, Money(dec!(70)));
        assert!(ledger.get_bot_options(&acc).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_write_failures() {
        let ledger = MockLedger::new();
        ledger.set_fail_writes(true);
        let acc = account();
        assert!(ledger.accumulate_loss(&acc, Money(dec!(1))).await.is_err());
        assert_eq!(ledger.risk_state(&acc).loss_accum, Money::ZERO);
    }
}
