//! PnL inference from balance movement.
//!
//! Venues that only confirm "won" without an amount are settled by watching
//! the wallet: after a win the balance must rise above the balance read just
//! before placement. If it never does, the win was not real and the attempt
//! is reclassified as a loss.

use std::time::Duration;

use gale_broker::BrokerGateway;
use gale_core::{AccountType, Money, TradeAttempt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ExecutorError, ExecutorResult};

/// Result of verifying a reported win.
#[derive(Debug, Clone, PartialEq)]
pub enum PnlOutcome {
    /// Balance rose; the rounded delta is the PnL.
    Confirmed(Money),
    /// No rise within the timeout.
    Reclassified(BalanceMismatch),
    /// Balance before placement unknown; the win is trusted with zero PnL.
    Unverified,
}

/// Data kept from a failed verification.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceMismatch {
    pub before: Money,
    pub last_seen: Option<Money>,
}

/// Balance polling policy. The wallet polled is always the one of the
/// account that placed the attempt.
pub struct PnlResolver {
    poll_interval: Duration,
    timeout: Duration,
}

impl PnlResolver {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Verify a reported win against the account's wallet balance.
    pub async fn resolve_win(
        &self,
        gateway: &dyn BrokerGateway,
        attempt: &TradeAttempt,
        account_type: AccountType,
        cancel: &CancellationToken,
    ) -> ExecutorResult<PnlOutcome> {
        let Some(before) = attempt.balance_before else {
            warn!(order_id = %attempt.order_id, "Balance before placement unknown, trusting win");
            return Ok(PnlOutcome::Unverified);
        };

        let deadline = Instant::now() + self.timeout;
        let mut last_seen = None;

        while Instant::now() < deadline {
            tokio::select! {
                () = tokio::time::sleep(self.poll_interval) => {}
                () = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            }

            match gateway.balance(account_type).await {
                Ok(balance) => {
                    debug!(order_id = %attempt.order_id, %before, %balance, "Balance poll");
                    last_seen = Some(balance);
                    if balance > before {
                        let pnl = (balance - before).round_cents();
                        info!(order_id = %attempt.order_id, %pnl, "Win confirmed by balance");
                        return Ok(PnlOutcome::Confirmed(pnl));
                    }
                }
                Err(e) => warn!(order_id = %attempt.order_id, error = %e, "Balance poll failed"),
            }
        }

        let err = ExecutorError::BalanceInconsistency {
            order_id: attempt.order_id.clone(),
            before,
            last_seen,
        };
        warn!(error = %err, "Reclassifying win as loss");
        Ok(PnlOutcome::Reclassified(BalanceMismatch { before, last_seen }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gale_broker::MockBrokerGateway;
    use gale_core::{Direction, Stage};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn attempt(before: Option<Money>) -> TradeAttempt {
        TradeAttempt::new(
            "order-1",
            Stage::Entry,
            "EURUSD",
            Direction::Buy,
            Money(dec!(10)),
            before,
        )
    }

    fn resolver() -> PnlResolver {
        PnlResolver::new(Duration::from_secs(2), Duration::from_secs(45))
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_delta_rounded() {
        let gateway = Arc::new(MockBrokerGateway::new());
        gateway.push_balances(vec![Money(dec!(100)), Money(dec!(108.504))]);

        let outcome = resolver()
            .resolve_win(
                gateway.as_ref(),
                &attempt(Some(Money(dec!(100)))),
                AccountType::Demo,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, PnlOutcome::Confirmed(Money(dec!(8.50))));
        assert_eq!(gateway.balance_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_rise_reclassifies_after_timeout() {
        let gateway = Arc::new(MockBrokerGateway::new());
        gateway.push_balances(vec![Money(dec!(100))]);

        let started = Instant::now();
        let outcome = resolver()
            .resolve_win(
                gateway.as_ref(),
                &attempt(Some(Money(dec!(100)))),
                AccountType::Demo,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PnlOutcome::Reclassified(BalanceMismatch {
                before: Money(dec!(100)),
                last_seen: Some(Money(dec!(100))),
            })
        );
        assert!(started.elapsed() >= Duration::from_secs(45));
        assert!(gateway.balance_calls() >= 22);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_before_is_trusted() {
        let gateway = Arc::new(MockBrokerGateway::new());
        let outcome = resolver()
            .resolve_win(gateway.as_ref(), &attempt(None), AccountType::Real, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, PnlOutcome::Unverified);
        assert_eq!(gateway.balance_calls(), 0);
    }
}
