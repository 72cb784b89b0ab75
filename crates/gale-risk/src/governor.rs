//! Post-trade stop evaluation.

use std::fmt;
use std::sync::Arc;

use gale_core::{AccountId, AccountRiskState};
use gale_ledger::DynLedger;
use gale_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RiskResult;
use crate::latch::StopLatch;
use crate::notifier::DynStopNotifier;

/// Outcome of a risk check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopSignal {
    None,
    StopWin,
    StopLoss,
}

impl StopSignal {
    pub fn is_stop(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::StopWin => "STOP_WIN",
            Self::StopLoss => "STOP_LOSS",
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compare accumulators with limits. Stop-win takes precedence.
///
/// A non-positive limit is treated as unset.
pub fn evaluate(state: &AccountRiskState) -> StopSignal {
    if state.stop_win.is_positive() && state.win_accum >= state.stop_win {
        StopSignal::StopWin
    } else if state.stop_loss.is_positive() && state.loss_accum >= state.stop_loss {
        StopSignal::StopLoss
    } else {
        StopSignal::None
    }
}

/// Evaluates account risk state after each settled trade.
pub struct RiskGovernor {
    ledger: DynLedger,
    latch: Arc<StopLatch>,
    notifier: Option<DynStopNotifier>,
}

impl RiskGovernor {
    pub fn new(ledger: DynLedger, latch: Arc<StopLatch>) -> Self {
        Self {
            ledger,
            latch,
            notifier: None,
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: DynStopNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn latch(&self) -> &Arc<StopLatch> {
        &self.latch
    }

    /// Read the account's current state and evaluate it.
    ///
    /// The first stop for an account latches it and notifies the
    /// orchestrator; notification failures are logged only.
    pub async fn check(&self, account: &AccountId) -> RiskResult<StopSignal> {
        let state = self.ledger.get_risk_state(account).await?;
        let signal = evaluate(&state);

        debug!(
            %account,
            win_accum = %state.win_accum,
            loss_accum = %state.loss_accum,
            stop_win = %state.stop_win,
            stop_loss = %state.stop_loss,
            %signal,
            "Risk check"
        );

        if signal.is_stop() && self.latch.trigger(account, signal, &state) {
            Metrics::risk_stop(&account.to_string(), signal.as_str());
            if let Some(notifier) = &self.notifier {
                if let Err(e) = notifier.notify(account, signal).await {
                    warn!(%account, %signal, error = %e, "Stop notification failed");
                }
            }
        }

        Ok(signal)
    }
}
