//! Martingale stages and trade attempts.

use crate::error::{CoreError, Result};
use crate::money::Money;
use crate::signal::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Stage
// ============================================================================

/// Position of an attempt in the martingale progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    Entry,
    Gale1,
    Gale2,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Entry, Stage::Gale1, Stage::Gale2];

    /// Stake multiplier relative to the base stake (1, 2, 4).
    #[inline]
    pub fn multiplier(&self) -> u32 {
        1 << self.index()
    }

    #[inline]
    pub fn index(&self) -> u32 {
        match self {
            Self::Entry => 0,
            Self::Gale1 => 1,
            Self::Gale2 => 2,
        }
    }

    /// Next stage after a loss. `None` after GALE2.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Self::Entry => Some(Self::Gale1),
            Self::Gale1 => Some(Self::Gale2),
            Self::Gale2 => None,
        }
    }

    /// Gale stage for a step number (1 or 2).
    pub fn from_gale_step(step: u8) -> Option<Stage> {
        match step {
            1 => Some(Self::Gale1),
            2 => Some(Self::Gale2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Gale1 => "GALE1",
            Self::Gale2 => "GALE2",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TradeId
// ============================================================================

/// Locally generated identifier for a trade attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(Uuid);

impl TradeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TradeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// TradeAttempt
// ============================================================================

/// One placed order at one stage.
///
/// A new attempt is created per stage; `pnl` is written exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeAttempt {
    pub id: TradeId,
    pub order_id: String,
    pub stage: Stage,
    pub symbol: String,
    pub direction: Direction,
    pub stake: Money,
    pub opened_at: DateTime<Utc>,
    pub balance_before: Option<Money>,
    pnl: Option<Money>,
}

impl TradeAttempt {
    pub fn new(
        order_id: impl Into<String>,
        stage: Stage,
        symbol: impl Into<String>,
        direction: Direction,
        stake: Money,
        balance_before: Option<Money>,
    ) -> Self {
        Self {
            id: TradeId::new(),
            order_id: order_id.into(),
            stage,
            symbol: symbol.into(),
            direction,
            stake,
            opened_at: Utc::now(),
            balance_before,
            pnl: None,
        }
    }

    /// Record realized PnL. Fails if already settled.
    pub fn settle(&mut self, pnl: Money) -> Result<()> {
        if self.pnl.is_some() {
            return Err(CoreError::AlreadySettled(self.id.to_string()));
        }
        self.pnl = Some(pnl);
        Ok(())
    }

    pub fn is_settled(&self) -> bool {
        self.pnl.is_some()
    }

    /// Realized PnL, zero until settled.
    pub fn pnl(&self) -> Money {
        self.pnl.unwrap_or(Money::ZERO)
    }
}

// ============================================================================
// TradeStatus
// ============================================================================

/// Status recorded in the ledger for a trade attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeStatus {
    Open,
    Won(Stage),
    Lost,
}

impl TradeStatus {
    /// Ledger label. Gale wins carry the stage so reports can tell them apart.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Won(Stage::Entry) => "WON",
            Self::Won(Stage::Gale1) => "WON NA GALE 1",
            Self::Won(Stage::Gale2) => "WON NA GALE 2",
            Self::Lost => "LOST",
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// TerminalState
// ============================================================================

/// Final outcome of executing one signal for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    WonAtEntry,
    WonAtGale1,
    WonAtGale2,
    LostFinal,
    AbortedNoOrder,
    AbortedConfig,
    AbortedTimeout,
}

impl TerminalState {
    pub fn won_at(stage: Stage) -> Self {
        match stage {
            Stage::Entry => Self::WonAtEntry,
            Stage::Gale1 => Self::WonAtGale1,
            Stage::Gale2 => Self::WonAtGale2,
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, Self::WonAtEntry | Self::WonAtGale1 | Self::WonAtGale2)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            Self::AbortedNoOrder | Self::AbortedConfig | Self::AbortedTimeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WonAtEntry => "WON_AT_ENTRY",
            Self::WonAtGale1 => "WON_AT_GALE1",
            Self::WonAtGale2 => "WON_AT_GALE2",
            Self::LostFinal => "LOST_FINAL",
            Self::AbortedNoOrder => "ABORTED_NO_ORDER",
            Self::AbortedConfig => "ABORTED_CONFIG",
            Self::AbortedTimeout => "ABORTED_TIMEOUT",
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stage_multipliers() {
        assert_eq!(Stage::Entry.multiplier(), 1);
        assert_eq!(Stage::Gale1.multiplier(), 2);
        assert_eq!(Stage::Gale2.multiplier(), 4);
    }

    #[test]
    fn test_stage_progression_stops_after_gale2() {
        assert_eq!(Stage::Entry.next(), Some(Stage::Gale1));
        assert_eq!(Stage::Gale1.next(), Some(Stage::Gale2));
        assert_eq!(Stage::Gale2.next(), None);
        assert_eq!(Stage::from_gale_step(2), Some(Stage::Gale2));
        assert_eq!(Stage::from_gale_step(3), None);
    }

    #[test]
    fn test_attempt_settles_once() {
        let mut attempt = TradeAttempt::new(
            "ord-1",
            Stage::Entry,
            "EURUSD",
            Direction::Buy,
            Money(dec!(10)),
            Some(Money(dec!(100))),
        );
        assert_eq!(attempt.pnl(), Money::ZERO);
        assert!(!attempt.is_settled());

        attempt.settle(Money(dec!(8.50))).unwrap();
        assert_eq!(attempt.pnl(), Money(dec!(8.50)));

        let err = attempt.settle(Money(dec!(1))).unwrap_err();
        assert!(matches!(err, CoreError::AlreadySettled(_)));
        assert_eq!(attempt.pnl(), Money(dec!(8.50)));
    }

    #[test]
    fn test_trade_ids_unique() {
        assert_ne!(TradeId::new(), TradeId::new());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(TradeStatus::Won(Stage::Entry).label(), "WON");
        assert_eq!(TradeStatus::Won(Stage::Gale2).label(), "WON NA GALE 2");
        assert_eq!(TradeStatus::Lost.label(), "LOST");
    }

    #[test]
    fn test_terminal_state() {
        assert_eq!(TerminalState::won_at(Stage::Gale1), TerminalState::WonAtGale1);
        assert!(TerminalState::WonAtGale2.is_win());
        assert!(TerminalState::AbortedTimeout.is_aborted());
        assert!(!TerminalState::LostFinal.is_aborted());
        assert_eq!(
            serde_json::to_string(&TerminalState::AbortedNoOrder).unwrap(),
            "\"ABORTED_NO_ORDER\""
        );
    }
}
