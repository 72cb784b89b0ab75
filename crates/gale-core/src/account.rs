//! Account identity, options and risk state.

use crate::error::{CoreError, Result};
use crate::money::Money;
use crate::trade::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trading account: one user on one brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId {
    pub user_id: String,
    pub brokerage_id: String,
}

impl AccountId {
    pub fn new(user_id: impl Into<String>, brokerage_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            brokerage_id: brokerage_id.into(),
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.brokerage_id)
    }
}

/// Wallet the broker should trade against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Demo,
    Real,
}

impl AccountType {
    pub fn from_is_demo(is_demo: bool) -> Self {
        if is_demo {
            Self::Demo
        } else {
            Self::Real
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Real => "real",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-account bot options served by the config collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotOptions {
    pub stake: Option<Money>,
    pub is_demo: bool,
    pub gale1_enabled: bool,
    pub gale2_enabled: bool,
    pub stop_win: Option<Money>,
    pub stop_loss: Option<Money>,
}

impl BotOptions {
    pub fn account_type(&self) -> AccountType {
        AccountType::from_is_demo(self.is_demo)
    }

    pub fn gale_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::Entry => true,
            Stage::Gale1 => self.gale1_enabled,
            Stage::Gale2 => self.gale2_enabled,
        }
    }

    /// Base stake, provided the options are tradable.
    ///
    /// Stake and both stop limits must be present and positive.
    pub fn validated_stake(&self) -> Result<Money> {
        let stake = self
            .stake
            .ok_or_else(|| CoreError::InvalidAmount("stake missing".to_string()))?;
        if !stake.is_positive() {
            return Err(CoreError::InvalidAmount(format!("stake not positive: {stake}")));
        }
        for (name, limit) in [("stop_win", self.stop_win), ("stop_loss", self.stop_loss)] {
            match limit {
                Some(v) if v.is_positive() => {}
                Some(v) => {
                    return Err(CoreError::InvalidAmount(format!("{name} not positive: {v}")))
                }
                None => return Err(CoreError::InvalidAmount(format!("{name} missing"))),
            }
        }
        Ok(stake)
    }
}

/// Accumulated session results and limits for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountRiskState {
    pub win_accum: Money,
    pub loss_accum: Money,
    pub stop_win: Money,
    pub stop_loss: Money,
}
