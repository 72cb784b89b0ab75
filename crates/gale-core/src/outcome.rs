//! Outcome notifications delivered over the signal channel.

use crate::error::{CoreError, Result};
use crate::trade::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settled result of a binary option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeResult {
    Win,
    Loss,
    Draw,
}

impl TradeResult {
    pub fn is_win(&self) -> bool {
        matches!(self, Self::Win)
    }
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "WIN"),
            Self::Loss => write!(f, "LOSS"),
            Self::Draw => write!(f, "DRAW"),
        }
    }
}

/// Asynchronous outcome notification for the currently open trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeEvent {
    /// A result. `stage` is set when the provider tagged which stage it refers to.
    Result {
        result: TradeResult,
        stage: Option<Stage>,
    },
    /// The provider announced gale `step`, meaning the stage before it lost.
    GaleTrigger { step: u8 },
}

impl OutcomeEvent {
    pub fn result(result: TradeResult) -> Self {
        Self::Result {
            result,
            stage: None,
        }
    }

    /// Parse a provider result token.
    ///
    /// `GALE1` / `GALE2` are wins at that gale.
    pub fn from_result_token(token: &str) -> Result<Self> {
        let event = match token.trim().to_ascii_uppercase().as_str() {
            "WIN" | "WON" => Self::result(TradeResult::Win),
            "LOSS" | "LOST" => Self::result(TradeResult::Loss),
            "DRAW" | "TIE" => Self::result(TradeResult::Draw),
            "GALE1" => Self::Result {
                result: TradeResult::Win,
                stage: Some(Stage::Gale1),
            },
            "GALE2" => Self::Result {
                result: TradeResult::Win,
                stage: Some(Stage::Gale2),
            },
            other => return Err(CoreError::InvalidResult(other.to_string())),
        };
        Ok(event)
    }

    /// Resolve this event against the stage currently awaited.
    ///
    /// Returns `None` when the event refers to a different stage.
    pub fn result_for(&self, awaited: Stage) -> Option<TradeResult> {
        match *self {
            Self::Result { result, stage } => match stage {
                Some(tagged) if tagged != awaited => None,
                _ => Some(result),
            },
            Self::GaleTrigger { step } => {
                let announced = Stage::from_gale_step(step)?;
                let lost = Stage::ALL
                    .iter()
                    .copied()
                    .find(|s| s.next() == Some(announced))?;
                (lost == awaited).then_some(TradeResult::Loss)
            }
        }
    }
}

impl fmt::Display for OutcomeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Result {
                result,
                stage: Some(stage),
            } => write!(f, "{result}@{stage}"),
            Self::Result { result, stage: None } => write!(f, "{result}"),
            Self::GaleTrigger { step } => write!(f, "GALE_TRIGGER({step})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_tokens() {
        assert_eq!(
            OutcomeEvent::from_result_token("win").unwrap(),
            OutcomeEvent::result(TradeResult::Win)
        );
        assert_eq!(
            OutcomeEvent::from_result_token("GALE2").unwrap(),
            OutcomeEvent::Result {
                result: TradeResult::Win,
                stage: Some(Stage::Gale2)
            }
        );
        assert!(OutcomeEvent::from_result_token("maybe").is_err());
    }

    #[test]
    fn test_untagged_result_applies_to_any_stage() {
        let event = OutcomeEvent::result(TradeResult::Loss);
        for stage in Stage::ALL {
            assert_eq!(event.result_for(stage), Some(TradeResult::Loss));
        }
    }

    #[test]
    fn test_tagged_result_discarded_on_stage_mismatch() {
        let event = OutcomeEvent::from_result_token("GALE1").unwrap();
        assert_eq!(event.result_for(Stage::Gale1), Some(TradeResult::Win));
        assert_eq!(event.result_for(Stage::Entry), None);
        assert_eq!(event.result_for(Stage::Gale2), None);
    }

    #[test]
    fn test_gale_trigger_settles_previous_stage_as_loss() {
        let gale1 = OutcomeEvent::GaleTrigger { step: 1 };
        assert_eq!(gale1.result_for(Stage::Entry), Some(TradeResult::Loss));
        assert_eq!(gale1.result_for(Stage::Gale1), None);

        let gale2 = OutcomeEvent::GaleTrigger { step: 2 };
        assert_eq!(gale2.result_for(Stage::Gale1), Some(TradeResult::Loss));
        assert_eq!(gale2.result_for(Stage::Entry), None);

        assert_eq!(OutcomeEvent::GaleTrigger { step: 7 }.result_for(Stage::Entry), None);
    }
}
