//! Trading signal types.

use crate::error::{CoreError, Result};
use crate::trade::Stage;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Direction
// ============================================================================

/// Trade direction as published by signal providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Binary-option wire name ("CALL" / "PUT").
    pub fn option_side(&self) -> &'static str {
        match self {
            Self::Buy => "CALL",
            Self::Sell => "PUT",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "CALL" | "UP" => Ok(Self::Buy),
            "SELL" | "PUT" | "DOWN" => Ok(Self::Sell),
            other => Err(CoreError::InvalidDirection(other.to_string())),
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Direction> for String {
    fn from(d: Direction) -> Self {
        d.as_str().to_string()
    }
}

// ============================================================================
// ClockTime
// ============================================================================

/// Wall-clock time of day ("HH:MM") at which a stage should be placed.
///
/// Interpreted in the scheduler's configured timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidTime(format!("{hour:02}:{minute:02}")))
    }

    #[inline]
    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for ClockTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(Self)
            .map_err(|_| CoreError::InvalidTime(s.to_string()))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ClockTime> for String {
    fn from(t: ClockTime) -> Self {
        t.to_string()
    }
}

/// Parse an "MM:SS" expiration into seconds. A bare integer is minutes.
pub fn parse_expiration(s: &str) -> Result<u32> {
    let s = s.trim();
    let invalid = || CoreError::InvalidExpiration(s.to_string());

    let seconds = match s.split_once(':') {
        Some((mm, ss)) => {
            let minutes: u32 = mm.parse().map_err(|_| invalid())?;
            let seconds: u32 = ss.parse().map_err(|_| invalid())?;
            if seconds >= 60 {
                return Err(invalid());
            }
            minutes * 60 + seconds
        }
        None => s.parse::<u32>().map_err(|_| invalid())? * 60,
    };

    if seconds == 0 {
        return Err(invalid());
    }
    Ok(seconds)
}

// ============================================================================
// Signal
// ============================================================================

/// A parsed trading signal. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    pub timeframe_seconds: u32,
    pub entry_time: Option<ClockTime>,
    pub gale1_time: Option<ClockTime>,
    pub gale2_time: Option<ClockTime>,
}

impl Signal {
    pub fn new(symbol: impl Into<String>, direction: Direction, timeframe_seconds: u32) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            timeframe_seconds,
            entry_time: None,
            gale1_time: None,
            gale2_time: None,
        }
    }

    #[must_use]
    pub fn with_entry_time(mut self, t: ClockTime) -> Self {
        self.entry_time = Some(t);
        self
    }

    #[must_use]
    pub fn with_gale_times(mut self, gale1: Option<ClockTime>, gale2: Option<ClockTime>) -> Self {
        self.gale1_time = gale1;
        self.gale2_time = gale2;
        self
    }

    /// Scheduled time for a stage, if the provider gave one.
    pub fn time_for(&self, stage: Stage) -> Option<ClockTime> {
        match stage {
            Stage::Entry => self.entry_time,
            Stage::Gale1 => self.gale1_time,
            Stage::Gale2 => self.gale2_time,
        }
    }

    /// Expiration formatted as "MM:SS" for venues that take a close type.
    pub fn expiration(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.timeframe_seconds / 60,
            self.timeframe_seconds % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse_aliases() {
        assert_eq!("buy".parse::<Direction>().unwrap(), Direction::Buy);
        assert_eq!("PUT".parse::<Direction>().unwrap(), Direction::Sell);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::Buy.option_side(), "CALL");
        assert_eq!(Direction::Sell.option_side(), "PUT");
    }

    #[test]
    fn test_clock_time_parse() {
        let t: ClockTime = "14:05".parse().unwrap();
        assert_eq!(t, ClockTime::new(14, 5).unwrap());
        assert_eq!(t.to_string(), "14:05");
        assert!("25:00".parse::<ClockTime>().is_err());
        assert!("".parse::<ClockTime>().is_err());
    }

    #[test]
    fn test_parse_expiration() {
        assert_eq!(parse_expiration("01:00").unwrap(), 60);
        assert_eq!(parse_expiration("05:00").unwrap(), 300);
        assert_eq!(parse_expiration("00:30").unwrap(), 30);
        assert_eq!(parse_expiration("5").unwrap(), 300);
        assert!(parse_expiration("00:00").is_err());
        assert!(parse_expiration("01:75").is_err());
        assert!(parse_expiration("x").is_err());
    }

    #[test]
    fn test_signal_time_for_stage() {
        let signal = Signal::new("EURUSD", Direction::Buy, 60)
            .with_entry_time("10:00".parse().unwrap())
            .with_gale_times(Some("10:01".parse().unwrap()), None);

        assert_eq!(signal.time_for(Stage::Entry).unwrap().to_string(), "10:00");
        assert_eq!(signal.time_for(Stage::Gale1).unwrap().to_string(), "10:01");
        assert!(signal.time_for(Stage::Gale2).is_none());
        assert_eq!(signal.expiration(), "01:00");
    }

    #[test]
    fn test_signal_serde() {
        let signal = Signal::new("EURUSD.OTC", Direction::Sell, 300)
            .with_entry_time("09:30".parse().unwrap());
        let json = serde_json::to_string(&signal).unwrap();
        assert!(json.contains("\"SELL\""));
        assert!(json.contains("\"09:30\""));
        let back: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signal);
    }
}
