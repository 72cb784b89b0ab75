//! Channel message parsing.
//!
//! Messages are JSON objects discriminated by `type`:
//!
//! ```json
//! {"type":"entry","symbol":"EURUSD","direction":"BUY","expiration":"01:00",
//!  "entry_time":"10:00","gale1":"10:01","gale2":"10:02"}
//! {"type":"result","result":"WIN"}
//! {"type":"gale_trigger","gale":1}
//! ```
//!
//! Entry timeframe may be given as `timeframe_seconds`, an `expiration`
//! ("MM:SS") or `timeframe_minutes`, in that order of preference.

use gale_core::{parse_expiration, ClockTime, Direction, OutcomeEvent, Signal};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ChannelError, ChannelResult};

/// Decoded channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    Entry(Signal),
    Outcome(OutcomeEvent),
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    symbol: String,
    direction: String,
    #[serde(default)]
    timeframe_seconds: Option<u32>,
    #[serde(default)]
    expiration: Option<String>,
    #[serde(default)]
    timeframe_minutes: Option<u32>,
    #[serde(default)]
    entry_time: Option<String>,
    #[serde(default, alias = "gale1")]
    gale1_time: Option<String>,
    #[serde(default, alias = "gale2")]
    gale2_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    result: String,
}

#[derive(Debug, Deserialize)]
struct RawGale {
    #[serde(alias = "step")]
    gale: u8,
}

/// Uppercase, trim and drop `/` separators ("eur/usd-otc" -> "EURUSD-OTC").
fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase().replace('/', "")
}

/// Empty strings are treated as absent times.
fn optional_time(raw: Option<String>) -> ChannelResult<Option<ClockTime>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Ok(Some(s.parse()?)),
    }
}

fn parse_entry(value: Value) -> ChannelResult<Signal> {
    let raw: RawEntry = serde_json::from_value(value)?;

    let symbol = normalize_symbol(&raw.symbol);
    if symbol.is_empty() {
        return Err(ChannelError::InvalidMessage("entry without symbol".to_string()));
    }
    let direction: Direction = raw.direction.parse()?;

    let timeframe_seconds = match (raw.timeframe_seconds, raw.expiration.as_deref(), raw.timeframe_minutes) {
        (Some(secs), _, _) if secs > 0 => secs,
        (_, Some(exp), _) if !exp.trim().is_empty() => parse_expiration(exp)?,
        (_, _, Some(mins)) if mins > 0 => mins * 60,
        _ => {
            return Err(ChannelError::InvalidMessage(
                "entry without timeframe".to_string(),
            ))
        }
    };

    Ok(Signal {
        symbol,
        direction,
        timeframe_seconds,
        entry_time: optional_time(raw.entry_time)?,
        gale1_time: optional_time(raw.gale1_time)?,
        gale2_time: optional_time(raw.gale2_time)?,
    })
}

/// Parse one raw channel payload.
pub fn parse_message(text: &str) -> ChannelResult<ChannelMessage> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| ChannelError::InvalidMessage("missing type".to_string()))?;

    match kind.as_str() {
        "entry" => Ok(ChannelMessage::Entry(parse_entry(value)?)),
        "result" => {
            let raw: RawResult = serde_json::from_value(value)?;
            Ok(ChannelMessage::Outcome(OutcomeEvent::from_result_token(
                &raw.result,
            )?))
        }
        "gale" | "gale_trigger" => {
            let raw: RawGale = serde_json::from_value(value)?;
            Ok(ChannelMessage::Outcome(OutcomeEvent::GaleTrigger {
                step: raw.gale,
            }))
        }
        other => Err(ChannelError::UnknownType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gale_core::{Stage, TradeResult};

    #[test]
    fn test_parse_full_entry() {
        let msg = parse_message(
            r#"{"type":"entry","symbol":"eur/usd","direction":"buy","expiration":"05:00",
                "entry_time":"10:00","gale1":"10:05","gale2":"10:10"}"#,
        )
        .unwrap();

        let ChannelMessage::Entry(signal) = msg else {
            panic!("expected entry");
        };
        assert_eq!(signal.symbol, "EURUSD");
        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.timeframe_seconds, 300);
        assert_eq!(signal.entry_time.unwrap().to_string(), "10:00");
        assert_eq!(signal.time_for(Stage::Gale2).unwrap().to_string(), "10:10");
    }

    #[test]
    fn test_parse_entry_without_schedule() {
        let msg = parse_message(
            r#"{"type":"entry","symbol":"EURUSD-OTC","direction":"SELL","timeframe_minutes":1,
                "gale1":"","gale2":null}"#,
        )
        .unwrap();

        let ChannelMessage::Entry(signal) = msg else {
            panic!("expected entry");
        };
        assert_eq!(signal.symbol, "EURUSD-OTC");
        assert_eq!(signal.timeframe_seconds, 60);
        assert!(signal.entry_time.is_none());
        assert!(signal.gale1_time.is_none());
        assert!(signal.gale2_time.is_none());
    }

    #[test]
    fn test_timeframe_seconds_preferred() {
        let msg = parse_message(
            r#"{"type":"entry","symbol":"EURUSD","direction":"BUY","timeframe_seconds":30,
                "expiration":"05:00"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ChannelMessage::Entry(s) if s.timeframe_seconds == 30));
    }

    #[test]
    fn test_entry_without_timeframe_rejected() {
        let err = parse_message(r#"{"type":"entry","symbol":"EURUSD","direction":"BUY"}"#)
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidMessage(_)));
    }

    #[test]
    fn test_entry_with_bad_direction_rejected() {
        let err = parse_message(
            r#"{"type":"entry","symbol":"EURUSD","direction":"HOLD","expiration":"01:00"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidField(_)));
    }

    #[test]
    fn test_parse_results() {
        assert_eq!(
            parse_message(r#"{"type":"result","result":"WIN"}"#).unwrap(),
            ChannelMessage::Outcome(OutcomeEvent::result(TradeResult::Win))
        );
        assert_eq!(
            parse_message(r#"{"type":"result","result":"GALE1"}"#).unwrap(),
            ChannelMessage::Outcome(OutcomeEvent::Result {
                result: TradeResult::Win,
                stage: Some(Stage::Gale1),
            })
        );
    }

    #[test]
    fn test_parse_gale_trigger_aliases() {
        for text in [
            r#"{"type":"gale_trigger","gale":2}"#,
            r#"{"type":"gale","step":2}"#,
        ] {
            assert_eq!(
                parse_message(text).unwrap(),
                ChannelMessage::Outcome(OutcomeEvent::GaleTrigger { step: 2 })
            );
        }
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert!(matches!(
            parse_message(r#"{"type":"heartbeat"}"#).unwrap_err(),
            ChannelError::UnknownType(_)
        ));
        assert!(parse_message("not json").is_err());
        assert!(parse_message(r#"{"result":"WIN"}"#).is_err());
    }
}
