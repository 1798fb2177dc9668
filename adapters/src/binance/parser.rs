//! Binance kline decoding.
//!
//! Two wire shapes carry bars:
//!
//! REST `GET /klines` returns an array of positional rows:
//!
//! ```jsonc
//! [
//!   [1499040000000, "0.0163", "0.8000", "0.0157", "0.0157", "148976.11", 1499644799999, ...],
//!   ...
//! ]
//! ```
//!
//! Indices 0–5 are start time, open, high, low, close and volume. Index 6
//! is the close time; a row whose close time lies in the future is the
//! bar still in progress and is not part of the closed history.
//!
//! The stream pushes one envelope per tick:
//!
//! ```jsonc
//! { "e": "kline", "E": 1672515782136, "s": "BTCUSDT",
//!   "k": { "t": 1672515780000, "o": "0.0010", "h": "0.0025", "l": "0.0010",
//!          "c": "0.0020", "v": "1000", "x": false, ... } }
//! ```
//!
//! Non-kline events decode to `Ok(None)`; anything that is not valid JSON
//! or lacks the kline fields is an error the caller drops and logs.

use corelib::{Bar, FeedUpdate};
use serde_json::Value;
use tracing::warn;

use super::errors::BinanceError;
use super::types::{Decimal, KlinePayload, StreamEnvelope};

pub fn parse_kline_message(raw: &str) -> Result<Option<FeedUpdate>, BinanceError> {
    let envelope: StreamEnvelope = serde_json::from_str(raw)?;

    if envelope.event_type != "kline" {
        return Ok(None);
    }

    let kline = envelope
        .kline
        .ok_or_else(|| BinanceError::InvalidResponse("kline event without payload".into()))?;

    Ok(Some(kline_to_update(&kline)?))
}

fn kline_to_update(k: &KlinePayload) -> Result<FeedUpdate, BinanceError> {
    let field = |name: &str, d: &Decimal| {
        d.to_f64()
            .ok_or_else(|| BinanceError::InvalidResponse(format!("kline field `{name}` is not numeric")))
    };

    let bar = Bar {
        start_time: k.start_time,
        open: field("o", &k.open)?,
        high: field("h", &k.high)?,
        low: field("l", &k.low)?,
        close: field("c", &k.close)?,
        volume: field("v", &k.volume)?,
    };

    Ok(FeedUpdate {
        bar,
        is_final: k.is_closed,
    })
}

/// Decodes one positional REST row into a bar and its close time, if present.
pub fn parse_kline_row(row: &Value) -> Result<(Bar, Option<u64>), BinanceError> {
    let cols = row
        .as_array()
        .ok_or_else(|| BinanceError::InvalidResponse("kline row is not an array".into()))?;

    if cols.len() < 6 {
        return Err(BinanceError::InvalidResponse(format!(
            "kline row has {} columns, expected at least 6",
            cols.len()
        )));
    }

    let start_time = cols[0]
        .as_u64()
        .ok_or_else(|| BinanceError::InvalidResponse("kline start time is not an integer".into()))?;

    let num = |idx: usize| -> Result<f64, BinanceError> {
        let d: Decimal = serde_json::from_value(cols[idx].clone())?;
        d.to_f64()
            .ok_or_else(|| BinanceError::InvalidResponse(format!("kline column {idx} is not numeric")))
    };

    let bar = Bar {
        start_time,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
    };

    Ok((bar, cols.get(6).and_then(Value::as_u64)))
}

/// Decodes a REST kline response into closed bars, oldest first.
///
/// Rows that fail to decode are skipped with a warning; the in-progress
/// row (close time after `now_ms`) is dropped.
pub fn parse_kline_rows(rows: &[Value], now_ms: u64) -> Vec<Bar> {
    let mut bars = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        match parse_kline_row(row) {
            Ok((_, Some(close_time))) if close_time > now_ms => {
                tracing::debug!(idx, close_time, "dropping in-progress kline");
            }
            Ok((bar, _)) => bars.push(bar),
            Err(e) => warn!(idx, error = %e, "skipping malformed kline row"),
        }
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    fn parses_open_kline_tick() {
        let raw = json!({
            "e": "kline",
            "E": 1672515782136u64,
            "s": "BTCUSDT",
            "k": {
                "t": 1672515780000u64,
                "T": 1672515839999u64,
                "s": "BTCUSDT",
                "i": "1m",
                "o": "16500.10",
                "c": "16510.00",
                "h": "16520.50",
                "l": "16495.00",
                "v": "12.5",
                "x": false
            }
        })
        .to_string();

        let update = parse_kline_message(&raw).unwrap().unwrap();
        assert!(!update.is_final);
        assert_eq!(update.bar.start_time, 1672515780000);
        assert_eq!(update.bar.open, 16500.10);
        assert_eq!(update.bar.high, 16520.50);
        assert_eq!(update.bar.low, 16495.00);
        assert_eq!(update.bar.close, 16510.00);
        assert_eq!(update.bar.volume, 12.5);
    }

    #[test]
    fn closed_flag_marks_update_final() {
        let raw = r#"{"e":"kline","k":{"t":60000,"o":"1","h":"2","l":"0.5","c":"1.5","v":"3","x":true}}"#;
        let update = parse_kline_message(raw).unwrap().unwrap();
        assert!(update.is_final);
    }

    #[test]
    fn other_event_types_are_ignored() {
        let raw = r#"{"e":"trade","p":"1.0"}"#;
        assert!(parse_kline_message(raw).unwrap().is_none());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_kline_message("not json").is_err());
        assert!(parse_kline_message(r#"{"e":"kline"}"#).is_err());

        let bad_number = r#"{"e":"kline","k":{"t":1,"o":"abc","h":"2","l":"0.5","c":"1.5","v":"3","x":false}}"#;
        assert!(matches!(
            parse_kline_message(bad_number),
            Err(BinanceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn rest_rows_map_positionally() {
        let rows = vec![
            json!([60000u64, "100.0", "110.0", "90.0", "105.0", "42.0", 119999u64, "0", 10, "0", "0", "0"]),
            json!([120000u64, 105.0, 108.0, 101.0, 102.0, 7.0]),
        ];

        let bars = parse_kline_rows(&rows, 1_000_000);
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0],
            Bar {
                start_time: 60000,
                open: 100.0,
                high: 110.0,
                low: 90.0,
                close: 105.0,
                volume: 42.0,
            }
        );
        assert_eq!(bars[1].close, 102.0);
    }

    #[test]
    #[traced_test]
    fn in_progress_and_malformed_rows_are_dropped() {
        let rows = vec![
            json!([60000u64, "1", "2", "0.5", "1.5", "3", 119999u64]),
            json!(["oops"]),
            json!([120000u64, "1", "2", "0.5", "1.5", "3", 179999u64]),
        ];

        let bars = parse_kline_rows(&rows, 150_000);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].start_time, 60000);
        assert!(logs_contain("skipping malformed kline row"));
    }
}
