//! OHLCV bar table extraction from `ohlcvSeries`

use std::cmp::Ordering;

use serde_json::Value;

use super::IndicatorError;
use crate::sanitize::{as_float, to_ts_ms, Node};

/// Minimum usable bars for indicator computation
pub const MIN_BARS: usize = 35;

const DEFAULT_FORMAT: [&str; 6] = ["ts", "open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Validated bars in ascending time order
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvFrame {
    bars: Vec<Bar>,
}

impl OhlcvFrame {
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

struct Row {
    sort_key: Option<f64>,
    bar: Bar,
}

/// Numeric timestamps order by value, ISO strings by instant
fn sort_key(ts: Option<&Value>) -> Option<f64> {
    match ts? {
        text @ Value::String(_) => to_ts_ms(text).map(|ms| ms as f64),
        number @ Value::Number(_) => as_float(number),
        _ => None,
    }
}

fn bar_from<'v>(lookup: impl Fn(&str) -> Option<&'v Value>) -> Option<Bar> {
    let field = |key: &str| lookup(key).and_then(as_float);
    Some(Bar {
        open: field("open")?,
        high: field("high")?,
        low: field("low")?,
        close: field("close")?,
        volume: field("volume")?,
    })
}

fn parse_row(raw: &Value, format: &[&str]) -> Option<Row> {
    match raw {
        Value::Object(map) => {
            let bar = bar_from(|key| map.get(key))?;
            Some(Row {
                sort_key: sort_key(map.get("ts")),
                bar,
            })
        }
        Value::Array(items) if items.len() >= DEFAULT_FORMAT.len() => {
            let position = |key: &str| format.iter().position(|name| *name == key);
            let lookup = |key: &str| position(key).and_then(|idx| items.get(idx));
            let bar = bar_from(lookup)?;
            Some(Row {
                sort_key: sort_key(lookup("ts")),
                bar,
            })
        }
        _ => None,
    }
}

/// Build the bar table from a feature snapshot.
///
/// `ohlcvSeries.bars` must hold at least [`MIN_BARS`] rows, and at least as
/// many must survive numeric validation. Rows are either objects keyed by
/// field name or positional arrays read through `ohlcvSeries.format`.
pub fn extract_frame(snapshot: Node<'_>) -> Result<OhlcvFrame, IndicatorError> {
    let series = snapshot.get("ohlcvSeries");
    if series.object().is_none() {
        return Err(IndicatorError::InputMissing);
    }

    let raw_bars = match series.get("bars").value() {
        Some(Value::Array(items)) if items.len() >= MIN_BARS => items,
        _ => return Err(IndicatorError::InputMissing),
    };

    let custom: Option<Vec<&str>> = match series.get("format").value() {
        Some(Value::Array(names)) if names.len() >= DEFAULT_FORMAT.len() => {
            names.iter().map(Value::as_str).collect()
        }
        _ => None,
    };
    let format: Vec<&str> = custom.unwrap_or_else(|| DEFAULT_FORMAT.to_vec());

    let mut rows: Vec<Row> = raw_bars
        .iter()
        .filter_map(|raw| parse_row(raw, &format))
        .collect();
    if rows.len() < MIN_BARS {
        return Err(IndicatorError::InputMissing);
    }

    // Stable: equal or unparseable timestamps keep their input order, unparseable last
    rows.sort_by(|a, b| match (a.sort_key, b.sort_key) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    Ok(OhlcvFrame {
        bars: rows.into_iter().map(|row| row.bar).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests::rising_bars;
    use serde_json::json;

    fn extract(snapshot: &Value) -> Result<OhlcvFrame, IndicatorError> {
        extract_frame(Node::new(snapshot))
    }

    #[test]
    fn test_missing_or_short_series() {
        assert_eq!(extract(&json!({})), Err(IndicatorError::InputMissing));
        assert_eq!(
            extract(&json!({"ohlcvSeries": []})),
            Err(IndicatorError::InputMissing)
        );
        assert_eq!(
            extract(&json!({"ohlcvSeries": {"bars": rising_bars(34)}})),
            Err(IndicatorError::InputMissing)
        );
        assert_eq!(extract(&json!({"ohlcvSeries": {"bars": rising_bars(35)}})).unwrap().len(), 35);
    }

    #[test]
    fn test_invalid_rows_are_dropped_before_count() {
        let mut bars = rising_bars(36);
        bars[3]["close"] = json!("NaN");
        bars[7]["volume"] = json!(null);
        assert_eq!(
            extract(&json!({"ohlcvSeries": {"bars": bars}})),
            Err(IndicatorError::InputMissing)
        );
    }

    #[test]
    fn test_positional_rows_use_format() {
        let rows: Vec<Value> = (0..40)
            .map(|i| {
                let p = 100.0 + i as f64;
                // Column 2 is not named by the format and must be ignored
                json!([p + 1.0, p - 1.0, -1.0, p + 0.5, 10.0, 1_770_000_000 + i * 60, p])
            })
            .collect();
        let snapshot = json!({"ohlcvSeries": {
            "format": ["high", "low", "unused", "close", "volume", "ts", "open"],
            "bars": rows,
        }});
        let frame = extract(&snapshot).unwrap();
        assert_eq!(frame.len(), 40);
        assert_eq!(frame.bars()[0], Bar { open: 100.0, high: 101.0, low: 99.0, close: 100.5, volume: 10.0 });
        assert_eq!(frame.last_close(), Some(139.5));
    }

    #[test]
    fn test_short_positional_rows_and_bad_format() {
        let mut rows: Vec<Value> = (0..35)
            .map(|i| json!([i, 1.0, 2.0, 0.5, 1.5, 100.0]))
            .collect();
        rows[0] = json!([0, 1.0, 2.0, 0.5, 1.5]);
        // A non-string format entry means the default column order applies
        let snapshot = json!({"ohlcvSeries": {"format": ["ts", 1, 2, 3, 4, 5], "bars": rows}});
        assert_eq!(extract(&snapshot), Err(IndicatorError::InputMissing));
    }

    #[test]
    fn test_rows_sorted_by_timestamp_unparsed_last() {
        let mut bars = rising_bars(40);
        bars.reverse();
        bars[0]["ts"] = json!("garbage");
        let frame = extract(&json!({"ohlcvSeries": {"bars": bars.clone()}})).unwrap();
        let closes = frame.closes();
        // The garbage-timestamped row was the newest bar; it sorts to the end
        assert_eq!(closes.last().copied(), bars[0]["close"].as_f64());
        assert!(closes[..39].windows(2).all(|w| w[0] < w[1]));
    }
}
