//! Safe navigation over untyped feature snapshots
//!
//! Snapshots are loosely-typed JSON produced by an upstream feature pipeline.
//! Nothing in here fails: a wrong type, a NaN hidden in a string or a missing
//! branch all resolve to "absent", and the gates treat absent values as
//! failing whatever check consumes them.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

/// Upper bound on the length of a rendered explanation, in characters
pub const MAX_EXPLANATION_CHARS: usize = 220;

const EPOCH_MS_FLOOR: f64 = 1_000_000_000_000.0;
const EPOCH_SECS_FLOOR: f64 = 1_000_000_000.0;

/// Read-only cursor into a JSON document that may point at nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct Node<'a>(Option<&'a Value>);

impl<'a> Node<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self(Some(value))
    }

    pub fn missing() -> Self {
        Self(None)
    }

    /// Child lookup. Yields a missing node unless `self` is an object holding `key`.
    pub fn get(self, key: &str) -> Node<'a> {
        Node(self.0.and_then(Value::as_object).and_then(|map| map.get(key)))
    }

    pub fn path(self, keys: &[&str]) -> Node<'a> {
        keys.iter().fold(self, |node, key| node.get(key))
    }

    pub fn value(self) -> Option<&'a Value> {
        self.0
    }

    pub fn object(self) -> Option<&'a Map<String, Value>> {
        self.0.and_then(Value::as_object)
    }

    /// True only for a non-empty object
    pub fn is_present(self) -> bool {
        self.object().is_some_and(|map| !map.is_empty())
    }

    pub fn array(self) -> &'a [Value] {
        match self.0 {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }

    pub fn f64(self) -> Option<f64> {
        self.0.and_then(as_float)
    }

    pub fn bool_or(self, default: bool) -> bool {
        match self.0 {
            Some(Value::Bool(flag)) => *flag,
            _ => default,
        }
    }

    pub fn str(self) -> Option<&'a str> {
        self.0.and_then(Value::as_str)
    }

    /// Trimmed string label, `"unknown"` when absent, blank or not a string
    pub fn label(self) -> String {
        self.str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or("unknown")
            .to_string()
    }

    /// Like [`Node::label`] but non-zero numbers render as their decimal text
    pub fn text_label(self) -> String {
        match self.0 {
            Some(Value::Number(number)) if number.as_f64() != Some(0.0) => number.to_string(),
            _ => self.label(),
        }
    }

    /// Non-negative whole number (truncated toward zero), absent when unparseable
    pub fn age(self) -> Option<u64> {
        self.f64().map(|v| v.trunc().max(0.0) as u64)
    }

    /// Like [`Node::age`] but absent collapses to zero
    pub fn count(self) -> u64 {
        self.age().unwrap_or(0)
    }

    pub fn timestamp_ms(self) -> Option<i64> {
        self.0.and_then(to_ts_ms)
    }
}

/// Parse a JSON value as a finite IEEE double.
///
/// Numbers, numeric strings (surrounding whitespace ignored) and booleans
/// convert; NaN/Infinity and every other shape resolve to `None`.
pub fn as_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub fn clamp(value: f64, lower: f64, upper: f64) -> f64 {
    value.max(lower).min(upper)
}

/// Final score normalization: non-finite → 0, round half-to-even, clamp to [0, 100]
pub fn finalize_score(raw: f64) -> f64 {
    let finite = if raw.is_finite() { raw } else { 0.0 };
    clamp(finite.round_ties_even(), 0.0, 100.0)
}

pub fn bounded_explanation(text: &str) -> String {
    text.chars().take(MAX_EXPLANATION_CHARS).collect()
}

/// Convert a snapshot timestamp to epoch milliseconds.
///
/// Strings must be ISO-8601 (a missing zone means UTC). Numbers above 1e12
/// are milliseconds, above 1e9 seconds; anything smaller is rejected.
pub fn to_ts_ms(value: &Value) -> Option<i64> {
    if let Value::String(text) = value {
        return parse_iso_ms(text.trim());
    }
    let parsed = as_float(value)?;
    if parsed > EPOCH_MS_FLOOR {
        Some(parsed as i64)
    } else if parsed > EPOCH_SECS_FLOOR {
        Some((parsed * 1000.0) as i64)
    } else {
        None
    }
}

fn parse_iso_ms(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc().timestamp_millis())
}
