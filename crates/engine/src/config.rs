//! Per-call gate configuration
//!
//! Callers send a flat JSON object of overrides. Each gate owns a typed
//! settings struct whose `Default` impl is its documented default config; the
//! effective settings are those defaults overridden key by key. Unknown keys
//! are ignored and wrong-typed values keep the default for that key.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::sanitize::Node;

/// Raw caller-supplied overrides
pub type GateConfig = Map<String, Value>;

/// Typed settings resolved from defaults plus overrides
pub trait GateSettings: Default + Serialize {
    fn resolve(overrides: Overrides<'_>) -> Self;

    /// Default config as published in the registry listing
    fn default_config() -> Value {
        serde_json::to_value(Self::default()).unwrap_or_default()
    }
}

/// Shallow, typed view over a caller's override object
#[derive(Debug, Clone, Copy)]
pub struct Overrides<'a>(&'a GateConfig);

impl<'a> Overrides<'a> {
    pub fn new(config: &'a GateConfig) -> Self {
        Self(config)
    }

    fn node(&self, key: &str) -> Node<'a> {
        self.0.get(key).map(Node::new).unwrap_or_default()
    }

    pub fn number(&self, key: &str, default: f64) -> f64 {
        self.node(key).f64().unwrap_or(default)
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.node(key).bool_or(default)
    }

    /// Non-negative bar count, truncated toward zero
    pub fn bars(&self, key: &str, default: u64) -> u64 {
        self.node(key).age().unwrap_or(default)
    }

    /// String list, trimmed. Non-string items are skipped; a non-array keeps the default.
    pub fn labels(&self, key: &str, default: Vec<String>) -> Vec<String> {
        match self.node(key).value() {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .collect(),
            _ => default,
        }
    }

    /// Like [`Overrides::labels`] but lower-cased, for tag matching
    pub fn tags(&self, key: &str, default: Vec<String>) -> Vec<String> {
        self.labels(key, default)
            .into_iter()
            .map(|tag| tag.to_lowercase())
            .collect()
    }
}

pub(crate) fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(value: Value) -> GateConfig {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_override_only_touches_given_key() {
        let raw = cfg(json!({"minPassScore": 80, "unknownKey": 1}));
        let overrides = Overrides::new(&raw);
        assert_eq!(overrides.number("minPassScore", 70.0), 80.0);
        assert_eq!(overrides.number("maxVolZ", 2.5), 2.5);
    }

    #[test]
    fn test_wrong_types_fall_back_to_default() {
        let raw = cfg(json!({
            "minPassScore": "not-a-number",
            "allowNeutralSignal": "yes",
            "allowedStates": "trend_up",
            "maxEventAgeBars": null,
        }));
        let overrides = Overrides::new(&raw);
        assert_eq!(overrides.number("minPassScore", 70.0), 70.0);
        assert!(!overrides.flag("allowNeutralSignal", false));
        assert_eq!(
            overrides.labels("allowedStates", owned(&["trend_up", "trend_down"])),
            owned(&["trend_up", "trend_down"])
        );
        assert_eq!(overrides.bars("maxEventAgeBars", 120), 120);
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let raw = cfg(json!({"minRegimeConf": "60", "maxSignalAgeBars": 6.7}));
        let overrides = Overrides::new(&raw);
        assert_eq!(overrides.number("minRegimeConf", 55.0), 60.0);
        assert_eq!(overrides.bars("maxSignalAgeBars", 4), 6);
    }

    #[test]
    fn test_lists_skip_non_strings_and_normalize_tags() {
        let raw = cfg(json!({"blockedTags": [" News_Risk ", 5, null, "DATA_GAP"]}));
        let overrides = Overrides::new(&raw);
        assert_eq!(
            overrides.tags("blockedTags", Vec::new()),
            owned(&["news_risk", "data_gap"])
        );
    }
}
