//! Signal filter: tag allow/deny lists, volatility pressure and range states

use serde::Serialize;
use serde_json::{json, Value};

use super::{field_boolean, field_multiselect, field_number, field_string_array, Gate, Regime};
use crate::chain::{Check, Verdict};
use crate::config::{owned, GateSettings, Overrides};
use crate::types::{GateRequest, GateResult};

const BASE_SCORE: f64 = 70.0;
const BLOCKED_SCORE_CAP: f64 = 30.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalFilterSettings {
    pub blocked_tags: Vec<String>,
    pub required_tags: Vec<String>,
    pub max_vol_z: f64,
    pub block_range_states: Vec<String>,
    pub allow_range_when_trend_tag: bool,
}

impl Default for SignalFilterSettings {
    fn default() -> Self {
        Self {
            blocked_tags: owned(&["data_gap", "news_risk"]),
            required_tags: Vec::new(),
            max_vol_z: 2.5,
            block_range_states: owned(&["range"]),
            allow_range_when_trend_tag: false,
        }
    }
}

impl GateSettings for SignalFilterSettings {
    fn resolve(o: Overrides<'_>) -> Self {
        let d = Self::default();
        Self {
            blocked_tags: o.tags("blockedTags", d.blocked_tags),
            required_tags: o.tags("requiredTags", d.required_tags),
            max_vol_z: o.number("maxVolZ", d.max_vol_z),
            block_range_states: o.labels("blockRangeStates", d.block_range_states),
            allow_range_when_trend_tag: o.flag("allowRangeWhenTrendTag", d.allow_range_when_trend_tag),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignalFilter;

impl Gate for SignalFilter {
    fn strategy_type(&self) -> &'static str {
        "signal_filter"
    }

    fn name(&self) -> &'static str {
        "Signal Filter"
    }

    fn default_config(&self) -> Value {
        SignalFilterSettings::default_config()
    }

    fn ui_schema(&self) -> Value {
        json!({
            "title": self.name(),
            "description": "Blocks setups by tags, volatility pressure, and range-state constraints.",
            "fields": {
                "blockedTags": field_string_array(),
                "requiredTags": field_string_array(),
                "maxVolZ": field_number(0.0, 10.0, 0.1),
                "blockRangeStates": field_multiselect(&["range", "transition", "unknown"]),
                "allowRangeWhenTrendTag": field_boolean(),
            },
        })
    }

    fn evaluate(&self, request: &GateRequest) -> GateResult {
        let cfg = SignalFilterSettings::resolve(Overrides::new(&request.config));
        let snapshot = request.snapshot();

        let tags: Vec<String> = snapshot
            .get("tags")
            .array()
            .iter()
            .filter_map(Value::as_str)
            .map(|tag| tag.trim().to_lowercase())
            .collect();
        let has = |wanted: &String| tags.contains(wanted);

        let regime = Regime::read(snapshot);
        let vol_z = snapshot.path(&["historyContext", "vol", "z"]).f64();

        let has_trend_tag = tags.iter().any(|t| t == "trend_up" || t == "trend_down");
        let range_blocked = cfg.block_range_states.contains(&regime.state)
            && !(cfg.allow_range_when_trend_tag && has_trend_tag);

        let verdict = Verdict::evaluate([
            Check::block_if("blocked_tag_match", cfg.blocked_tags.iter().any(has)),
            Check::block_if(
                "required_tag_missing",
                !cfg.required_tags.is_empty() && !cfg.required_tags.iter().all(has),
            ),
            Check::block_if("volatility_guard", vol_z.is_some_and(|z| z.abs() > cfg.max_vol_z)),
            Check::block_if("range_state_block", range_blocked),
        ]);

        let pressure = vol_z.map_or(0.0, |z| (z.abs() - 1.0).max(0.0) * 10.0);
        let mut score = BASE_SCORE - pressure;
        let (tag, explanation) = if verdict.allow() {
            (
                "signal_filter_ok",
                "Signal filter passed with acceptable tag/volatility regime context.",
            )
        } else {
            score = score.min(BLOCKED_SCORE_CAP);
            (
                "signal_filter_block",
                "Signal filter blocked due to tag, volatility, or range-state restrictions.",
            )
        };

        let meta = json!({
            "strategy": self.strategy_type(),
            "signal": request.signal(),
            "tags": tags,
            "blockedTags": cfg.blocked_tags,
            "requiredTags": cfg.required_tags,
            "regimeState": regime.state,
            "volZ": vol_z,
            "maxVolZ": cfg.max_vol_z,
            "allowRangeWhenTrendTag": cfg.allow_range_when_trend_tag,
        });

        GateResult::from_verdict(verdict, score, vec![tag.to_string()], explanation, meta)
    }
}
