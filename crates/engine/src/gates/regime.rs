//! Regime gate: regime label, confidence and EMA-stack alignment

use serde::Serialize;
use serde_json::{json, Value};

use super::{field_boolean, field_multiselect, field_number, Gate, Regime, REGIME_STATES};
use crate::chain::{Check, Verdict};
use crate::config::{owned, GateSettings, Overrides};
use crate::types::{GateRequest, GateResult, Signal};

const BLOCKED_SCORE_CAP: f64 = 35.0;
const SCORE_WITHOUT_CONFIDENCE: f64 = 50.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeSettings {
    pub allow_states: Vec<String>,
    pub min_regime_confidence_pct: f64,
    pub require_stack_alignment: bool,
    pub allow_unknown_regime: bool,
}

impl Default for RegimeSettings {
    fn default() -> Self {
        Self {
            allow_states: owned(&["trend_up", "trend_down", "transition"]),
            min_regime_confidence_pct: 45.0,
            require_stack_alignment: true,
            allow_unknown_regime: false,
        }
    }
}

impl GateSettings for RegimeSettings {
    fn resolve(o: Overrides<'_>) -> Self {
        let d = Self::default();
        Self {
            allow_states: o.labels("allowStates", d.allow_states),
            min_regime_confidence_pct: o.number("minRegimeConfidencePct", d.min_regime_confidence_pct),
            require_stack_alignment: o.flag("requireStackAlignment", d.require_stack_alignment),
            allow_unknown_regime: o.flag("allowUnknownRegime", d.allow_unknown_regime),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegimeGate;

impl Gate for RegimeGate {
    fn strategy_type(&self) -> &'static str {
        "regime_gate"
    }

    fn name(&self) -> &'static str {
        "Regime Gate"
    }

    fn default_config(&self) -> Value {
        RegimeSettings::default_config()
    }

    fn ui_schema(&self) -> Value {
        json!({
            "title": self.name(),
            "description": "Uses historyContext.reg and historyContext.ema.stk to allow/block deterministic setups.",
            "fields": {
                "allowStates": field_multiselect(&REGIME_STATES),
                "minRegimeConfidencePct": field_number(0.0, 100.0, 1.0),
                "requireStackAlignment": field_boolean(),
                "allowUnknownRegime": field_boolean(),
            },
        })
    }

    fn evaluate(&self, request: &GateRequest) -> GateResult {
        let cfg = RegimeSettings::resolve(Overrides::new(&request.config));
        let snapshot = request.snapshot();
        let signal = request.signal();

        let regime = Regime::read(snapshot);
        let stack = snapshot.path(&["historyContext", "ema", "stk"]).label();

        let regime_vs_stack = (regime.state == "trend_up" && stack == "bear")
            || (regime.state == "trend_down" && stack == "bull");
        let signal_vs_stack =
            (signal == Signal::Up && stack == "bear") || (signal == Signal::Down && stack == "bull");

        let verdict = Verdict::evaluate([
            Check::block_if(
                "regime_unknown",
                regime.state == "unknown" && !cfg.allow_unknown_regime,
            ),
            Check::block_if("regime_state_not_allowed", !regime.allowed_in(&cfg.allow_states)),
            Check::block_if(
                "regime_confidence_low",
                regime.conf.is_some_and(|c| c < cfg.min_regime_confidence_pct),
            ),
            Check::when(cfg.require_stack_alignment, "ema_stack_conflict", regime_vs_stack),
            Check::when(cfg.require_stack_alignment, "signal_stack_conflict", signal_vs_stack),
        ]);

        let base = regime.conf.unwrap_or(SCORE_WITHOUT_CONFIDENCE);
        let (score, tag, explanation) = if verdict.allow() {
            (base, "regime_ok", "Regime gate passed with aligned structure context.")
        } else {
            (
                base.min(BLOCKED_SCORE_CAP),
                "regime_block",
                "Regime gate blocked due to incompatible regime/EMA alignment.",
            )
        };

        let meta = json!({
            "strategy": self.strategy_type(),
            "signal": signal,
            "regimeState": regime.state,
            "regimeConfidencePct": regime.conf,
            "emaStack": stack,
            "minRegimeConfidencePct": cfg.min_regime_confidence_pct,
            "requireStackAlignment": cfg.require_stack_alignment,
        });

        GateResult::from_verdict(verdict, score, vec![tag.to_string()], explanation, meta)
    }
}
