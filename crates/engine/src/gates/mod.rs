//! Gate catalogue
//!
//! Provides:
//! - `Gate` trait: one deterministic decision rule over a feature snapshot
//! - Seven built-in gates (regime, tag/volatility filter, trend+vol, SMC,
//!   two VuManChu variants and the indicator-backed trend+vol v2)
//! - Shared snapshot readers and explanation formatting

mod regime;
mod signal_filter;
mod smart_money;
mod ta_trend_vol;
mod trend_vol;
mod vmc_cipher;
mod vmc_divergence;

use std::sync::Arc;

use serde_json::{json, Value};

use crate::chain::Check;
use crate::indicators::IndicatorEngine;
use crate::sanitize::Node;
use crate::types::{GateRequest, GateResult, Signal};

pub use regime::{RegimeGate, RegimeSettings};
pub use signal_filter::{SignalFilter, SignalFilterSettings};
pub use smart_money::{SmartMoneyConcept, SmartMoneySettings};
pub use ta_trend_vol::{TaTrendVolGate, TaTrendVolSettings};
pub use trend_vol::{TrendVolGate, TrendVolSettings};
pub use vmc_cipher::{VmcCipherGate, VmcCipherSettings};
pub use vmc_divergence::{VmcDivergenceReversal, VmcDivergenceSettings};

pub const DEFAULT_VERSION: &str = "1.0.0";

/// A pure decision function over (config, snapshot, context)
pub trait Gate: Send + Sync {
    fn strategy_type(&self) -> &'static str;
    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str {
        DEFAULT_VERSION
    }

    fn default_config(&self) -> Value;
    fn ui_schema(&self) -> Value;
    fn evaluate(&self, request: &GateRequest) -> GateResult;
}

/// Every built-in gate, in registration order
pub fn builtin_gates(indicators: Arc<IndicatorEngine>) -> Vec<Arc<dyn Gate>> {
    vec![
        Arc::new(RegimeGate),
        Arc::new(SignalFilter),
        Arc::new(TrendVolGate),
        Arc::new(SmartMoneyConcept),
        Arc::new(VmcCipherGate),
        Arc::new(VmcDivergenceReversal),
        Arc::new(TaTrendVolGate::new(indicators)),
    ]
}

// ============================================================================
// Shared readers
// ============================================================================

/// `historyContext.reg`: regime label and confidence
#[derive(Debug, Clone)]
pub(crate) struct Regime {
    pub state: String,
    pub conf: Option<f64>,
}

impl Regime {
    pub fn read(snapshot: Node<'_>) -> Self {
        let reg = snapshot.path(&["historyContext", "reg"]);
        Self {
            state: reg.get("state").text_label(),
            conf: reg.get("conf").f64(),
        }
    }

    pub fn allowed_in(&self, states: &[String]) -> bool {
        states.iter().any(|s| *s == self.state)
    }

    /// Directional tags for trend regimes
    pub fn trend_tag(&self) -> Option<&'static str> {
        match self.state.as_str() {
            "trend_up" => Some("trend_up"),
            "trend_down" => Some("trend_down"),
            _ => None,
        }
    }
}

pub(crate) fn risk_data_gap(snapshot: Node<'_>) -> bool {
    snapshot.path(&["riskFlags", "dataGap"]).bool_or(false)
}

/// Shared first check of gates that refuse to run on a neutral signal
pub(crate) fn neutral_signal_check(signal: Signal, blocks_neutral: bool) -> Check {
    Check::when(blocks_neutral, "signal_missing_or_neutral", signal.is_neutral())
}

pub(crate) fn indicator(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

pub(crate) fn fmt_num(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "n/a".to_string(),
    }
}

pub(crate) fn verdict_word(allow: bool) -> &'static str {
    if allow {
        "pass"
    } else {
        "block"
    }
}

pub(crate) fn field_number(min: f64, max: f64, step: f64) -> Value {
    json!({"type": "number", "min": min, "max": max, "step": step})
}

pub(crate) fn field_boolean() -> Value {
    json!({"type": "boolean"})
}

pub(crate) fn field_multiselect(options: &[&str]) -> Value {
    json!({"type": "multiselect", "options": options})
}

pub(crate) fn field_string_array() -> Value {
    json!({"type": "string_array"})
}

pub(crate) const REGIME_STATES: [&str; 5] = ["trend_up", "trend_down", "range", "transition", "unknown"];
