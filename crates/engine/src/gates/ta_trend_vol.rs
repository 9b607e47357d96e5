//! Trend + volatility gate v2 with indicators computed from the raw OHLCV series
//!
//! When `ohlcvSeries` yields a usable frame the configured indicator backend
//! supplies RSI/ADX/ATR%/EMA. Any frame or compute failure falls back to the
//! precomputed values already present in the snapshot.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use super::{
    field_boolean, field_multiselect, field_number, fmt_num, indicator, neutral_signal_check, risk_data_gap,
    verdict_word, Gate, Regime, REGIME_STATES,
};
use crate::chain::{Check, Verdict};
use crate::config::{owned, GateSettings, Overrides};
use crate::indicators::{extract_frame, IndicatorEngine, IndicatorError, IndicatorValues};
use crate::sanitize::{finalize_score, Node};
use crate::types::{GateRequest, GateResult, Signal};

const HIGH_VOL_ATR_PCT: f64 = 1.5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaTrendVolSettings {
    pub allowed_states: Vec<String>,
    pub min_regime_conf: f64,
    pub min_adx: f64,
    pub max_atr_pct: f64,
    pub rsi_long_min: f64,
    pub rsi_short_max: f64,
    pub require_ema_alignment: bool,
    pub min_pass_score: f64,
    pub allow_neutral_signal: bool,
}

impl Default for TaTrendVolSettings {
    fn default() -> Self {
        Self {
            allowed_states: owned(&["trend_up", "trend_down"]),
            min_regime_conf: 50.0,
            min_adx: 18.0,
            max_atr_pct: 2.0,
            rsi_long_min: 52.0,
            rsi_short_max: 48.0,
            require_ema_alignment: true,
            min_pass_score: 65.0,
            allow_neutral_signal: false,
        }
    }
}

impl GateSettings for TaTrendVolSettings {
    fn resolve(o: Overrides<'_>) -> Self {
        let d = Self::default();
        Self {
            allowed_states: o.labels("allowedStates", d.allowed_states),
            min_regime_conf: o.number("minRegimeConf", d.min_regime_conf),
            min_adx: o.number("minAdx", d.min_adx),
            max_atr_pct: o.number("maxAtrPct", d.max_atr_pct),
            rsi_long_min: o.number("rsiLongMin", d.rsi_long_min),
            rsi_short_max: o.number("rsiShortMax", d.rsi_short_max),
            require_ema_alignment: o.flag("requireEmaAlignment", d.require_ema_alignment),
            min_pass_score: o.number("minPassScore", d.min_pass_score),
            allow_neutral_signal: o.flag("allowNeutralSignal", d.allow_neutral_signal),
        }
    }
}

/// Where the indicator values came from and what went wrong on the way
#[derive(Debug, Clone)]
struct IndicatorSource {
    values: IndicatorValues,
    source: &'static str,
    backend: Option<&'static str>,
    error: Option<IndicatorError>,
}

/// Precomputed indicators already carried by the snapshot
fn snapshot_indicators(snapshot: Node<'_>) -> IndicatorValues {
    let indicators = snapshot.get("indicators");
    let ema = snapshot.path(&["historyContext", "ema"]);
    IndicatorValues {
        rsi: indicators.get("rsi_14").f64(),
        adx: indicators.path(&["adx", "adx_14"]).f64(),
        atr_pct: indicators.get("atr_pct").f64(),
        ema_fast: ema.get("ema20").f64(),
        ema_slow: ema.get("ema50").f64(),
    }
}

/// Indicator-backed variant of the trend/volatility gate
#[derive(Debug, Clone, Default)]
pub struct TaTrendVolGate {
    indicators: Arc<IndicatorEngine>,
}

impl TaTrendVolGate {
    pub fn new(indicators: Arc<IndicatorEngine>) -> Self {
        Self { indicators }
    }

    fn resolve_indicators(&self, snapshot: Node<'_>) -> IndicatorSource {
        let frame = match extract_frame(snapshot) {
            Ok(frame) => frame,
            Err(err) => {
                return IndicatorSource {
                    values: snapshot_indicators(snapshot),
                    source: "fallback",
                    backend: None,
                    error: Some(err),
                }
            }
        };

        let run = self.indicators.compute(&frame);
        match run.outcome {
            Ok(values) => IndicatorSource {
                values,
                source: "ohlcv",
                backend: Some(run.backend),
                error: None,
            },
            Err(err) => IndicatorSource {
                values: snapshot_indicators(snapshot),
                source: "fallback",
                backend: Some(run.backend),
                error: Some(err),
            },
        }
    }
}

impl Gate for TaTrendVolGate {
    fn strategy_type(&self) -> &'static str {
        "ta_trend_vol_gate_v2"
    }

    fn name(&self) -> &'static str {
        "TA Trend+Vol Gate v2"
    }

    fn default_config(&self) -> Value {
        TaTrendVolSettings::default_config()
    }

    fn ui_schema(&self) -> Value {
        json!({
            "title": self.name(),
            "description": "Computes RSI/ADX/ATR%/EMA from ohlcvSeries, falling back to snapshot indicators.",
            "fields": {
                "allowedStates": field_multiselect(&REGIME_STATES),
                "minRegimeConf": field_number(0.0, 100.0, 1.0),
                "minAdx": field_number(0.0, 100.0, 0.5),
                "maxAtrPct": field_number(0.0, 20.0, 0.1),
                "rsiLongMin": field_number(0.0, 100.0, 1.0),
                "rsiShortMax": field_number(0.0, 100.0, 1.0),
                "requireEmaAlignment": field_boolean(),
                "minPassScore": field_number(0.0, 100.0, 1.0),
                "allowNeutralSignal": field_boolean(),
            },
        })
    }

    fn evaluate(&self, request: &GateRequest) -> GateResult {
        let cfg = TaTrendVolSettings::resolve(Overrides::new(&request.config));
        let snapshot = request.snapshot();
        let signal = request.signal();

        let regime = Regime::read(snapshot);
        let data_gap = risk_data_gap(snapshot);
        let resolved = self.resolve_indicators(snapshot);
        let IndicatorValues {
            rsi,
            adx,
            atr_pct,
            ema_fast,
            ema_slow,
        } = resolved.values;

        let ema_aligned = match (signal, ema_fast, ema_slow) {
            (Signal::Up, Some(fast), Some(slow)) => fast >= slow,
            (Signal::Down, Some(fast), Some(slow)) => fast <= slow,
            _ => false,
        };
        let rsi_aligned = match (signal, rsi) {
            (Signal::Up, Some(rsi)) => rsi >= cfg.rsi_long_min,
            (Signal::Down, Some(rsi)) => rsi <= cfg.rsi_short_max,
            _ => false,
        };
        let adx_ok = adx.is_some_and(|adx| adx >= cfg.min_adx);
        let atr_ok = atr_pct.is_some_and(|atr| atr <= cfg.max_atr_pct);

        let score = finalize_score(
            0.4 * regime.conf.unwrap_or(0.0)
                + 20.0 * indicator(adx_ok)
                + 15.0 * indicator(rsi_aligned)
                + 15.0 * indicator(atr_ok)
                + 10.0 * indicator(ema_aligned),
        );

        let error_code = resolved.error.as_ref().map(IndicatorError::code);

        let verdict = Verdict::evaluate([
            neutral_signal_check(signal, !cfg.allow_neutral_signal),
            Check::block_if("regime_state_not_allowed", !regime.allowed_in(&cfg.allowed_states)),
            Check::block_if(
                "regime_confidence_low",
                regime.conf.map_or(true, |conf| conf < cfg.min_regime_conf),
            ),
            Check::block_if("ta_backend_unavailable", error_code == Some("ta_backend_unavailable")),
            Check::block_if("ta_input_missing", adx.is_none() || rsi.is_none() || atr_pct.is_none()),
            Check::block_if("adx_too_low", !adx_ok),
            Check::block_if("atr_too_high", !atr_ok),
            Check::block_if("rsi_not_aligned", !rsi_aligned),
            Check::when(cfg.require_ema_alignment, "ema_not_aligned", !ema_aligned),
        ])
        .min_score(score, cfg.min_pass_score)
        .pass_code("ta_trend_vol_gate_v2_pass");

        let mut tags: Vec<String> = Vec::new();
        tags.extend(regime.trend_tag().map(str::to_string));
        if data_gap {
            tags.push("data_gap".to_string());
        }
        if atr_pct.is_some_and(|atr| atr >= HIGH_VOL_ATR_PCT) {
            tags.push("high_vol".to_string());
        }

        let explanation = format!(
            "TA TrendVol v2 {}: state={}, conf={}, adx={}, rsi={}, atr%={}, src={}.",
            verdict_word(verdict.allow()),
            regime.state,
            fmt_num(regime.conf),
            fmt_num(adx),
            fmt_num(rsi),
            fmt_num(atr_pct),
            resolved.source,
        );

        let meta = json!({
            "strategy": self.strategy_type(),
            "signal": signal,
            "regimeState": regime.state,
            "regimeConfidencePct": regime.conf,
            "indicatorSource": resolved.source,
            "taBackend": resolved.backend,
            "taError": error_code,
            "rsi": rsi,
            "adx": adx,
            "atrPct": atr_pct,
            "emaFast": ema_fast,
            "emaSlow": ema_slow,
            "emaAligned": ema_aligned,
            "rsiAligned": rsi_aligned,
            "adxOk": adx_ok,
            "atrOk": atr_ok,
            "scoreThreshold": cfg.min_pass_score,
            "dataGap": data_gap,
        });

        GateResult::from_verdict(verdict, score, tags, &explanation, meta)
    }
}
