//! Trend+Vol gate: regime, EMA stack/slope/distance and volume pressure

use serde::Serialize;
use serde_json::{json, Value};

use super::{
    field_boolean, field_multiselect, field_number, fmt_num, indicator, neutral_signal_check,
    risk_data_gap, verdict_word, Gate, Regime, REGIME_STATES,
};
use crate::chain::{Check, Verdict};
use crate::config::{owned, GateSettings, Overrides};
use crate::sanitize::finalize_score;
use crate::types::{GateRequest, GateResult, Signal};

const HIGH_VOL_Z: f64 = 1.5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendVolSettings {
    pub allowed_states: Vec<String>,
    pub min_regime_conf: f64,
    pub require_stack_alignment: bool,
    pub require_slope_alignment: bool,
    pub min_abs_d50_pct: f64,
    pub min_abs_d200_pct: f64,
    pub max_vol_z: f64,
    pub max_rel_vol: f64,
    pub min_vol_z: f64,
    pub min_rel_vol: f64,
    pub min_pass_score: f64,
    pub allow_neutral_signal: bool,
}

impl Default for TrendVolSettings {
    fn default() -> Self {
        Self {
            allowed_states: owned(&["trend_up", "trend_down"]),
            min_regime_conf: 55.0,
            require_stack_alignment: true,
            require_slope_alignment: true,
            min_abs_d50_pct: 0.12,
            min_abs_d200_pct: 0.20,
            max_vol_z: 2.5,
            max_rel_vol: 1.8,
            min_vol_z: -1.2,
            min_rel_vol: 0.6,
            min_pass_score: 70.0,
            allow_neutral_signal: false,
        }
    }
}

impl GateSettings for TrendVolSettings {
    fn resolve(o: Overrides<'_>) -> Self {
        let d = Self::default();
        Self {
            allowed_states: o.labels("allowedStates", d.allowed_states),
            min_regime_conf: o.number("minRegimeConf", d.min_regime_conf),
            require_stack_alignment: o.flag("requireStackAlignment", d.require_stack_alignment),
            require_slope_alignment: o.flag("requireSlopeAlignment", d.require_slope_alignment),
            min_abs_d50_pct: o.number("minAbsD50Pct", d.min_abs_d50_pct),
            min_abs_d200_pct: o.number("minAbsD200Pct", d.min_abs_d200_pct),
            max_vol_z: o.number("maxVolZ", d.max_vol_z),
            max_rel_vol: o.number("maxRelVol", d.max_rel_vol),
            min_vol_z: o.number("minVolZ", d.min_vol_z),
            min_rel_vol: o.number("minRelVol", d.min_rel_vol),
            min_pass_score: o.number("minPassScore", d.min_pass_score),
            allow_neutral_signal: o.flag("allowNeutralSignal", d.allow_neutral_signal),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrendVolGate;

impl Gate for TrendVolGate {
    fn strategy_type(&self) -> &'static str {
        "trend_vol_gate"
    }

    fn name(&self) -> &'static str {
        "Trend+Vol Gate"
    }

    fn default_config(&self) -> Value {
        TrendVolSettings::default_config()
    }

    fn ui_schema(&self) -> Value {
        json!({
            "title": self.name(),
            "description": "Deterministic gate on regime, EMA alignment, distance and volume pressure.",
            "fields": {
                "allowedStates": field_multiselect(&REGIME_STATES),
                "minRegimeConf": field_number(0.0, 100.0, 1.0),
                "requireStackAlignment": field_boolean(),
                "requireSlopeAlignment": field_boolean(),
                "minAbsD50Pct": field_number(0.0, 5.0, 0.01),
                "minAbsD200Pct": field_number(0.0, 5.0, 0.01),
                "maxVolZ": field_number(0.0, 10.0, 0.1),
                "maxRelVol": field_number(0.0, 5.0, 0.1),
                "minVolZ": field_number(-10.0, 0.0, 0.1),
                "minRelVol": field_number(0.0, 2.0, 0.1),
                "minPassScore": field_number(0.0, 100.0, 1.0),
                "allowNeutralSignal": field_boolean(),
            },
        })
    }

    fn evaluate(&self, request: &GateRequest) -> GateResult {
        let cfg = TrendVolSettings::resolve(Overrides::new(&request.config));
        let snapshot = request.snapshot();
        let signal = request.signal();

        let regime = Regime::read(snapshot);
        let ema = snapshot.path(&["historyContext", "ema"]);
        let stack = ema.get("stk").label();
        let d50 = ema.get("d50").f64();
        let d200 = ema.get("d200").f64();
        let sl50 = ema.get("sl50").f64();
        let vol = snapshot.path(&["historyContext", "vol"]);
        let vol_z = vol.get("z").f64();
        let rel_vol = vol.get("rv").f64();
        let data_gap = risk_data_gap(snapshot);

        let stack_aligned = (signal == Signal::Up && stack == "bull")
            || (signal == Signal::Down && stack == "bear");
        let slope_aligned = match (signal, sl50) {
            (Signal::Up, Some(slope)) => slope >= 0.0,
            (Signal::Down, Some(slope)) => slope <= 0.0,
            _ => false,
        };
        let distance_ok = match (d50, d200) {
            (Some(d50), Some(d200)) => {
                d50.abs() >= cfg.min_abs_d50_pct && d200.abs() >= cfg.min_abs_d200_pct
            }
            _ => false,
        };
        let vol_spike_risk = match (vol_z, rel_vol) {
            (Some(z), Some(rv)) => z >= cfg.max_vol_z && rv >= cfg.max_rel_vol,
            _ => false,
        };
        let low_liquidity_risk = vol_z.is_some_and(|z| z <= cfg.min_vol_z)
            || rel_vol.is_some_and(|rv| rv <= cfg.min_rel_vol);
        let vol_ok =
            !vol_spike_risk && !low_liquidity_risk && vol_z.is_some() && rel_vol.is_some();

        let score_base = regime.conf.unwrap_or(0.0);
        let score = finalize_score(
            0.6 * score_base
                + 20.0 * indicator(stack_aligned)
                + 10.0 * indicator(slope_aligned)
                + 10.0 * indicator(distance_ok)
                + 10.0 * indicator(vol_ok),
        );

        let verdict = Verdict::evaluate([
            neutral_signal_check(signal, !cfg.allow_neutral_signal),
            Check::block_if("regime_state_not_allowed", !regime.allowed_in(&cfg.allowed_states)),
            Check::block_if(
                "regime_confidence_low",
                regime.conf.map_or(true, |c| c < cfg.min_regime_conf),
            ),
            Check::when(cfg.require_stack_alignment, "ema_stack_conflict", !stack_aligned),
            Check::when(cfg.require_slope_alignment, "ema_slope_conflict", !slope_aligned),
            Check::block_if("distance_too_small", !distance_ok),
            Check::block_if("vol_spike_risk", vol_spike_risk),
            Check::block_if("low_liquidity_risk", low_liquidity_risk),
        ])
        .min_score(score, cfg.min_pass_score)
        .pass_code("trend_vol_gate_pass");

        let mut tags: Vec<String> = Vec::new();
        tags.extend(regime.trend_tag().map(str::to_string));
        if matches!(regime.state.as_str(), "range" | "transition") {
            tags.push("range_bound".to_string());
        }
        if vol_z.is_some_and(|z| z >= HIGH_VOL_Z) {
            tags.push("high_vol".to_string());
        }
        if low_liquidity_risk {
            tags.push("low_liquidity".to_string());
        }
        if data_gap {
            tags.push("data_gap".to_string());
        }

        let explanation = format!(
            "TrendVolGate {}: state={}, conf={}, signal={}, stack={}, z={}, rv={}.",
            verdict_word(verdict.allow()),
            regime.state,
            fmt_num(regime.conf),
            signal,
            stack,
            fmt_num(vol_z),
            fmt_num(rel_vol),
        );

        let meta = json!({
            "strategy": self.strategy_type(),
            "signal": signal,
            "regimeState": regime.state,
            "regimeConfidencePct": regime.conf,
            "emaStack": stack,
            "d50": d50,
            "d200": d200,
            "sl50": sl50,
            "volZ": vol_z,
            "relVol": rel_vol,
            "stackAligned": stack_aligned,
            "slopeAligned": slope_aligned,
            "distanceOk": distance_ok,
            "volSpikeRisk": vol_spike_risk,
            "lowLiquidityRisk": low_liquidity_risk,
            "scoreThreshold": cfg.min_pass_score,
            "scoreBase": score_base,
            "dataGap": data_gap,
        });

        GateResult::from_verdict(verdict, score, tags, &explanation, meta)
    }
}
