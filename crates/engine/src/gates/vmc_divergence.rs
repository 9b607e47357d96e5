//! VuManChu divergence reversal: fresh WT/RSI/Stoch divergence at an extreme

use serde::Serialize;
use serde_json::{json, Value};

use super::vmc_cipher::{fmt_age, VmcContext};
use super::{field_boolean, field_number, indicator, verdict_word, Gate};
use crate::chain::{Check, Verdict};
use crate::config::{GateSettings, Overrides};
use crate::sanitize::{finalize_score, Node};
use crate::types::{GateRequest, GateResult, Signal};

const DETECTORS: [&str; 3] = ["wt", "rsi", "stoch"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmcDivergenceSettings {
    pub require_non_neutral_signal: bool,
    pub block_on_data_gap: bool,
    pub require_regular_div: bool,
    pub allow_hidden_div: bool,
    pub require_cross_alignment: bool,
    pub require_extreme_zone: bool,
    pub max_divergence_age_bars: u64,
    pub min_pass_score: f64,
}

impl Default for VmcDivergenceSettings {
    fn default() -> Self {
        Self {
            require_non_neutral_signal: true,
            block_on_data_gap: true,
            require_regular_div: true,
            allow_hidden_div: false,
            require_cross_alignment: true,
            require_extreme_zone: true,
            max_divergence_age_bars: 8,
            min_pass_score: 65.0,
        }
    }
}

impl GateSettings for VmcDivergenceSettings {
    fn resolve(o: Overrides<'_>) -> Self {
        let d = Self::default();
        Self {
            require_non_neutral_signal: o.flag("requireNonNeutralSignal", d.require_non_neutral_signal),
            block_on_data_gap: o.flag("blockOnDataGap", d.block_on_data_gap),
            require_regular_div: o.flag("requireRegularDiv", d.require_regular_div),
            allow_hidden_div: o.flag("allowHiddenDiv", d.allow_hidden_div),
            require_cross_alignment: o.flag("requireCrossAlignment", d.require_cross_alignment),
            require_extreme_zone: o.flag("requireExtremeZone", d.require_extreme_zone),
            max_divergence_age_bars: o.bars("maxDivergenceAgeBars", d.max_divergence_age_bars),
            min_pass_score: o.number("minPassScore", d.min_pass_score),
        }
    }
}

/// Directional reading of one divergence detector
#[derive(Debug, Clone, Copy, Default)]
struct Divergence {
    regular: bool,
    hidden: bool,
    age: Option<u64>,
}

impl Divergence {
    fn read(branch: Node<'_>, signal: Signal) -> Self {
        let side = match signal {
            Signal::Up => "Bullish",
            Signal::Down => "Bearish",
            Signal::Neutral => return Self::default(),
        };
        let lower = side.to_lowercase();
        let flag = |key: String| branch.get(&key).bool_or(false);
        Self {
            regular: flag(lower.clone()) || flag(format!("{lower}Add")),
            hidden: flag(format!("{lower}Hidden")),
            age: branch.get(&format!("last{side}AgeBars")).age(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VmcDivergenceReversal;

impl Gate for VmcDivergenceReversal {
    fn strategy_type(&self) -> &'static str {
        "vmc_divergence_reversal"
    }

    fn name(&self) -> &'static str {
        "VMC Divergence Reversal"
    }

    fn default_config(&self) -> Value {
        VmcDivergenceSettings::default_config()
    }

    fn ui_schema(&self) -> Value {
        json!({
            "title": self.name(),
            "description": "Takes reversals only on a fresh directional divergence with wave-trend confirmation.",
            "fields": {
                "requireNonNeutralSignal": field_boolean(),
                "blockOnDataGap": field_boolean(),
                "requireRegularDiv": field_boolean(),
                "allowHiddenDiv": field_boolean(),
                "requireCrossAlignment": field_boolean(),
                "requireExtremeZone": field_boolean(),
                "maxDivergenceAgeBars": field_number(0.0, 100.0, 1.0),
                "minPassScore": field_number(0.0, 100.0, 1.0),
            },
        })
    }

    fn evaluate(&self, request: &GateRequest) -> GateResult {
        let cfg = VmcDivergenceSettings::resolve(Overrides::new(&request.config));
        let signal = request.signal();
        let ctx = VmcContext::read(request.snapshot(), signal);

        let detectors: Vec<Divergence> = DETECTORS
            .iter()
            .map(|&name| Divergence::read(ctx.vmc.path(&["divergences", name]), signal))
            .collect();

        let regular_div = detectors.iter().any(|d| d.regular);
        let any_div = detectors
            .iter()
            .any(|d| d.regular || (cfg.allow_hidden_div && d.hidden));
        let divergence_age = detectors.iter().filter_map(|d| d.age).min();
        let fresh = divergence_age.is_some_and(|age| age <= cfg.max_divergence_age_bars);

        let score = finalize_score(
            20.0 + 35.0 * indicator(any_div)
                + 15.0 * indicator(regular_div)
                + 15.0 * indicator(ctx.cross_aligned)
                + 10.0 * indicator(ctx.zone_aligned)
                + 5.0 * indicator(fresh),
        );

        let divergence_missing = if cfg.require_regular_div {
            !regular_div
        } else {
            !any_div
        };

        let opening = ctx.opening_checks(signal, cfg.require_non_neutral_signal, cfg.block_on_data_gap);
        let verdict = Verdict::evaluate(opening.into_iter().chain([
            Check::block_if("vmc_divergence_missing", divergence_missing),
            Check::block_if("vmc_divergence_stale", !fresh),
            Check::when(cfg.require_cross_alignment, "vmc_cross_conflict", !ctx.cross_aligned),
            Check::when(cfg.require_extreme_zone, "vmc_zone_not_extreme", !ctx.zone_aligned),
        ]))
        .min_score(score, cfg.min_pass_score)
        .pass_code("vmc_divergence_reversal_pass");

        let mut tags: Vec<String> = Vec::new();
        tags.extend(VmcContext::direction_tag(signal).map(str::to_string));
        if regular_div {
            tags.push("vmc_regular_div".to_string());
        } else if any_div {
            tags.push("vmc_hidden_div".to_string());
        }
        if ctx.zone_aligned {
            tags.push("vmc_extreme_zone".to_string());
        }
        if ctx.data_gap() {
            tags.push("data_gap".to_string());
        }

        let explanation = format!(
            "VMC DivReversal {}: signal={}, regular={}, anyDiv={}, age={}, score={}.",
            verdict_word(verdict.allow()),
            signal,
            regular_div,
            any_div,
            fmt_age(divergence_age),
            score,
        );

        let meta = json!({
            "strategy": self.strategy_type(),
            "signal": signal,
            "regularDivergence": regular_div,
            "anyDivergence": any_div,
            "allowHiddenDiv": cfg.allow_hidden_div,
            "divergenceAgeBars": divergence_age,
            "maxDivergenceAgeBars": cfg.max_divergence_age_bars,
            "crossAligned": ctx.cross_aligned,
            "zoneAligned": ctx.zone_aligned,
            "scoreThreshold": cfg.min_pass_score,
            "dataGap": ctx.data_gap(),
            "vmcDataGap": ctx.vmc_data_gap,
            "riskDataGap": ctx.risk_data_gap,
            "goldNoBuyLong": ctx.gold_no_buy_long,
        });

        GateResult::from_verdict(verdict, score, tags, &explanation, meta)
    }
}
