//! VuManChu Cipher gate: directional buy/sell dots, their age and wave-trend alignment

use serde::Serialize;
use serde_json::{json, Value};

use super::{field_boolean, field_number, indicator, neutral_signal_check, risk_data_gap, verdict_word, Gate};
use crate::chain::{Check, Verdict};
use crate::config::{GateSettings, Overrides};
use crate::sanitize::{finalize_score, Node};
use crate::types::{GateRequest, GateResult, Signal};

/// `indicators.vumanchu` plus the opening checks shared by both VMC gates
pub(super) struct VmcContext<'a> {
    pub vmc: Node<'a>,
    pub present: bool,
    pub vmc_data_gap: bool,
    pub risk_data_gap: bool,
    pub gold_no_buy_long: bool,
    pub cross_aligned: bool,
    pub zone_aligned: bool,
}

impl<'a> VmcContext<'a> {
    pub fn read(snapshot: Node<'a>, signal: Signal) -> Self {
        let vmc = snapshot.path(&["indicators", "vumanchu"]);
        let wave = vmc.get("waveTrend");
        let flag = |key: &str| wave.get(key).bool_or(false);
        let (cross_aligned, zone_aligned) = match signal {
            Signal::Up => (flag("crossUp"), flag("oversold")),
            Signal::Down => (flag("crossDown"), flag("overbought")),
            Signal::Neutral => (false, false),
        };
        Self {
            vmc,
            present: vmc.is_present(),
            vmc_data_gap: vmc.get("dataGap").bool_or(false),
            risk_data_gap: risk_data_gap(snapshot),
            gold_no_buy_long: vmc.path(&["signals", "goldNoBuyLong"]).bool_or(false),
            cross_aligned,
            zone_aligned,
        }
    }

    pub fn data_gap(&self) -> bool {
        self.vmc_data_gap || self.risk_data_gap
    }

    pub fn gold_blocks(&self, signal: Signal) -> bool {
        signal == Signal::Up && self.gold_no_buy_long
    }

    /// Neutral signal → missing context → data gap → gold-dot long veto
    pub fn opening_checks(
        &self,
        signal: Signal,
        require_non_neutral: bool,
        block_on_data_gap: bool,
    ) -> [Check; 4] {
        [
            neutral_signal_check(signal, require_non_neutral),
            Check::block_if("vmc_context_missing", !self.present),
            Check::when(block_on_data_gap, "vmc_data_gap", self.data_gap()),
            Check::block_if("vmc_gold_dot_no_long", self.gold_blocks(signal)),
        ]
    }

    pub fn direction_tag(signal: Signal) -> Option<&'static str> {
        match signal {
            Signal::Up => Some("vmc_up"),
            Signal::Down => Some("vmc_down"),
            Signal::Neutral => None,
        }
    }
}

pub(super) fn fmt_age(age: Option<u64>) -> String {
    age.map_or_else(|| "n/a".to_string(), |a| a.to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmcCipherSettings {
    pub require_non_neutral_signal: bool,
    pub block_on_data_gap: bool,
    pub max_signal_age_bars: u64,
    pub allow_div_signal_as_primary: bool,
    pub min_pass_score: f64,
}

impl Default for VmcCipherSettings {
    fn default() -> Self {
        Self {
            require_non_neutral_signal: true,
            block_on_data_gap: true,
            max_signal_age_bars: 4,
            allow_div_signal_as_primary: true,
            min_pass_score: 60.0,
        }
    }
}

impl GateSettings for VmcCipherSettings {
    fn resolve(o: Overrides<'_>) -> Self {
        let d = Self::default();
        Self {
            require_non_neutral_signal: o.flag("requireNonNeutralSignal", d.require_non_neutral_signal),
            block_on_data_gap: o.flag("blockOnDataGap", d.block_on_data_gap),
            max_signal_age_bars: o.bars("maxSignalAgeBars", d.max_signal_age_bars),
            allow_div_signal_as_primary: o.flag("allowDivSignalAsPrimary", d.allow_div_signal_as_primary),
            min_pass_score: o.number("minPassScore", d.min_pass_score),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VmcCipherGate;

impl Gate for VmcCipherGate {
    fn strategy_type(&self) -> &'static str {
        "vmc_cipher_gate"
    }

    fn name(&self) -> &'static str {
        "VMC Cipher Gate"
    }

    fn default_config(&self) -> Value {
        VmcCipherSettings::default_config()
    }

    fn ui_schema(&self) -> Value {
        json!({
            "title": self.name(),
            "description": "Requires a fresh VuManChu buy/sell or divergence dot in the signal direction.",
            "fields": {
                "requireNonNeutralSignal": field_boolean(),
                "blockOnDataGap": field_boolean(),
                "maxSignalAgeBars": field_number(0.0, 50.0, 1.0),
                "allowDivSignalAsPrimary": field_boolean(),
                "minPassScore": field_number(0.0, 100.0, 1.0),
            },
        })
    }

    fn evaluate(&self, request: &GateRequest) -> GateResult {
        let cfg = VmcCipherSettings::resolve(Overrides::new(&request.config));
        let signal = request.signal();
        let ctx = VmcContext::read(request.snapshot(), signal);

        let signals = ctx.vmc.get("signals");
        let ages = signals.get("ages");
        let (primary_key, div_key) = match signal {
            Signal::Up => ("buy", "buyDiv"),
            Signal::Down => ("sell", "sellDiv"),
            Signal::Neutral => ("", ""),
        };
        let directional = !signal.is_neutral();

        let directional_primary = directional && signals.get(primary_key).bool_or(false);
        let directional_div = directional && signals.get(div_key).bool_or(false);
        let directional_ok =
            directional_primary || (cfg.allow_div_signal_as_primary && directional_div);

        let (primary_age, div_age) = if directional {
            (ages.get(primary_key).age(), ages.get(div_key).age())
        } else {
            (None, None)
        };
        let effective_age = primary_age.or(div_age);
        let age_fresh = effective_age.is_some_and(|age| age <= cfg.max_signal_age_bars);

        let score = finalize_score(
            25.0 + 30.0 * indicator(directional_ok)
                + 20.0 * indicator(directional_div)
                + 10.0 * indicator(ctx.cross_aligned)
                + 10.0 * indicator(ctx.zone_aligned)
                + 5.0 * indicator(age_fresh),
        );

        let opening = ctx.opening_checks(signal, cfg.require_non_neutral_signal, cfg.block_on_data_gap);
        let verdict = Verdict::evaluate(opening.into_iter().chain([
            Check::block_if("vmc_directional_signal_missing", !directional_ok),
            Check::block_if("vmc_signal_too_old", !age_fresh),
        ]))
        .min_score(score, cfg.min_pass_score)
        .pass_code("vmc_cipher_gate_pass");

        let mut tags: Vec<String> = Vec::new();
        tags.extend(VmcContext::direction_tag(signal).map(str::to_string));
        if directional_div {
            tags.push("vmc_divergence".to_string());
        }
        if ctx.gold_blocks(signal) {
            tags.push("vmc_gold_block".to_string());
        }
        if ctx.data_gap() {
            tags.push("data_gap".to_string());
        }

        let explanation = format!(
            "VMC Cipher {}: signal={}, primary={}, div={}, age={}, score={}.",
            verdict_word(verdict.allow()),
            signal,
            directional_primary,
            directional_div,
            fmt_age(effective_age),
            score,
        );

        let meta = json!({
            "strategy": self.strategy_type(),
            "signal": signal,
            "directionalPrimary": directional_primary,
            "directionalDiv": directional_div,
            "directionalOk": directional_ok,
            "effectiveAgeBars": effective_age,
            "maxSignalAgeBars": cfg.max_signal_age_bars,
            "crossAligned": ctx.cross_aligned,
            "zoneAligned": ctx.zone_aligned,
            "divAligned": directional_div,
            "scoreThreshold": cfg.min_pass_score,
            "dataGap": ctx.data_gap(),
            "vmcDataGap": ctx.vmc_data_gap,
            "riskDataGap": ctx.risk_data_gap,
            "goldNoBuyLong": ctx.gold_no_buy_long,
        });

        GateResult::from_verdict(verdict, score, tags, &explanation, meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::tests::run;

    struct Dots {
        buy: bool,
        sell: bool,
        buy_div: bool,
        buy_age: Value,
        sell_age: Value,
        buy_div_age: Value,
        cross_up: bool,
        oversold: bool,
        gold: bool,
        vmc_gap: bool,
    }

    impl Default for Dots {
        fn default() -> Self {
            Self {
                buy: true,
                sell: false,
                buy_div: false,
                buy_age: json!(1),
                sell_age: Value::Null,
                buy_div_age: Value::Null,
                cross_up: true,
                oversold: true,
                gold: false,
                vmc_gap: false,
            }
        }
    }

    impl Dots {
        fn snapshot(&self) -> Value {
            json!({
                "riskFlags": {"dataGap": false},
                "indicators": {"vumanchu": {
                    "dataGap": self.vmc_gap,
                    "waveTrend": {"crossUp": self.cross_up, "crossDown": false,
                                  "oversold": self.oversold, "overbought": false},
                    "signals": {
                        "buy": self.buy, "sell": self.sell,
                        "buyDiv": self.buy_div, "sellDiv": false,
                        "goldNoBuyLong": self.gold,
                        "ages": {"buy": self.buy_age, "sell": self.sell_age,
                                 "buyDiv": self.buy_div_age, "sellDiv": null},
                    },
                }},
            })
        }
    }

    fn eval(dots: Dots, signal: Signal, config: Value) -> GateResult {
        run(&VmcCipherGate, dots.snapshot(), signal, config)
    }

    #[test]
    fn test_bullish_pass() {
        let result = eval(Dots::default(), Signal::Up, json!({}));
        assert!(result.allow);
        assert_eq!(result.reason_codes, vec!["vmc_cipher_gate_pass"]);
        assert_eq!(result.tags, vec!["vmc_up"]);
        // 25 + 30 + 10 + 10 + 5
        assert_eq!(result.score, 80.0);
        assert_eq!(
            result.explanation,
            "VMC Cipher pass: signal=up, primary=true, div=false, age=1, score=80."
        );
    }

    #[test]
    fn test_neutral_blocks() {
        let result = eval(Dots::default(), Signal::Neutral, json!({}));
        assert_eq!(result.reason_codes, vec!["signal_missing_or_neutral"]);
        assert!(result.tags.is_empty());
    }

    #[test]
    fn test_missing_context_blocks() {
        let result = run(&VmcCipherGate, json!({"indicators": {"vumanchu": {}}}), Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["vmc_context_missing"]);
    }

    #[test]
    fn test_gold_dot_blocks_long_only() {
        let result = eval(Dots { gold: true, ..Dots::default() }, Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["vmc_gold_dot_no_long"]);
        assert!(result.has_tag("vmc_gold_block"));

        let dots = Dots { gold: true, buy: false, sell: true, sell_age: json!(2), ..Dots::default() };
        let result = eval(dots, Signal::Down, json!({}));
        assert!(!result.has_code("vmc_gold_dot_no_long"));
        assert!(!result.has_tag("vmc_gold_block"));
    }

    #[test]
    fn test_data_gap_blocks() {
        let result = eval(Dots { vmc_gap: true, ..Dots::default() }, Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["vmc_data_gap"]);
        assert!(result.has_tag("data_gap"));
    }

    #[test]
    fn test_stale_signal_blocks() {
        let result = eval(Dots { buy_age: json!(9), ..Dots::default() }, Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["vmc_signal_too_old"]);

        let result = eval(Dots::default(), Signal::Up, json!({"maxSignalAgeBars": 0}));
        assert_eq!(result.reason_codes, vec!["vmc_signal_too_old"]);
    }

    #[test]
    fn test_divergence_dot_as_primary() {
        let dots = Dots { buy: false, buy_div: true, buy_age: Value::Null, buy_div_age: json!(2), ..Dots::default() };
        let result = eval(dots, Signal::Up, json!({}));
        assert!(result.allow);
        assert!(result.has_tag("vmc_divergence"));
        // 25 + 30 + 20 + 10 + 10 + 5
        assert_eq!(result.score, 100.0);

        let dots = Dots { buy: false, buy_div: true, buy_age: Value::Null, buy_div_age: json!(2), ..Dots::default() };
        let result = eval(dots, Signal::Up, json!({"allowDivSignalAsPrimary": false}));
        assert_eq!(result.reason_codes, vec!["vmc_directional_signal_missing"]);
    }

    #[test]
    fn test_opposite_direction_missing() {
        let result = eval(Dots::default(), Signal::Down, json!({}));
        assert_eq!(result.reason_codes, vec!["vmc_directional_signal_missing"]);
        assert_eq!(result.tags, vec!["vmc_down"]);
    }

    #[test]
    fn test_score_threshold() {
        let dots = Dots { cross_up: false, oversold: false, ..Dots::default() };
        let result = eval(dots, Signal::Up, json!({"minPassScore": 61}));
        // 25 + 30 + 5
        assert_eq!(result.score, 60.0);
        assert_eq!(result.reason_codes, vec!["score_below_threshold"]);
    }
}
