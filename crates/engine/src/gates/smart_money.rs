//! Smart Money Concept gate
//!
//! Aligns the requested direction with market-structure analytics: the
//! prevailing structure trend, the latest break of structure (BOS/CHoCH) and
//! its age in bars, and the premium/equilibrium/discount zone holding the
//! last close. Order-block and fair-value-gap bias add small score bonuses.

use serde::Serialize;
use serde_json::{json, Value};

use super::{field_boolean, field_number, indicator, neutral_signal_check, risk_data_gap, verdict_word, Gate};
use crate::chain::{Check, Verdict};
use crate::config::{GateSettings, Overrides};
use crate::sanitize::{finalize_score, Node};
use crate::types::{GateRequest, GateResult, Signal};

const DEFAULT_MAX_EVENT_AGE_BARS: u64 = 120;

const TREND_WEIGHT: f64 = 40.0;
const STRUCTURE_WEIGHT: f64 = 35.0;
const ZONE_WEIGHT: f64 = 25.0;
const BIAS_BONUS: f64 = 5.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartMoneySettings {
    pub require_non_neutral_signal: bool,
    pub block_on_data_gap: bool,
    pub require_trend_alignment: bool,
    pub require_structure_alignment: bool,
    pub require_zone_alignment: bool,
    pub allow_equilibrium_zone: bool,
    pub max_event_age_bars: u64,
    pub min_pass_score: f64,
}

impl Default for SmartMoneySettings {
    fn default() -> Self {
        Self {
            require_non_neutral_signal: true,
            block_on_data_gap: true,
            require_trend_alignment: true,
            require_structure_alignment: true,
            require_zone_alignment: true,
            allow_equilibrium_zone: true,
            max_event_age_bars: DEFAULT_MAX_EVENT_AGE_BARS,
            min_pass_score: 65.0,
        }
    }
}

impl GateSettings for SmartMoneySettings {
    fn resolve(o: Overrides<'_>) -> Self {
        let d = Self::default();
        // Zero is not a usable window
        let max_event_age_bars = match o.bars("maxEventAgeBars", d.max_event_age_bars) {
            0 => DEFAULT_MAX_EVENT_AGE_BARS,
            bars => bars,
        };
        Self {
            require_non_neutral_signal: o.flag("requireNonNeutralSignal", d.require_non_neutral_signal),
            block_on_data_gap: o.flag("blockOnDataGap", d.block_on_data_gap),
            require_trend_alignment: o.flag("requireTrendAlignment", d.require_trend_alignment),
            require_structure_alignment: o.flag("requireStructureAlignment", d.require_structure_alignment),
            require_zone_alignment: o.flag("requireZoneAlignment", d.require_zone_alignment),
            allow_equilibrium_zone: o.flag("allowEquilibriumZone", d.allow_equilibrium_zone),
            max_event_age_bars,
            min_pass_score: o.number("minPassScore", d.min_pass_score),
        }
    }
}

/// Structure side reported by the SMC analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Side {
    Bullish,
    Bearish,
    Neutral,
    Unknown,
}

impl Side {
    fn parse(node: Node<'_>, fallback: Side) -> Side {
        match node.str().map(|s| s.trim().to_lowercase()).as_deref() {
            Some("bullish") => Side::Bullish,
            Some("bearish") => Side::Bearish,
            _ => fallback,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Side::Bullish => "bullish",
            Side::Bearish => "bearish",
            Side::Neutral => "neutral",
            Side::Unknown => "unknown",
        }
    }

    fn aligned_with(&self, signal: Signal) -> bool {
        matches!(
            (signal, self),
            (Signal::Up, Side::Bullish) | (Signal::Down, Side::Bearish)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Zone {
    Discount,
    Equilibrium,
    Premium,
    Unknown,
}

impl Zone {
    fn as_str(&self) -> &'static str {
        match self {
            Zone::Discount => "discount",
            Zone::Equilibrium => "equilibrium",
            Zone::Premium => "premium",
            Zone::Unknown => "unknown",
        }
    }

    /// First band (discount, equilibrium, premium) whose closed interval holds `close`
    fn resolve(zones: Node<'_>, close: Option<f64>) -> Zone {
        let Some(close) = close else {
            return Zone::Unknown;
        };
        let holds = |bottom: &str, top: &str| match (zones.get(bottom).f64(), zones.get(top).f64()) {
            (Some(a), Some(b)) => a.min(b) <= close && close <= a.max(b),
            _ => false,
        };
        if holds("discountBottom", "discountTop") {
            Zone::Discount
        } else if holds("equilibriumBottom", "equilibriumTop") {
            Zone::Equilibrium
        } else if holds("premiumBottom", "premiumTop") {
            Zone::Premium
        } else {
            Zone::Unknown
        }
    }
}

/// Bar duration from the last two parseable timestamps of `lastBars.ohlc`
fn estimate_bar_ms(rows: &[Value]) -> Option<i64> {
    let stamps: Vec<i64> = rows
        .iter()
        .filter_map(|row| Node::new(row).get("t").timestamp_ms())
        .collect();
    match stamps.as_slice() {
        // Saturated timestamps can be too far apart to subtract
        [.., prev, last] if last > prev => last.checked_sub(*prev),
        _ => None,
    }
}

fn bias_aligned(signal: Signal, bullish: u64, bearish: u64) -> bool {
    match signal {
        Signal::Up => bullish > 0 && bullish >= bearish,
        Signal::Down => bearish > 0 && bearish >= bullish,
        Signal::Neutral => false,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SmartMoneyConcept;

impl Gate for SmartMoneyConcept {
    fn strategy_type(&self) -> &'static str {
        "smart_money_concept"
    }

    fn name(&self) -> &'static str {
        "Smart Money Concept"
    }

    fn default_config(&self) -> Value {
        SmartMoneySettings::default_config()
    }

    fn ui_schema(&self) -> Value {
        json!({
            "title": self.name(),
            "description": "Deterministic SMC gate using structure, trend and premium/discount zones.",
            "fields": {
                "requireNonNeutralSignal": field_boolean(),
                "blockOnDataGap": field_boolean(),
                "requireTrendAlignment": field_boolean(),
                "requireStructureAlignment": field_boolean(),
                "requireZoneAlignment": field_boolean(),
                "allowEquilibriumZone": field_boolean(),
                "maxEventAgeBars": field_number(1.0, 1000.0, 1.0),
                "minPassScore": field_number(0.0, 100.0, 1.0),
            },
        })
    }

    fn evaluate(&self, request: &GateRequest) -> GateResult {
        let cfg = SmartMoneySettings::resolve(Overrides::new(&request.config));
        let snapshot = request.snapshot();
        let signal = request.signal();

        let rows = snapshot.path(&["historyContext", "lastBars", "ohlc"]).array();
        let last_bar = rows.last().map(Node::new).unwrap_or_default();
        let last_close = last_bar.get("c").f64();
        let last_bar_ts = last_bar.get("t").timestamp_ms();
        let bar_ms = estimate_bar_ms(rows);

        let smc = snapshot.path(&["advancedIndicators", "smartMoneyConcepts"]);
        let context_present = smc.is_present();
        // Nothing inside an absent context is read
        let smc = if context_present { smc } else { Node::missing() };

        let smc_data_gap = smc.get("dataGap").bool_or(false);
        let risk_gap = risk_data_gap(snapshot);
        let data_gap = smc_data_gap || risk_gap;

        let internal = smc.get("internal");
        let swing = smc.get("swing");
        let swing_trend = Side::parse(swing.get("trend"), Side::Neutral);
        let (trend_source, trend) = if swing_trend != Side::Neutral {
            ("swing", swing_trend)
        } else {
            ("internal", Side::parse(internal.get("trend"), Side::Neutral))
        };

        let (event_source, event) = if swing.get("lastEvent").is_present() {
            ("swing", swing.get("lastEvent"))
        } else if internal.get("lastEvent").is_present() {
            ("internal", internal.get("lastEvent"))
        } else {
            ("none", Node::missing())
        };
        let event_direction = Side::parse(event.get("direction"), Side::Unknown);
        let event_type = event
            .get("type")
            .str()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let event_ts = event.get("ts").timestamp_ms();
        let event_age_bars = match (event_ts, last_bar_ts, bar_ms) {
            (Some(event_ts), Some(last_ts), Some(bar_ms)) => last_ts
                .checked_sub(event_ts)
                .map(|elapsed| elapsed.max(0) / bar_ms),
            _ => None,
        };
        let event_fresh = event_age_bars.is_some_and(|age| age as u64 <= cfg.max_event_age_bars);

        let trend_aligned = trend.aligned_with(signal);
        let structure_aligned = event_direction.aligned_with(signal) && event_fresh;

        let zone = Zone::resolve(smc.get("zones"), last_close);
        let zone_favorable = (signal == Signal::Up && zone == Zone::Discount)
            || (signal == Signal::Down && zone == Zone::Premium)
            || (cfg.allow_equilibrium_zone && zone == Zone::Equilibrium);

        let blocks = smc.get("orderBlocks");
        let ob_bullish = blocks
            .path(&["internal", "bullishCount"])
            .count()
            .saturating_add(blocks.path(&["swing", "bullishCount"]).count());
        let ob_bearish = blocks
            .path(&["internal", "bearishCount"])
            .count()
            .saturating_add(blocks.path(&["swing", "bearishCount"]).count());
        let gaps = smc.get("fairValueGaps");
        let fvg_bullish = gaps.get("bullishCount").count();
        let fvg_bearish = gaps.get("bearishCount").count();

        let ob_aligned = bias_aligned(signal, ob_bullish, ob_bearish);
        let fvg_aligned = bias_aligned(signal, fvg_bullish, fvg_bearish);
        let bonus = BIAS_BONUS * (indicator(ob_aligned) + indicator(fvg_aligned));

        let trend_component = TREND_WEIGHT * indicator(trend_aligned);
        let structure_component = STRUCTURE_WEIGHT * indicator(structure_aligned);
        let zone_component = ZONE_WEIGHT * indicator(zone_favorable);
        let score = finalize_score(trend_component + structure_component + zone_component + bonus);

        let verdict = Verdict::evaluate([
            neutral_signal_check(signal, cfg.require_non_neutral_signal),
            Check::block_if("smc_context_missing", !context_present),
            Check::when(cfg.block_on_data_gap, "smc_data_gap", data_gap),
            Check::when(cfg.require_trend_alignment, "smc_trend_conflict", !trend_aligned),
            Check::when(
                cfg.require_structure_alignment,
                "smc_structure_conflict",
                !structure_aligned,
            ),
            Check::when(cfg.require_zone_alignment, "smc_zone_not_favorable", !zone_favorable),
        ])
        .min_score(score, cfg.min_pass_score)
        .pass_code("smc_structure_zone_pass");

        let mut tags: Vec<String> = Vec::new();
        match signal {
            Signal::Up => tags.push("smc_up".to_string()),
            Signal::Down => tags.push("smc_down".to_string()),
            Signal::Neutral => {}
        }
        if zone != Zone::Unknown {
            tags.push(format!("zone_{}", zone.as_str()));
        }
        match trend {
            Side::Bullish => tags.push("smc_bullish".to_string()),
            Side::Bearish => tags.push("smc_bearish".to_string()),
            _ => {}
        }
        if data_gap {
            tags.push("data_gap".to_string());
        }

        let explanation = format!(
            "SMC {}: signal={}, trend={}, event={}/{}, zone={}, score={}.",
            verdict_word(verdict.allow()),
            signal,
            trend.as_str(),
            event_type,
            event_direction.as_str(),
            zone.as_str(),
            score,
        );

        let meta = json!({
            "strategy": self.strategy_type(),
            "signal": signal,
            "smcContextPresent": context_present,
            "dataGap": data_gap,
            "smcDataGap": smc_data_gap,
            "riskDataGap": risk_gap,
            "trend": {
                "source": trend_source,
                "state": trend,
                "aligned": trend_aligned,
            },
            "structure": {
                "source": event_source,
                "type": event_type,
                "direction": event_direction,
                "eventTsMs": event_ts,
                "eventAgeBars": event_age_bars,
                "maxEventAgeBars": cfg.max_event_age_bars,
                "fresh": event_fresh,
                "aligned": structure_aligned,
            },
            "zone": {
                "bucket": zone,
                "favorable": zone_favorable,
                "allowEquilibriumZone": cfg.allow_equilibrium_zone,
                "lastClose": last_close,
            },
            "score": {
                "trendComponent": trend_component,
                "structureComponent": structure_component,
                "zoneComponent": zone_component,
                "bonus": bonus,
                "obAligned": ob_aligned,
                "fvgAligned": fvg_aligned,
                "minPassScore": cfg.min_pass_score,
            },
            "counts": {
                "orderBlocksBullish": ob_bullish,
                "orderBlocksBearish": ob_bearish,
                "fvgBullish": fvg_bullish,
                "fvgBearish": fvg_bearish,
            },
        });

        GateResult::from_verdict(verdict, score, tags, &explanation, meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::tests::run;

    const EVENT_TS_MS: i64 = 1_770_000_900_000;

    fn last_bars(close: f64) -> Value {
        let start = 1_770_000_000_i64;
        json!({
            "n": 4,
            "ohlc": [
                {"t": start, "o": 100.0, "h": 101.0, "l": 99.0, "c": 100.2, "v": 10},
                {"t": start + 300, "o": 100.2, "h": 101.3, "l": 99.8, "c": 100.6, "v": 12},
                {"t": start + 600, "o": 100.6, "h": 101.6, "l": 100.0, "c": 101.1, "v": 13},
                {"t": start + 900, "o": 101.1, "h": 101.9, "l": 100.7, "c": close, "v": 11},
            ],
        })
    }

    struct Smc {
        trend: &'static str,
        direction: &'static str,
        premium_layout: bool,
        data_gap: bool,
        event_ts: i64,
        ob: (u64, u64),
        fvg: (u64, u64),
    }

    impl Default for Smc {
        fn default() -> Self {
            Self {
                trend: "bullish",
                direction: "bullish",
                premium_layout: false,
                data_gap: false,
                event_ts: EVENT_TS_MS,
                ob: (2, 1),
                fvg: (2, 1),
            }
        }
    }

    impl Smc {
        fn to_value(&self) -> Value {
            let zones = if self.premium_layout {
                json!({
                    "premiumTop": 102.0, "premiumBottom": 100.8,
                    "equilibriumTop": 100.7, "equilibriumBottom": 99.8,
                    "discountTop": 99.7, "discountBottom": 97.0,
                })
            } else {
                json!({
                    "premiumTop": 104.0, "premiumBottom": 102.0,
                    "equilibriumTop": 102.0, "equilibriumBottom": 100.0,
                    "discountTop": 100.0, "discountBottom": 96.0,
                })
            };
            let event = json!({"type": "BOS", "direction": self.direction, "ts": self.event_ts});
            json!({
                "internal": {"trend": self.trend, "lastEvent": event},
                "swing": {"trend": self.trend, "lastEvent": event},
                "orderBlocks": {
                    "internal": {"bullishCount": self.ob.0, "bearishCount": self.ob.1},
                    "swing": {"bullishCount": 0, "bearishCount": 0},
                },
                "fairValueGaps": {"bullishCount": self.fvg.0, "bearishCount": self.fvg.1},
                "zones": zones,
                "dataGap": self.data_gap,
            })
        }
    }

    fn snapshot(smc: Option<Value>, close: f64) -> Value {
        let mut snap = json!({
            "historyContext": {"lastBars": last_bars(close)},
            "riskFlags": {"dataGap": false},
            "advancedIndicators": {},
        });
        if let Some(smc) = smc {
            snap["advancedIndicators"]["smartMoneyConcepts"] = smc;
        }
        snap
    }

    fn eval(smc: Smc, close: f64, signal: Signal, config: Value) -> GateResult {
        run(&SmartMoneyConcept, snapshot(Some(smc.to_value()), close), signal, config)
    }

    #[test]
    fn test_bullish_pass_in_equilibrium() {
        let result = eval(Smc::default(), 101.4, Signal::Up, json!({}));
        assert!(result.allow);
        assert_eq!(result.reason_codes, vec!["smc_structure_zone_pass"]);
        assert_eq!(result.tags, vec!["smc_up", "zone_equilibrium", "smc_bullish"]);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.meta["structure"]["eventAgeBars"], json!(0));
        assert_eq!(result.meta["structure"]["type"], json!("bos"));
        assert_eq!(
            result.explanation,
            "SMC pass: signal=up, trend=bullish, event=bos/bullish, zone=equilibrium, score=100."
        );
    }

    #[test]
    fn test_bearish_pass_in_premium() {
        let smc = Smc {
            trend: "bearish",
            direction: "bearish",
            premium_layout: true,
            ob: (1, 3),
            fvg: (1, 2),
            ..Smc::default()
        };
        let result = eval(smc, 101.2, Signal::Down, json!({}));
        assert!(result.allow);
        assert!(result.has_tag("smc_down"));
        assert!(result.has_tag("zone_premium"));
        assert!(result.has_tag("smc_bearish"));
    }

    #[test]
    fn test_neutral_signal_blocks() {
        let result = eval(Smc::default(), 101.4, Signal::Neutral, json!({}));
        assert_eq!(result.reason_codes, vec!["signal_missing_or_neutral"]);
    }

    #[test]
    fn test_missing_context_blocks() {
        let result = run(&SmartMoneyConcept, snapshot(None, 101.4), Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["smc_context_missing"]);

        let result = run(&SmartMoneyConcept, snapshot(Some(json!({})), 101.4), Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["smc_context_missing"]);
    }

    #[test]
    fn test_data_gap_blocks() {
        let result = eval(Smc { data_gap: true, ..Smc::default() }, 101.4, Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["smc_data_gap"]);
        assert!(result.has_tag("data_gap"));

        let result = eval(
            Smc { data_gap: true, ..Smc::default() },
            101.4,
            Signal::Up,
            json!({"blockOnDataGap": false}),
        );
        assert!(result.allow);
    }

    #[test]
    fn test_trend_conflict_blocks() {
        let result = eval(Smc { trend: "bearish", ..Smc::default() }, 99.0, Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["smc_trend_conflict"]);
    }

    #[test]
    fn test_structure_conflict_blocks() {
        let result = eval(Smc { direction: "bearish", ..Smc::default() }, 99.1, Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["smc_structure_conflict"]);
    }

    #[test]
    fn test_stale_event_is_structure_conflict() {
        // 200 bars of 5 minutes before the last bar
        let smc = Smc { event_ts: EVENT_TS_MS - 200 * 300_000, ..Smc::default() };
        let result = eval(smc, 101.4, Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["smc_structure_conflict"]);
        assert_eq!(result.meta["structure"]["eventAgeBars"], json!(200));

        let smc = Smc { event_ts: EVENT_TS_MS - 200 * 300_000, ..Smc::default() };
        let result = eval(smc, 101.4, Signal::Up, json!({"maxEventAgeBars": 250}));
        assert!(result.allow);
    }

    #[test]
    fn test_zero_max_age_means_default() {
        let smc = Smc { event_ts: EVENT_TS_MS - 100 * 300_000, ..Smc::default() };
        let result = eval(smc, 101.4, Signal::Up, json!({"maxEventAgeBars": 0}));
        assert!(result.allow);
        assert_eq!(result.meta["structure"]["maxEventAgeBars"], json!(120));
    }

    #[test]
    fn test_zone_mismatch_blocks() {
        let smc = Smc { premium_layout: true, ..Smc::default() };
        let result = eval(smc, 101.2, Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["smc_zone_not_favorable"]);
    }

    #[test]
    fn test_score_below_threshold_blocks() {
        let smc = Smc {
            trend: "bearish",
            direction: "bearish",
            premium_layout: true,
            ob: (0, 2),
            fvg: (0, 2),
            ..Smc::default()
        };
        let config = json!({
            "requireTrendAlignment": false,
            "requireStructureAlignment": false,
            "requireZoneAlignment": false,
            "minPassScore": 90,
        });
        let result = eval(smc, 101.2, Signal::Up, config);
        assert_eq!(result.reason_codes, vec!["score_below_threshold"]);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_inverted_band_bounds_are_normalized() {
        let mut smc = Smc::default().to_value();
        smc["zones"]["discountTop"] = json!(96.0);
        smc["zones"]["discountBottom"] = json!(100.0);
        let result = run(&SmartMoneyConcept, snapshot(Some(smc), 99.0), Signal::Up, json!({}));
        assert!(result.allow);
        assert!(result.has_tag("zone_discount"));
    }

    #[test]
    fn test_non_finite_zone_bounds_stay_finite() {
        let mut smc = Smc { ob: (2, 0), fvg: (1, 0), ..Smc::default() }.to_value();
        smc["zones"]["discountTop"] = json!("NaN");
        smc["zones"]["discountBottom"] = json!("Infinity");
        let result = run(
            &SmartMoneyConcept,
            snapshot(Some(smc), 101.4),
            Signal::Up,
            json!({"requireZoneAlignment": false}),
        );
        assert!(result.score.is_finite());
        assert_eq!(result.meta["zone"]["bucket"], json!("equilibrium"));
        assert_eq!(result.meta["zone"]["lastClose"], json!(101.4));
    }

    #[test]
    fn test_bar_interval_from_last_two_stamps() {
        let rows = vec![
            json!({"t": 1_770_000_000}),
            json!({"t": "garbage"}),
            json!({"t": 1_770_000_600}),
        ];
        assert_eq!(estimate_bar_ms(&rows), Some(600_000));
        assert_eq!(estimate_bar_ms(&rows[..1]), None);
        let backwards = vec![json!({"t": 1_770_000_600}), json!({"t": 1_770_000_000})];
        assert_eq!(estimate_bar_ms(&backwards), None);
    }

    #[test]
    fn test_extreme_timestamps_mean_unknown_interval() {
        let rows = vec![json!({"t": "0001-01-01T00:00:00Z"}), json!({"t": 1e19})];
        assert_eq!(estimate_bar_ms(&rows), None);

        let mut snap = snapshot(Some(Smc::default().to_value()), 101.4);
        snap["historyContext"]["lastBars"]["ohlc"][2]["t"] = json!("0001-01-01T00:00:00Z");
        snap["historyContext"]["lastBars"]["ohlc"][3]["t"] = json!(1e19);
        let result = run(&SmartMoneyConcept, snap, Signal::Up, json!({}));
        assert_eq!(result.reason_codes, vec!["smc_structure_conflict"]);
        assert_eq!(result.meta["structure"]["eventAgeBars"], Value::Null);
    }

    #[test]
    fn test_event_age_overflow_is_unknown() {
        let mut value = Smc::default().to_value();
        value["swing"]["lastEvent"]["ts"] = json!("0001-01-01T00:00:00Z");
        let mut snap = snapshot(Some(value), 101.4);
        let ohlc = &mut snap["historyContext"]["lastBars"]["ohlc"];
        ohlc[2]["t"] = json!(9.2e18);
        ohlc[3]["t"] = json!(1e19);
        let result = run(&SmartMoneyConcept, snap, Signal::Up, json!({}));
        assert_eq!(result.meta["structure"]["eventAgeBars"], Value::Null);
        assert_eq!(result.meta["structure"]["fresh"], json!(false));
        assert_eq!(result.reason_codes, vec!["smc_structure_conflict"]);
    }

    #[test]
    fn test_huge_order_block_counts_saturate() {
        let mut value = Smc::default().to_value();
        value["orderBlocks"] = json!({
            "internal": {"bullishCount": 1e20, "bearishCount": 1e20},
            "swing": {"bullishCount": 1e20, "bearishCount": 0},
        });
        let result = run(&SmartMoneyConcept, snapshot(Some(value), 101.4), Signal::Up, json!({}));
        assert!(result.allow);
        assert_eq!(result.meta["counts"]["orderBlocksBullish"], json!(u64::MAX));
        assert_eq!(result.meta["counts"]["orderBlocksBearish"], json!(u64::MAX));
        assert!(result.score.is_finite());
    }
}
