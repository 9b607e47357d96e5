//! Hand-written indicator backend with TA-Lib seeding conventions
//!
//! RSI, ATR and ADX seed with a simple average over the first window and then
//! apply Wilder smoothing; EMA seeds with the SMA of its first `n` closes.

use super::{
    atr_percent, finite, BackendKind, Bar, IndicatorBackend, IndicatorError, IndicatorValues,
    OhlcvFrame, ADX_PERIOD, ATR_PERIOD, EMA_FAST_PERIOD, EMA_SLOW_PERIOD, RSI_PERIOD,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct WilderBackend;

impl IndicatorBackend for WilderBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wilder
    }

    fn compute(&self, frame: &OhlcvFrame) -> Result<IndicatorValues, IndicatorError> {
        let bars = frame.bars();
        let closes = frame.closes();
        Ok(IndicatorValues {
            rsi: rsi(&closes, RSI_PERIOD).and_then(finite),
            adx: adx(bars, ADX_PERIOD).and_then(finite),
            atr_pct: atr_percent(atr(bars, ATR_PERIOD), frame.last_close()),
            ema_fast: ema(&closes, EMA_FAST_PERIOD).and_then(finite),
            ema_slow: ema(&closes, EMA_SLOW_PERIOD).and_then(finite),
        })
    }
}

fn wilder_step(prev: f64, value: f64, period: f64) -> f64 {
    (prev * (period - 1.0) + value) / period
}

fn true_range(bar: &Bar, prev: &Bar) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev.close).abs())
        .max((bar.low - prev.close).abs())
}

fn directional_movement(bar: &Bar, prev: &Bar) -> (f64, f64) {
    let up_move = bar.high - prev.high;
    let down_move = prev.low - bar.low;
    let plus = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
    let minus = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };
    (plus, minus)
}

/// Relative strength index at the last close; needs `period + 1` closes
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }
    let n = period as f64;
    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (seed_gain, seed_loss) = changes[..period]
        .iter()
        .fold((0.0, 0.0), |(g, l), &d| (g + d.max(0.0), l + (-d).max(0.0)));
    let (gain, loss) = changes[period..]
        .iter()
        .fold((seed_gain / n, seed_loss / n), |(g, l), &d| {
            (wilder_step(g, d.max(0.0), n), wilder_step(l, (-d).max(0.0), n))
        });

    let total = gain + loss;
    Some(if total == 0.0 { 0.0 } else { 100.0 * gain / total })
}

/// Average true range at the last bar; needs `period + 1` bars
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() <= period {
        return None;
    }
    let n = period as f64;
    let ranges: Vec<f64> = bars.windows(2).map(|w| true_range(&w[1], &w[0])).collect();
    let seed = ranges[..period].iter().sum::<f64>() / n;
    Some(ranges[period..].iter().fold(seed, |acc, &tr| wilder_step(acc, tr, n)))
}

/// Exponential moving average seeded with the SMA of the first `period` values
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    Some(values[period..].iter().fold(seed, |acc, &v| acc + k * (v - acc)))
}

/// Average directional index at the last bar; needs `2 * period` bars
pub fn adx(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < 2 * period {
        return None;
    }
    let n = period as f64;

    let mut tr_sum = 0.0;
    let mut plus_sum = 0.0;
    let mut minus_sum = 0.0;
    let mut dx_values = Vec::with_capacity(bars.len());

    for i in 1..bars.len() {
        let tr = true_range(&bars[i], &bars[i - 1]);
        let (plus_dm, minus_dm) = directional_movement(&bars[i], &bars[i - 1]);
        if i <= period {
            tr_sum += tr;
            plus_sum += plus_dm;
            minus_sum += minus_dm;
        } else {
            tr_sum = tr_sum - tr_sum / n + tr;
            plus_sum = plus_sum - plus_sum / n + plus_dm;
            minus_sum = minus_sum - minus_sum / n + minus_dm;
        }
        if i >= period {
            dx_values.push(directional_index(plus_sum, minus_sum, tr_sum));
        }
    }

    let seed = dx_values[..period].iter().sum::<f64>() / n;
    Some(dx_values[period..].iter().fold(seed, |acc, &dx| wilder_step(acc, dx, n)))
}

fn directional_index(plus_sum: f64, minus_sum: f64, tr_sum: f64) -> f64 {
    if tr_sum == 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * plus_sum / tr_sum;
    let minus_di = 100.0 * minus_sum / tr_sum;
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / di_sum
    }
}
