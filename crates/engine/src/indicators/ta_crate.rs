//! Indicator backend on top of the `ta` crate
//!
//! `ta` has no ADX, so it is computed here with exponential (alpha = 1/n)
//! smoothing of +DM/-DM/TR seeded at the second bar.

use ta::indicators::{AverageTrueRange, ExponentialMovingAverage, RelativeStrengthIndex};
use ta::{Close, High, Low, Next};

use super::{
    atr_percent, finite, BackendKind, Bar, IndicatorBackend, IndicatorError, IndicatorValues,
    OhlcvFrame, ADX_PERIOD, ATR_PERIOD, EMA_FAST_PERIOD, EMA_SLOW_PERIOD, RSI_PERIOD,
};

impl High for Bar {
    fn high(&self) -> f64 {
        self.high
    }
}

impl Low for Bar {
    fn low(&self) -> f64 {
        self.low
    }
}

impl Close for Bar {
    fn close(&self) -> f64 {
        self.close
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TaBackend;

fn invalid(name: &str, err: ta::errors::TaError) -> IndicatorError {
    IndicatorError::Compute(format!("{name}: {err:?}"))
}

impl IndicatorBackend for TaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ta
    }

    fn compute(&self, frame: &OhlcvFrame) -> Result<IndicatorValues, IndicatorError> {
        let bars = frame.bars();

        let mut rsi = RelativeStrengthIndex::new(RSI_PERIOD).map_err(|e| invalid("rsi", e))?;
        let mut atr = AverageTrueRange::new(ATR_PERIOD).map_err(|e| invalid("atr", e))?;
        let mut ema_fast =
            ExponentialMovingAverage::new(EMA_FAST_PERIOD).map_err(|e| invalid("ema_fast", e))?;
        let mut ema_slow =
            ExponentialMovingAverage::new(EMA_SLOW_PERIOD).map_err(|e| invalid("ema_slow", e))?;
        let mut adx = AdxState::new(ADX_PERIOD);

        let mut last = (f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN);
        for bar in bars {
            last = (
                rsi.next(bar.close),
                atr.next(bar),
                ema_fast.next(bar.close),
                ema_slow.next(bar.close),
                adx.next(bar),
            );
        }
        let (rsi_last, atr_last, fast_last, slow_last, adx_last) = last;

        let count = bars.len();
        let warm = |needed: usize, value: f64| (count >= needed).then_some(value).and_then(finite);

        Ok(IndicatorValues {
            rsi: warm(RSI_PERIOD + 1, rsi_last),
            adx: warm(2 * ADX_PERIOD, adx_last),
            atr_pct: atr_percent(warm(ATR_PERIOD + 1, atr_last), frame.last_close()),
            ema_fast: warm(EMA_FAST_PERIOD, fast_last),
            ema_slow: warm(EMA_SLOW_PERIOD, slow_last),
        })
    }
}

/// Streaming ADX in the same shape as the other `ta` indicators
struct AdxState {
    period: usize,
    prev: Option<Bar>,
    plus_dm_ema: f64,
    minus_dm_ema: f64,
    tr_ema: f64,
    adx_ema: f64,
    bars_seen: usize,
}

impl AdxState {
    fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            plus_dm_ema: 0.0,
            minus_dm_ema: 0.0,
            tr_ema: 0.0,
            adx_ema: 0.0,
            bars_seen: 0,
        }
    }

    fn next(&mut self, bar: &Bar) -> f64 {
        self.bars_seen += 1;
        let Some(prev) = self.prev.replace(*bar) else {
            return f64::NAN;
        };

        let tr = (bar.high - bar.low)
            .max((bar.high - prev.close).abs())
            .max((bar.low - prev.close).abs());
        let up_move = bar.high - prev.high;
        let down_move = prev.low - bar.low;
        let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

        let alpha = 1.0 / self.period as f64;
        if self.bars_seen == 2 {
            self.tr_ema = tr;
            self.plus_dm_ema = plus_dm;
            self.minus_dm_ema = minus_dm;
        } else {
            self.tr_ema = self.tr_ema * (1.0 - alpha) + tr * alpha;
            self.plus_dm_ema = self.plus_dm_ema * (1.0 - alpha) + plus_dm * alpha;
            self.minus_dm_ema = self.minus_dm_ema * (1.0 - alpha) + minus_dm * alpha;
        }

        let dx = if self.tr_ema > 0.0 {
            let plus_di = self.plus_dm_ema / self.tr_ema * 100.0;
            let minus_di = self.minus_dm_ema / self.tr_ema * 100.0;
            let di_sum = plus_di + minus_di;
            if di_sum > 0.0 {
                (plus_di - minus_di).abs() / di_sum * 100.0
            } else {
                0.0
            }
        } else {
            0.0
        };

        if self.bars_seen == 2 {
            self.adx_ema = dx;
        } else {
            self.adx_ema = self.adx_ema * (1.0 - alpha) + dx * alpha;
        }
        self.adx_ema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests::rising_frame;

    #[test]
    fn test_warmup_masks() {
        let short = TaBackend.compute(&rising_frame(35)).unwrap();
        assert!(short.rsi.is_some());
        assert!(short.atr_pct.is_some());
        assert!(short.adx.is_some());
        assert!(short.ema_fast.is_some());
        assert_eq!(short.ema_slow, None);
    }

    #[test]
    fn test_uptrend_values() {
        let values = TaBackend.compute(&rising_frame(120)).unwrap();
        assert!(values.rsi.unwrap() > 90.0);
        assert!(values.adx.unwrap() > 90.0);
        let atr_pct = values.atr_pct.unwrap();
        assert!(atr_pct > 0.5 && atr_pct < 0.8, "atr_pct={atr_pct}");
        assert!(values.ema_fast.unwrap() > values.ema_slow.unwrap());
    }

    #[test]
    fn test_adx_flat_market_is_zero() {
        let mut state = AdxState::new(14);
        let bar = Bar { open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 0.0 };
        assert!(state.next(&bar).is_nan());
        for _ in 0..30 {
            assert_eq!(state.next(&bar), 0.0);
        }
    }
}
