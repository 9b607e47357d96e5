//! Technical indicators computed on the fly from a raw OHLCV series
//!
//! Provides:
//! - `extract_frame`: snapshot `ohlcvSeries` → ordered, validated bar table
//! - `IndicatorBackend` trait with two interchangeable implementations
//!   (hand-written Wilder/TA-Lib style, and the `ta` crate)
//! - `IndicatorEngine`: backend resolution from a process-wide `BackendMode`
//!
//! All indicators are read at the last bar. An indicator whose warm-up window
//! is not yet filled is `None`.

mod frame;
#[cfg(feature = "ta-backend")]
mod ta_crate;
#[cfg(feature = "wilder-backend")]
mod wilder;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

pub use frame::{extract_frame, Bar, OhlcvFrame, MIN_BARS};
#[cfg(feature = "ta-backend")]
pub use ta_crate::TaBackend;
#[cfg(feature = "wilder-backend")]
pub use wilder::WilderBackend;

pub const RSI_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const EMA_FAST_PERIOD: usize = 20;
pub const EMA_SLOW_PERIOD: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    #[error("ta_input_missing")]
    InputMissing,
    #[error("ta_backend_unavailable")]
    BackendUnavailable,
    #[error("ta_compute_failed: {0}")]
    Compute(String),
}

impl IndicatorError {
    /// Stable machine-readable code, as reported in gate diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            IndicatorError::InputMissing => "ta_input_missing",
            IndicatorError::BackendUnavailable => "ta_backend_unavailable",
            IndicatorError::Compute(_) => "ta_compute_failed",
        }
    }
}

/// Indicator set at the most recent bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorValues {
    pub rsi: Option<f64>,
    pub adx: Option<f64>,
    pub atr_pct: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
}

/// ATR as a percentage of the last close
pub fn atr_percent(atr: Option<f64>, last_close: Option<f64>) -> Option<f64> {
    match (atr, last_close) {
        (Some(atr), Some(close)) if atr.is_finite() && close.is_finite() && close > 0.0 => {
            Some(atr / close * 100.0).filter(|pct| pct.is_finite())
        }
        _ => None,
    }
}

pub(crate) fn finite(value: f64) -> Option<f64> {
    Some(value).filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Wilder,
    Ta,
}

impl BackendKind {
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Wilder => "wilder",
            BackendKind::Ta => "ta",
        }
    }
}

/// One numeric implementation of the fixed indicator set
pub trait IndicatorBackend: Send + Sync {
    fn kind(&self) -> BackendKind;
    fn compute(&self, frame: &OhlcvFrame) -> Result<IndicatorValues, IndicatorError>;
}

/// Backend selection policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    #[default]
    Auto,
    Wilder,
    Ta,
}

impl BackendMode {
    /// Lenient parse; unrecognized values select `Auto`
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "wilder" | "talib" | "talib-only" => BackendMode::Wilder,
            "ta" | "pandas_ta" => BackendMode::Ta,
            _ => BackendMode::Auto,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackendMode::Auto => "auto",
            BackendMode::Wilder => "wilder",
            BackendMode::Ta => "ta",
        }
    }
}

/// Result of one indicator computation with the backend that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRun {
    pub backend: &'static str,
    pub outcome: Result<IndicatorValues, IndicatorError>,
}

/// Resolves a backend per `BackendMode` and runs it
pub struct IndicatorEngine {
    mode: BackendMode,
    backends: Vec<Arc<dyn IndicatorBackend>>,
}

impl IndicatorEngine {
    /// Engine over every backend compiled into this build
    pub fn from_mode(mode: BackendMode) -> Self {
        #[allow(unused_mut)]
        let mut backends: Vec<Arc<dyn IndicatorBackend>> = Vec::new();
        #[cfg(feature = "wilder-backend")]
        backends.push(Arc::new(WilderBackend));
        #[cfg(feature = "ta-backend")]
        backends.push(Arc::new(TaBackend));
        Self::with_backends(mode, backends)
    }

    pub fn with_backends(mode: BackendMode, backends: Vec<Arc<dyn IndicatorBackend>>) -> Self {
        debug!(
            mode = mode.label(),
            available = ?backends.iter().map(|b| b.kind().label()).collect::<Vec<_>>(),
            "Indicator engine configured"
        );
        Self { mode, backends }
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    fn find(&self, kind: BackendKind) -> Option<&Arc<dyn IndicatorBackend>> {
        self.backends.iter().find(|b| b.kind() == kind)
    }

    fn resolve(&self) -> Option<&Arc<dyn IndicatorBackend>> {
        match self.mode {
            BackendMode::Wilder => self.find(BackendKind::Wilder),
            BackendMode::Ta => self.find(BackendKind::Ta),
            BackendMode::Auto => self
                .find(BackendKind::Wilder)
                .or_else(|| self.find(BackendKind::Ta)),
        }
    }

    /// A forced backend that is not available fails; it never falls back
    pub fn compute(&self, frame: &OhlcvFrame) -> IndicatorRun {
        match self.resolve() {
            Some(backend) => {
                let outcome = backend.compute(frame);
                debug!(
                    backend = backend.kind().label(),
                    bars = frame.len(),
                    ok = outcome.is_ok(),
                    "Indicators computed"
                );
                IndicatorRun {
                    backend: backend.kind().label(),
                    outcome,
                }
            }
            None => {
                warn!(mode = self.mode.label(), "Indicator backend unavailable");
                IndicatorRun {
                    backend: self.mode.label(),
                    outcome: Err(IndicatorError::BackendUnavailable),
                }
            }
        }
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::from_mode(BackendMode::Auto)
    }
}

impl std::fmt::Debug for IndicatorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorEngine")
            .field("mode", &self.mode)
            .field(
                "backends",
                &self.backends.iter().map(|b| b.kind().label()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
