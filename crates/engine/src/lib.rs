//! Gate Engine — deterministic strategy gates over market feature snapshots
//!
//! Provides:
//! - Seven rule-based gates that allow or block a directional signal
//! - Strategy registry with public metadata and per-call evaluation
//! - On-the-fly RSI/ADX/ATR/EMA from raw OHLCV with two interchangeable backends
//! - Safe navigation over loosely-typed JSON snapshots
//!
//! Evaluation is pure: no I/O, no clock, no randomness. The same request
//! always yields byte-identical output.

pub mod chain;
pub mod config;
pub mod gates;
pub mod indicators;
pub mod registry;
pub mod sanitize;
pub mod types;

// Re-exports for convenience
pub use chain::{Check, Verdict};
pub use config::{GateConfig, GateSettings, Overrides};
pub use gates::{builtin_gates, Gate};
pub use indicators::{BackendMode, IndicatorEngine, IndicatorError, IndicatorValues};
pub use registry::{Registry, RegistryBuilder, RegistryError, StrategyDescriptor};
pub use types::*;
