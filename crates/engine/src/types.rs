//! Request, context and result types for gate evaluation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chain::Verdict;
use crate::config::GateConfig;
use crate::sanitize::{bounded_explanation, finalize_score, Node};

/// Direction requested by the upstream signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Up,
    Down,
    #[default]
    Neutral,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Up => "up",
            Signal::Down => "down",
            Signal::Neutral => "neutral",
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, Signal::Neutral)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller context of one evaluation. Gates only read `signal`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    #[serde(default)]
    pub signal: Option<Signal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now_ts: Option<String>,
}

impl RunContext {
    pub fn with_signal(signal: Signal) -> Self {
        Self {
            signal: Some(signal),
            ..Self::default()
        }
    }

    /// Requested direction, neutral when absent
    pub fn signal(&self) -> Signal {
        self.signal.unwrap_or_default()
    }
}

/// Tracing identifiers, carried through untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTrace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// One evaluation call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateRequest {
    pub strategy_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_version: Option<String>,
    #[serde(default)]
    pub config: GateConfig,
    #[serde(default)]
    pub feature_snapshot: Value,
    #[serde(default)]
    pub context: RunContext,
    #[serde(default)]
    pub trace: RunTrace,
}

impl GateRequest {
    pub fn new(strategy_type: impl Into<String>, feature_snapshot: Value, signal: Signal) -> Self {
        Self {
            strategy_type: strategy_type.into(),
            feature_snapshot,
            context: RunContext::with_signal(signal),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = match config {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    pub fn snapshot(&self) -> Node<'_> {
        Node::new(&self.feature_snapshot)
    }

    pub fn signal(&self) -> Signal {
        self.context.signal()
    }
}

/// Decision returned by every gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub allow: bool,
    pub score: f64,
    pub reason_codes: Vec<String>,
    pub tags: Vec<String>,
    pub explanation: String,
    pub meta: Map<String, Value>,
}

impl GateResult {
    /// Assemble a result with a normalized score and a bounded explanation
    pub fn from_verdict(
        verdict: Verdict,
        raw_score: f64,
        tags: Vec<String>,
        explanation: &str,
        meta: Value,
    ) -> Self {
        let (allow, reason_codes) = verdict.into_parts();
        Self {
            allow,
            score: finalize_score(raw_score),
            reason_codes,
            tags,
            explanation: bounded_explanation(explanation),
            meta: match meta {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.reason_codes.iter().any(|c| c == code)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
