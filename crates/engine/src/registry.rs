//! Strategy registry
//!
//! Built once at startup, immutable afterwards. Lookup is by trimmed
//! strategy type; the public listing never exposes handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::gates::{builtin_gates, Gate, DEFAULT_VERSION};
use crate::indicators::IndicatorEngine;
use crate::sanitize::finalize_score;
use crate::types::{GateRequest, GateResult};

pub const ENGINE_NAME: &str = "rust";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("strategy_type_required")]
    EmptyType,
    #[error("strategy_already_registered:{0}")]
    Duplicate(String),
    #[error("strategy_not_found:{0}")]
    NotFound(String),
}

/// Public metadata of one registered strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDescriptor {
    #[serde(rename = "type")]
    pub strategy_type: String,
    pub name: String,
    pub version: String,
    pub default_config: Value,
    pub ui_schema: Value,
}

struct Registration {
    descriptor: StrategyDescriptor,
    handler: Arc<dyn Gate>,
}

/// Collects registrations until [`RegistryBuilder::build`] freezes them
#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<String, Registration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        strategy_type: &str,
        name: &str,
        version: &str,
        default_config: Value,
        ui_schema: Value,
        handler: Arc<dyn Gate>,
    ) -> Result<&mut Self, RegistryError> {
        let key = strategy_type.trim();
        if key.is_empty() {
            return Err(RegistryError::EmptyType);
        }
        if self.entries.contains_key(key) {
            return Err(RegistryError::Duplicate(key.to_string()));
        }

        let name = match name.trim() {
            "" => key,
            trimmed => trimmed,
        };
        let version = match version.trim() {
            "" => DEFAULT_VERSION,
            trimmed => trimmed,
        };

        self.entries.insert(
            key.to_string(),
            Registration {
                descriptor: StrategyDescriptor {
                    strategy_type: key.to_string(),
                    name: name.to_string(),
                    version: version.to_string(),
                    default_config,
                    ui_schema,
                },
                handler,
            },
        );
        Ok(self)
    }

    /// Register a gate under its own metadata
    pub fn register_gate(&mut self, gate: Arc<dyn Gate>) -> Result<&mut Self, RegistryError> {
        self.register(
            gate.strategy_type(),
            gate.name(),
            gate.version(),
            gate.default_config(),
            gate.ui_schema(),
            gate,
        )
    }

    pub fn build(self) -> Registry {
        Registry {
            entries: self.entries,
        }
    }
}

/// Immutable, process-wide strategy table
pub struct Registry {
    entries: BTreeMap<String, Registration>,
}

impl Registry {
    /// Registry holding every built-in gate
    pub fn builtin(indicators: Arc<IndicatorEngine>) -> Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::new();
        for gate in builtin_gates(indicators) {
            builder.register_gate(gate)?;
        }
        let registry = builder.build();
        info!(
            count = registry.len(),
            types = ?registry.entries.keys().collect::<Vec<_>>(),
            "Strategy registry ready"
        );
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, strategy_type: &str) -> Option<&StrategyDescriptor> {
        self.entries
            .get(strategy_type.trim())
            .map(|entry| &entry.descriptor)
    }

    /// Public metadata, sorted by type
    pub fn list_public(&self) -> Vec<StrategyDescriptor> {
        self.entries
            .values()
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// Run the requested gate and stamp engine provenance into `meta`
    pub fn evaluate(&self, request: &GateRequest) -> Result<GateResult, RegistryError> {
        let key = request.strategy_type.trim();
        if key.is_empty() {
            return Err(RegistryError::EmptyType);
        }
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;

        let mut result = entry.handler.evaluate(request);
        result.score = finalize_score(result.score);
        result.meta.insert("engine".to_string(), Value::from(ENGINE_NAME));
        result
            .meta
            .insert("strategyType".to_string(), Value::from(key));
        result.meta.insert(
            "strategyVersion".to_string(),
            Value::from(entry.descriptor.version.as_str()),
        );

        debug!(
            strategy = key,
            signal = %request.signal(),
            allow = result.allow,
            score = result.score,
            reasons = ?result.reason_codes,
            run_id = request.trace.run_id.as_deref().unwrap_or("-"),
            "Strategy evaluated"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
