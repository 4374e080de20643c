//! Capability provider contract
//!
//! A provider is whatever module actually does the work behind one or
//! more capabilities. The registry only sees it through this trait: the
//! descriptors it publishes, a stateless `execute`, and optional hooks for
//! stateful actors and health probes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use warren_types::HealthStatus;

use crate::actor::ActorOptions;
use crate::capability::{Capability, CapabilitySet};

/// Opaque, capability-defined actor state
pub type State = Value;

/// What a provider publishes for one capability
///
/// Immutable once published; republish to change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub id: String,
    /// Human-readable description, searched by free-text discovery
    #[serde(default)]
    pub intent: String,
    /// Input field names
    #[serde(default)]
    pub requires: Vec<String>,
    /// Output field names
    #[serde(default)]
    pub provides: Vec<String>,
    /// Side-effect tags
    #[serde(default)]
    pub effects: Vec<String>,
}

impl CapabilityDescriptor {
    pub fn new(id: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            intent: intent.into(),
            requires: Vec::new(),
            provides: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn requires<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn provides<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn effects<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.effects.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Who is calling and with what authority
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(default)]
    pub caller: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Free-form request attributes (request ids, locale, ...)
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    pub fn grant(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn capability_set(&self) -> CapabilitySet {
        self.capabilities.iter().cloned().collect()
    }

    /// Fail with `InsufficientCapabilities` unless the built-in rules let
    /// this context act on every one of `required`
    pub fn require(&self, required: &[Capability]) -> Result<(), ProviderError> {
        let available = self.capability_set();
        let missing: Vec<String> = required
            .iter()
            .filter(|req| !crate::capability::validate(req, &available))
            .map(ToString::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::InsufficientCapabilities(missing))
        }
    }
}

/// Failure reported by provider code
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Failed(String),

    #[error("missing capabilities: {}", .0.join(", "))]
    InsufficientCapabilities(Vec<String>),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} is not supported")]
    Unsupported(String),
}

impl ProviderError {
    pub fn failed(reason: impl Into<String>) -> Self {
        ProviderError::Failed(reason.into())
    }

    /// Failures caused by the caller rather than the provider
    ///
    /// These are reported back but never trigger an actor restart.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ProviderError::InsufficientCapabilities(_)
                | ProviderError::InvalidInput(_)
                | ProviderError::Unsupported(_)
        )
    }
}

/// Metadata a provider can report about itself
///
/// Every field is optional; the registry falls back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub component_type: Option<String>,
    pub version: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub dependencies: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub description: Option<String>,
}

#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Capabilities this provider publishes
    fn descriptors(&self) -> Vec<CapabilityDescriptor>;

    /// Stateless invocation
    async fn execute(
        &self,
        capability_id: &str,
        payload: Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, ProviderError>;

    /// Introspection hook used to enrich registration metadata
    fn profile(&self) -> ProviderProfile {
        ProviderProfile::default()
    }

    /// State a fresh actor starts from
    async fn initial_state(
        &self,
        _capability_id: &str,
        _options: &ActorOptions,
    ) -> Result<State, ProviderError> {
        Ok(Value::Object(Map::new()))
    }

    /// Whether actors for `capability_id` go through `handle_message`
    /// instead of `execute`
    fn handles_messages(&self, _capability_id: &str) -> bool {
        false
    }

    /// Stateful message handling; returns the reply and the next state
    async fn handle_message(
        &self,
        capability_id: &str,
        _message: Value,
        _ctx: &ExecutionContext,
        _state: &State,
    ) -> Result<(Value, State), ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "message handling for {}",
            capability_id
        )))
    }

    /// `None` when the provider has no health hook
    async fn health_check(&self) -> Option<HealthStatus> {
        None
    }
}
