//! Error taxonomy for the warren engine
//!
//! Every fallible registry, discovery and actor operation reports one of
//! these variants. Each variant carries a stable snake_case code so that
//! surrounding collaborators (HTTP handlers, job runners) can map errors
//! without matching on display text.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::provider::ProviderError;

/// What a failed lookup was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Component,
    Capability,
    Actor,
}

impl NotFoundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotFoundKind::Component => "component",
            NotFoundKind::Capability => "capability",
            NotFoundKind::Actor => "actor",
        }
    }
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level engine error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WarrenError {
    /// Unknown component, capability or actor
    #[error("{kind} {id} not found")]
    NotFound { kind: NotFoundKind, id: String },

    /// Metadata update against an id that was never registered
    #[error("component {0} is not registered")]
    NotRegistered(String),

    /// Capability validation failed
    #[error("insufficient capabilities: missing {}", .missing.join(", "))]
    InsufficientCapabilities { missing: Vec<String> },

    /// A stateless provider call failed
    #[error("execution of {id} failed: {reason}")]
    ExecutionFailed { id: String, reason: String },

    /// A stateful actor's handler failed or panicked
    #[error("actor {actor} crashed: {reason}")]
    ActorCrash { actor: String, reason: String },

    /// A state transformation failed; the previous state was kept
    #[error("state update for actor {actor} failed: {reason}")]
    StateUpdateFailed { actor: String, reason: String },

    /// A time-bounded capability was used outside its window
    #[error("capability {capability} is outside its validity window")]
    TemporalConstraintViolation { capability: String },

    /// A bounded call exceeded its budget
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Caller supplied input the provider rejected
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl WarrenError {
    pub fn not_found(kind: NotFoundKind, id: impl Into<String>) -> Self {
        WarrenError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Taxonomy bucket (`not_found`, `timeout`, ...)
    pub fn kind(&self) -> &'static str {
        match self {
            WarrenError::NotFound { .. } => "not_found",
            WarrenError::NotRegistered(_) => "not_registered",
            WarrenError::InsufficientCapabilities { .. } => "insufficient_capabilities",
            WarrenError::ExecutionFailed { .. } => "execution_failed",
            WarrenError::ActorCrash { .. } => "actor_crash",
            WarrenError::StateUpdateFailed { .. } => "state_update_failed",
            WarrenError::TemporalConstraintViolation { .. } => "temporal_constraint_violation",
            WarrenError::Timeout { .. } => "timeout",
            WarrenError::InvalidInput(_) => "invalid_input",
        }
    }

    /// Stable, specific error code
    pub fn code(&self) -> &'static str {
        match self {
            WarrenError::NotFound { kind, .. } => match kind {
                NotFoundKind::Component => "component_not_found",
                NotFoundKind::Capability => "capability_not_found",
                NotFoundKind::Actor => "actor_not_found",
            },
            WarrenError::NotRegistered(_) => "component_not_registered",
            other => other.kind(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WarrenError::NotFound { .. })
    }

    /// Map a provider failure from a stateless `execute` call
    pub(crate) fn from_execution(id: &str, err: ProviderError) -> Self {
        match err {
            ProviderError::InsufficientCapabilities(missing) => {
                WarrenError::InsufficientCapabilities { missing }
            }
            ProviderError::InvalidInput(reason) => WarrenError::InvalidInput(reason),
            other => WarrenError::ExecutionFailed {
                id: id.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result type using WarrenError
pub type Result<T> = std::result::Result<T, WarrenError>;

/// Best-effort text of a caught panic payload
pub(crate) fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
