use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Where an actor is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    Initializing,
    Ready,
    Processing,
    Terminating,
    Terminated,
}

impl ActorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorStatus::Initializing => "initializing",
            ActorStatus::Ready => "ready",
            ActorStatus::Processing => "processing",
            ActorStatus::Terminating => "terminating",
            ActorStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Initialized,
    MessageReceived,
    MessageCompleted,
    IdleTimeout,
    StopRequested,
    Crashed,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid actor transition from {from} on {event:?}")]
pub struct InvalidTransition {
    pub from: ActorStatus,
    pub event: LifecycleEvent,
}

impl ActorStatus {
    /// Next status after `event`
    pub fn on(self, event: LifecycleEvent) -> Result<ActorStatus, InvalidTransition> {
        use ActorStatus::*;
        use LifecycleEvent::*;

        let next = match (self, event) {
            (Terminated, _) => Terminated,

            (Initializing, Initialized) => Ready,
            (Ready, MessageReceived) => Processing,
            (Processing, MessageCompleted) => Ready,

            (Ready, IdleTimeout | StopRequested) => Terminating,
            (Initializing | Processing, Crashed) => Terminating,
            (Terminating, Finalized) => Terminated,

            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }

    pub fn is_alive(&self) -> bool {
        !matches!(self, ActorStatus::Terminating | ActorStatus::Terminated)
    }
}
