use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;
use warren_types::{ActorKey, PersistenceStrategy};

use super::lifecycle::ActorStatus;
use crate::error::{NotFoundKind, Result, WarrenError};
use crate::provider::{ExecutionContext, State};

pub(crate) type Transform =
    Box<dyn FnOnce(&State) -> std::result::Result<State, String> + Send + 'static>;

pub(crate) enum Command {
    Send {
        message: Value,
        context: ExecutionContext,
        reply: oneshot::Sender<Result<Value>>,
    },
    Snapshot {
        reply: oneshot::Sender<ActorSnapshot>,
    },
    Update {
        transform: Transform,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reason: String,
        ack: oneshot::Sender<()>,
    },
}

/// Bookkeeping every actor carries next to its state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorMetadata {
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: u64,
    pub persistence_strategy: PersistenceStrategy,
    pub idle_timeout_ms: u64,
}

impl ActorMetadata {
    pub fn new(persistence_strategy: PersistenceStrategy, idle_timeout: Duration) -> Self {
        Self {
            created_at: Utc::now(),
            last_message_at: None,
            message_count: 0,
            persistence_strategy,
            idle_timeout_ms: idle_timeout.as_millis() as u64,
        }
    }
}

/// Read-only copy of an actor's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub key: ActorKey,
    pub state: State,
    pub metadata: ActorMetadata,
    pub status: ActorStatus,
}

pub(crate) struct Mailbox {
    pub(crate) tx: mpsc::UnboundedSender<Command>,
    pub(crate) instance: Uuid,
}

/// Handle to a running actor
///
/// Clones share one mailbox slot. When the supervisor restarts a crashed
/// actor it rebinds the slot, so handles taken before the crash keep
/// working.
#[derive(Clone)]
pub struct ActorRef {
    key: ActorKey,
    slot: Arc<RwLock<Mailbox>>,
    call_timeout: Duration,
}

impl std::fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef")
            .field("key", &self.key)
            .field("instance", &self.instance())
            .finish()
    }
}

impl ActorRef {
    pub(crate) fn new(key: ActorKey, mailbox: Mailbox, call_timeout: Duration) -> Self {
        Self {
            key,
            slot: Arc::new(RwLock::new(mailbox)),
            call_timeout,
        }
    }

    pub fn key(&self) -> &ActorKey {
        &self.key
    }

    /// Identity of the process currently behind this handle
    pub fn instance(&self) -> Uuid {
        self.slot.read().instance
    }

    pub fn is_alive(&self) -> bool {
        !self.slot.read().tx.is_closed()
    }

    /// Whether both handles point at the same slot
    pub fn same_actor(&self, other: &ActorRef) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    pub(crate) fn rebind(&self, mailbox: Mailbox) {
        *self.slot.write() = mailbox;
    }

    fn gone(&self) -> WarrenError {
        WarrenError::not_found(NotFoundKind::Actor, self.key.to_string())
    }

    fn post(&self, command: Command) -> Result<()> {
        let tx = self.slot.read().tx.clone();
        tx.send(command).map_err(|_| self.gone())
    }

    async fn await_reply<T>(
        &self,
        operation: &str,
        rx: oneshot::Receiver<T>,
        budget: Duration,
    ) -> Result<T> {
        match tokio::time::timeout(budget, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(self.gone()),
            Err(_) => Err(WarrenError::Timeout {
                operation: format!("{} {}", operation, self.key),
                after: budget,
            }),
        }
    }

    /// Round-trip a message with the default call timeout
    pub async fn send(&self, message: Value, context: ExecutionContext) -> Result<Value> {
        self.send_with_timeout(message, context, self.call_timeout)
            .await
    }

    /// Round-trip a message
    ///
    /// On timeout the caller gets an error while the actor finishes the
    /// message anyway.
    pub async fn send_with_timeout(
        &self,
        message: Value,
        context: ExecutionContext,
        budget: Duration,
    ) -> Result<Value> {
        let (reply, rx) = oneshot::channel();
        self.post(Command::Send {
            message,
            context,
            reply,
        })?;
        self.await_reply("send to", rx, budget).await?
    }

    pub async fn get_state(&self) -> Result<ActorSnapshot> {
        self.probe(self.call_timeout).await
    }

    /// Snapshot bounded by `budget`, used for liveness probes
    pub async fn probe(&self, budget: Duration) -> Result<ActorSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.post(Command::Snapshot { reply })?;
        self.await_reply("probe", rx, budget).await
    }

    /// Replace the state with `transform(state)`
    ///
    /// An `Err` or a panic inside `transform` leaves the state untouched
    /// and yields `state_update_failed`.
    pub async fn update_state<F>(&self, transform: F) -> Result<()>
    where
        F: FnOnce(&State) -> std::result::Result<State, String> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.post(Command::Update {
            transform: Box::new(transform),
            reply,
        })?;
        self.await_reply("update state of", rx, self.call_timeout)
            .await?
    }

    /// Ask the actor to stop and wait until it has flushed its state
    ///
    /// Stopping an actor that is already gone is a no-op.
    pub async fn stop(&self, reason: impl Into<String>) {
        let (ack, rx) = oneshot::channel();
        let command = Command::Stop {
            reason: reason.into(),
            ack,
        };
        if self.post(command).is_err() {
            return;
        }
        let _ = self.await_reply("stop", rx, self.call_timeout).await;
    }
}
