use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;
use warren_types::{ActorKey, PersistenceStrategy};

use super::handle::{ActorMetadata, ActorRef, ActorSnapshot, Command, Mailbox, Transform};
use super::lifecycle::{ActorStatus, LifecycleEvent};
use crate::config::EngineConfig;
use crate::error::{panic_reason, NotFoundKind, Result, WarrenError};
use crate::persistence::{PersistedActor, Persistence};
use crate::provider::{CapabilityProvider, ExecutionContext, ProviderError, State};
use crate::registry::Registry;

/// Per-actor overrides; unset fields inherit from [`EngineConfig`]
#[derive(Debug, Clone, Default)]
pub struct ActorOptions {
    pub actor_timeout: Option<Duration>,
    pub persistence_strategy: Option<PersistenceStrategy>,
    /// Passed to the provider's `initial_state` hook
    pub init: Value,
}

impl ActorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.actor_timeout = Some(timeout);
        self
    }

    pub fn persistence(mut self, strategy: PersistenceStrategy) -> Self {
        self.persistence_strategy = Some(strategy);
        self
    }

    pub fn init(mut self, init: Value) -> Self {
        self.init = init;
        self
    }
}

/// Options with every default filled in
#[derive(Debug, Clone)]
pub struct ActorSettings {
    pub idle_timeout: Duration,
    pub call_timeout: Duration,
    pub persistence_strategy: PersistenceStrategy,
    pub options: ActorOptions,
}

impl ActorSettings {
    pub fn resolve(options: ActorOptions, config: &EngineConfig) -> Self {
        Self {
            idle_timeout: options.actor_timeout.unwrap_or_else(|| config.actor_timeout()),
            call_timeout: config.call_timeout(),
            persistence_strategy: options.persistence_strategy.unwrap_or_default(),
            options,
        }
    }
}

/// Why an actor process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Explicit stop
    Stopped(String),
    /// No message within the idle timeout
    IdleTimeout,
    /// Every handle was dropped
    Orphaned,
    /// Handler failed or panicked
    Crashed(String),
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExitReason::Stopped(_) => "stopped",
            ExitReason::IdleTimeout => "idle_timeout",
            ExitReason::Orphaned => "orphaned",
            ExitReason::Crashed(_) => "crashed",
        }
    }

    pub fn is_abnormal(&self) -> bool {
        matches!(self, ExitReason::Crashed(_))
    }
}

/// Final state of an actor process, handed to whoever awaits its task
#[derive(Debug, Clone)]
pub struct ActorExit {
    pub key: ActorKey,
    pub instance: Uuid,
    pub reason: ExitReason,
    pub state: State,
    pub metadata: ActorMetadata,
}

/// State and metadata to continue from instead of initializing
#[derive(Debug, Clone)]
pub(crate) struct Resume {
    pub(crate) state: State,
    pub(crate) metadata: ActorMetadata,
}

impl From<&ActorExit> for Resume {
    fn from(exit: &ActorExit) -> Self {
        Resume {
            state: exit.state.clone(),
            metadata: exit.metadata.clone(),
        }
    }
}

pub(crate) struct Started {
    pub(crate) mailbox: Mailbox,
    pub(crate) task: JoinHandle<ActorExit>,
}

enum Failure {
    /// Reported to the caller; the actor keeps running
    Caller(WarrenError),
    /// Reported to the caller; the actor exits
    Crash(String),
}

fn classify(capability_id: &str, err: ProviderError) -> Failure {
    if err.is_caller_error() {
        Failure::Caller(WarrenError::from_execution(capability_id, err))
    } else {
        Failure::Crash(err.to_string())
    }
}

/// Spawn a standalone actor for `capability_id`
///
/// The provider is resolved through the registry's descriptor index. The
/// returned task yields the [`ActorExit`] when the actor ends; nothing
/// restarts it. Use the supervisor for restarts.
pub async fn spawn(
    registry: &Registry,
    key: ActorKey,
    settings: ActorSettings,
    persistence: Arc<Persistence>,
) -> Result<(ActorRef, JoinHandle<ActorExit>)> {
    let provider = registry
        .provider_for(&key.capability_id)
        .ok_or_else(|| WarrenError::not_found(NotFoundKind::Capability, &key.capability_id))?;
    let call_timeout = settings.call_timeout;
    let started = ActorProcess::start(key.clone(), provider, &settings, None, persistence).await?;
    Ok((
        ActorRef::new(key, started.mailbox, call_timeout),
        started.task,
    ))
}

pub(crate) struct ActorProcess {
    key: ActorKey,
    instance: Uuid,
    provider: Arc<dyn CapabilityProvider>,
    state: State,
    metadata: ActorMetadata,
    status: ActorStatus,
    idle_timeout: Duration,
    rx: mpsc::UnboundedReceiver<Command>,
    persistence: Arc<Persistence>,
}

impl ActorProcess {
    /// Initialize state and launch the process task
    ///
    /// State comes from `resume` when given, else from the persistence
    /// backend for durable strategies, else from the provider's
    /// `initial_state` hook.
    pub(crate) async fn start(
        key: ActorKey,
        provider: Arc<dyn CapabilityProvider>,
        settings: &ActorSettings,
        resume: Option<Resume>,
        persistence: Arc<Persistence>,
    ) -> Result<Started> {
        let strategy = settings.persistence_strategy;
        let resume = match resume {
            Some(resume) => Some(resume),
            None => persistence.restore(&key, strategy).await.map(|record| {
                debug!(actor = %key, "resuming from persisted state");
                Resume {
                    state: record.state,
                    metadata: record.metadata,
                }
            }),
        };

        let (state, mut metadata) = match resume {
            Some(resume) => (resume.state, resume.metadata),
            None => {
                let init = AssertUnwindSafe(
                    provider.initial_state(&key.capability_id, &settings.options),
                )
                .catch_unwind()
                .await;
                let state = match init {
                    Ok(Ok(state)) => state,
                    Ok(Err(err)) => return Err(init_error(&key, err)),
                    Err(panic) => {
                        return Err(WarrenError::ActorCrash {
                            actor: key.to_string(),
                            reason: panic_reason(panic.as_ref()),
                        })
                    }
                };
                (state, ActorMetadata::new(strategy, settings.idle_timeout))
            }
        };
        metadata.persistence_strategy = strategy;
        metadata.idle_timeout_ms = settings.idle_timeout.as_millis() as u64;

        let (tx, rx) = mpsc::unbounded_channel();
        let instance = Uuid::new_v4();
        let mut process = ActorProcess {
            key,
            instance,
            provider,
            state,
            metadata,
            status: ActorStatus::Initializing,
            idle_timeout: settings.idle_timeout,
            rx,
            persistence,
        };
        process.advance(LifecycleEvent::Initialized);
        let task = tokio::spawn(process.run());

        Ok(Started {
            mailbox: Mailbox { tx, instance },
            task,
        })
    }

    fn advance(&mut self, event: LifecycleEvent) {
        match self.status.on(event) {
            Ok(next) => {
                debug!(actor = %self.key, from = %self.status, to = %next, "actor transition");
                self.status = next;
            }
            Err(err) => warn!(actor = %self.key, error = %err, "ignored lifecycle event"),
        }
    }

    fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            key: self.key.clone(),
            state: self.state.clone(),
            metadata: self.metadata.clone(),
            status: self.status,
        }
    }

    async fn run(mut self) -> ActorExit {
        let mut deadline = Instant::now() + self.idle_timeout;
        let mut stop_ack: Option<oneshot::Sender<()>> = None;

        let reason = loop {
            let command = tokio::select! {
                command = self.rx.recv() => command,
                _ = sleep_until(deadline) => {
                    self.advance(LifecycleEvent::IdleTimeout);
                    break ExitReason::IdleTimeout;
                }
            };

            match command {
                None => {
                    self.advance(LifecycleEvent::StopRequested);
                    break ExitReason::Orphaned;
                }
                Some(Command::Send {
                    message,
                    context,
                    reply,
                }) => {
                    deadline = Instant::now() + self.idle_timeout;
                    match self.handle_message(message, context).await {
                        Ok(value) => {
                            let _ = reply.send(Ok(value));
                        }
                        Err(Failure::Caller(err)) => {
                            let _ = reply.send(Err(err));
                        }
                        Err(Failure::Crash(reason)) => {
                            let _ = reply.send(Err(WarrenError::ActorCrash {
                                actor: self.key.to_string(),
                                reason: reason.clone(),
                            }));
                            break ExitReason::Crashed(reason);
                        }
                    }
                }
                Some(Command::Snapshot { reply }) => {
                    let _ = reply.send(self.snapshot());
                }
                Some(Command::Update { transform, reply }) => {
                    let _ = reply.send(self.apply_update(transform));
                }
                Some(Command::Stop { reason, ack }) => {
                    self.advance(LifecycleEvent::StopRequested);
                    stop_ack = Some(ack);
                    break ExitReason::Stopped(reason);
                }
            }
        };

        // refuse new commands; anything still queued sees the actor as gone
        self.rx.close();
        while self.rx.try_recv().is_ok() {}

        if !reason.is_abnormal() {
            let record = PersistedActor {
                capability_id: self.key.capability_id.clone(),
                state: self.state.clone(),
                metadata: self.metadata.clone(),
            };
            self.persistence
                .flush(&self.key, self.metadata.persistence_strategy, &record)
                .await;
        }
        self.advance(LifecycleEvent::Finalized);
        info!(
            actor = %self.key,
            reason = reason.label(),
            messages = self.metadata.message_count,
            "actor terminated"
        );
        if let Some(ack) = stop_ack {
            let _ = ack.send(());
        }

        ActorExit {
            key: self.key,
            instance: self.instance,
            reason,
            state: self.state,
            metadata: self.metadata,
        }
    }

    async fn handle_message(
        &mut self,
        message: Value,
        context: ExecutionContext,
    ) -> std::result::Result<Value, Failure> {
        self.advance(LifecycleEvent::MessageReceived);
        self.metadata.message_count += 1;
        self.metadata.last_message_at = Some(Utc::now());

        let capability_id = self.key.capability_id.clone();
        let outcome = if self.provider.handles_messages(&capability_id) {
            let call = self
                .provider
                .handle_message(&capability_id, message, &context, &self.state);
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(Ok((reply, next))) => Ok((reply, Some(next))),
                Ok(Err(err)) => Err(classify(&capability_id, err)),
                Err(panic) => Err(Failure::Crash(panic_reason(panic.as_ref()))),
            }
        } else {
            let call = self.provider.execute(&capability_id, message, &context);
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(Ok(reply)) => Ok((reply, None)),
                Ok(Err(err)) => Err(classify(&capability_id, err)),
                Err(panic) => Err(Failure::Crash(panic_reason(panic.as_ref()))),
            }
        };

        match outcome {
            Ok((reply, next)) => {
                if let Some(next) = next {
                    self.state = next;
                }
                self.advance(LifecycleEvent::MessageCompleted);
                Ok(reply)
            }
            Err(Failure::Caller(err)) => {
                self.advance(LifecycleEvent::MessageCompleted);
                Err(Failure::Caller(err))
            }
            Err(Failure::Crash(reason)) => {
                warn!(actor = %self.key, %reason, "actor handler crashed");
                self.advance(LifecycleEvent::Crashed);
                Err(Failure::Crash(reason))
            }
        }
    }

    fn apply_update(&mut self, transform: Transform) -> Result<()> {
        let state = &self.state;
        match std::panic::catch_unwind(AssertUnwindSafe(|| transform(state))) {
            Ok(Ok(next)) => {
                self.state = next;
                Ok(())
            }
            Ok(Err(reason)) => Err(WarrenError::StateUpdateFailed {
                actor: self.key.to_string(),
                reason,
            }),
            Err(panic) => Err(WarrenError::StateUpdateFailed {
                actor: self.key.to_string(),
                reason: panic_reason(panic.as_ref()),
            }),
        }
    }
}

fn init_error(key: &ActorKey, err: ProviderError) -> WarrenError {
    if err.is_caller_error() {
        WarrenError::from_execution(&key.capability_id, err)
    } else {
        WarrenError::ActorCrash {
            actor: key.to_string(),
            reason: err.to_string(),
        }
    }
}
