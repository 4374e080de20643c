//! Actor supervisor
//!
//! Owns the table of live actors, keyed by actor id. Each actor gets a
//! watcher task that awaits its exit and applies the restart policy:
//! crashed actors come back with their pre-crash state, everything else is
//! dropped. Restarts are capped per actor by `restart.max_restarts` within
//! `restart.window_ms`.

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use warren_types::{ActorId, ActorKey, ComponentId};

use crate::actor::{
    ActorExit, ActorMetadata, ActorOptions, ActorProcess, ActorRef, ActorSettings, ActorStatus,
    ExitReason, Resume,
};
use crate::config::{EngineConfig, RestartConfig};
use crate::discovery::ConnectionCounter;
use crate::error::{NotFoundKind, Result, WarrenError};
use crate::persistence::{PersistedActor, Persistence};
use crate::provider::ExecutionContext;
use crate::registry::Registry;

/// What to do with an actor that exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Restart,
    Drop,
}

/// Transient policy: only abnormal exits are restarted
///
/// Caller errors never reach here as crashes; the process reports them and
/// keeps running.
pub fn decide(reason: &ExitReason) -> RestartDecision {
    match reason {
        ExitReason::Crashed(_) => RestartDecision::Restart,
        ExitReason::Stopped(_) | ExitReason::IdleTimeout | ExitReason::Orphaned => {
            RestartDecision::Drop
        }
    }
}

/// Outcome of asking for a restart
#[derive(Debug)]
enum Admission {
    Granted(ActorSettings),
    BudgetExhausted,
    /// The table no longer holds this actor: terminated, or replaced by a
    /// newer one under the same id
    Superseded,
}

struct SupervisedActor {
    actor_ref: ActorRef,
    settings: ActorSettings,
    restarts: VecDeque<Instant>,
}

/// Liveness as seen by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "status")]
pub enum ProbeStatus {
    Responsive(ActorStatus),
    Unresponsive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorInfo {
    pub key: ActorKey,
    pub status: ProbeStatus,
    /// Present when the actor answered the probe
    pub metadata: Option<ActorMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupervisorStats {
    pub live_actors: usize,
    pub started: u64,
    pub restarts: u64,
    /// Terminations by exit reason label
    pub terminations: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct Counters {
    started: u64,
    restarts: u64,
    terminations: BTreeMap<String, u64>,
}

pub struct Supervisor {
    registry: Arc<Registry>,
    persistence: Arc<Persistence>,
    config: EngineConfig,
    actors: DashMap<ActorId, SupervisedActor>,
    locks: DashMap<ActorId, Arc<tokio::sync::Mutex<()>>>,
    counters: Mutex<Counters>,
    this: Weak<Supervisor>,
}

impl Supervisor {
    pub fn new(registry: Arc<Registry>, persistence: Arc<Persistence>, config: EngineConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Supervisor {
            registry,
            persistence,
            config,
            actors: DashMap::new(),
            locks: DashMap::new(),
            counters: Mutex::new(Counters::default()),
            this: this.clone(),
        })
    }

    fn restart_config(&self) -> &RestartConfig {
        &self.config.restart
    }

    fn lock_for(&self, actor_id: &ActorId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(actor_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the per-id lock once nobody else holds it
    fn release_lock(&self, actor_id: &ActorId) {
        self.locks
            .remove_if(actor_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn live_ref(&self, actor_id: &ActorId) -> Option<ActorRef> {
        self.actors
            .get(actor_id)
            .map(|entry| entry.actor_ref.clone())
            .filter(ActorRef::is_alive)
    }

    /// Get-or-create the actor for `actor_id`
    ///
    /// An existing live actor is returned as is, whatever capability or
    /// options it was started with.
    pub async fn start_actor(
        &self,
        capability_id: &str,
        actor_id: impl Into<ActorId>,
        options: ActorOptions,
    ) -> Result<ActorRef> {
        let actor_id = actor_id.into();
        if let Some(existing) = self.live_ref(&actor_id) {
            return Ok(existing);
        }

        let lock = self.lock_for(&actor_id);
        let result = {
            let _guard = lock.lock().await;
            match self.live_ref(&actor_id) {
                Some(existing) => Ok(existing),
                None => self.launch(capability_id, &actor_id, options).await,
            }
        };
        drop(lock);
        self.release_lock(&actor_id);
        result
    }

    async fn launch(
        &self,
        capability_id: &str,
        actor_id: &ActorId,
        options: ActorOptions,
    ) -> Result<ActorRef> {
        let provider = self
            .registry
            .provider_for(capability_id)
            .ok_or_else(|| WarrenError::not_found(NotFoundKind::Capability, capability_id))?;
        let key = ActorKey::new(capability_id, actor_id.clone());
        let settings = ActorSettings::resolve(options, &self.config);

        let started = ActorProcess::start(
            key.clone(),
            provider,
            &settings,
            None,
            self.persistence.clone(),
        )
        .await?;
        let actor_ref = ActorRef::new(key.clone(), started.mailbox, settings.call_timeout);

        self.actors.insert(
            actor_id.clone(),
            SupervisedActor {
                actor_ref: actor_ref.clone(),
                settings,
                restarts: VecDeque::new(),
            },
        );
        self.counters.lock().started += 1;
        self.watch(actor_ref.clone(), started.task);

        info!(actor = %key, "started actor");
        Ok(actor_ref)
    }

    fn watch(&self, actor_ref: ActorRef, task: JoinHandle<ActorExit>) {
        let supervisor = self.this.clone();
        tokio::spawn(async move {
            let mut task = task;
            loop {
                let outcome = task.await;
                let Some(supervisor) = supervisor.upgrade() else {
                    return;
                };
                let exit = match outcome {
                    Ok(exit) => exit,
                    Err(err) => {
                        warn!(actor = %actor_ref.key(), error = %err, "actor task aborted");
                        supervisor.forget(&actor_ref, "aborted");
                        return;
                    }
                };
                match supervisor.after_exit(&actor_ref, exit).await {
                    Some(next) => task = next,
                    None => return,
                }
            }
        });
    }

    fn forget(&self, actor_ref: &ActorRef, label: &str) {
        let actor_id = &actor_ref.key().actor_id;
        self.actors
            .remove_if(actor_id, |_, entry| entry.actor_ref.same_actor(actor_ref));
        *self
            .counters
            .lock()
            .terminations
            .entry(label.to_string())
            .or_default() += 1;
    }

    /// Apply the restart policy; returns the restarted task, if any
    async fn after_exit(&self, actor_ref: &ActorRef, exit: ActorExit) -> Option<JoinHandle<ActorExit>> {
        let actor_id = exit.key.actor_id.clone();
        let lock = self.lock_for(&actor_id);
        let next = {
            let _guard = lock.lock().await;
            self.restart_or_drop(actor_ref, exit).await
        };
        drop(lock);
        self.release_lock(&actor_id);
        next
    }

    async fn restart_or_drop(&self, actor_ref: &ActorRef, exit: ActorExit) -> Option<JoinHandle<ActorExit>> {
        if decide(&exit.reason) == RestartDecision::Drop {
            self.forget(actor_ref, exit.reason.label());
            return None;
        }

        let settings = match self.admit_restart(actor_ref) {
            Admission::Granted(settings) => settings,
            Admission::BudgetExhausted => {
                warn!(actor = %exit.key, "restart budget exhausted, dropping actor");
                return self.drop_crashed(actor_ref, exit).await;
            }
            Admission::Superseded => {
                debug!(actor = %exit.key, "actor no longer supervised, not restarting");
                self.forget(actor_ref, exit.reason.label());
                return None;
            }
        };

        let Some(provider) = self.registry.provider_for(&exit.key.capability_id) else {
            warn!(actor = %exit.key, "capability no longer registered, dropping actor");
            return self.drop_crashed(actor_ref, exit).await;
        };

        match ActorProcess::start(
            exit.key.clone(),
            provider,
            &settings,
            Some(Resume::from(&exit)),
            self.persistence.clone(),
        )
        .await
        {
            Ok(started) => {
                self.counters.lock().restarts += 1;
                actor_ref.rebind(started.mailbox);
                info!(actor = %exit.key, reason = exit.reason.label(), "restarted actor");
                Some(started.task)
            }
            Err(err) => {
                warn!(actor = %exit.key, error = %err, "restart failed, dropping actor");
                self.drop_crashed(actor_ref, exit).await
            }
        }
    }

    /// Record a restart if the budget allows
    fn admit_restart(&self, actor_ref: &ActorRef) -> Admission {
        let restart = self.restart_config();
        let Some(mut entry) = self.actors.get_mut(&actor_ref.key().actor_id) else {
            return Admission::Superseded;
        };
        if !entry.actor_ref.same_actor(actor_ref) {
            return Admission::Superseded;
        }
        let now = Instant::now();
        let window = restart.window();
        while let Some(first) = entry.restarts.front() {
            if now.duration_since(*first) > window {
                entry.restarts.pop_front();
            } else {
                break;
            }
        }
        if entry.restarts.len() >= restart.max_restarts as usize {
            return Admission::BudgetExhausted;
        }
        entry.restarts.push_back(now);
        Admission::Granted(entry.settings.clone())
    }

    async fn drop_crashed(&self, actor_ref: &ActorRef, exit: ActorExit) -> Option<JoinHandle<ActorExit>> {
        self.forget(actor_ref, exit.reason.label());
        let record = PersistedActor {
            capability_id: exit.key.capability_id.clone(),
            state: exit.state,
            metadata: exit.metadata,
        };
        self.persistence
            .flush(&exit.key, record.metadata.persistence_strategy, &record)
            .await;
        None
    }

    /// Stop `actor_ref`; unknown or already-gone actors are a no-op
    pub async fn terminate_actor(&self, actor_ref: &ActorRef, reason: impl Into<String>) {
        let actor_id = &actor_ref.key().actor_id;
        self.actors
            .remove_if(actor_id, |_, entry| entry.actor_ref.same_actor(actor_ref));
        actor_ref.stop(reason).await;
        debug!(actor = %actor_ref.key(), "terminated actor");
    }

    pub fn get(&self, actor_id: &ActorId) -> Option<ActorRef> {
        self.live_ref(actor_id)
    }

    /// Send to an existing actor; `actor_not_found` if there is none
    pub async fn send(&self, actor_id: &ActorId, message: Value, context: ExecutionContext) -> Result<Value> {
        let actor_ref = self
            .get(actor_id)
            .ok_or_else(|| WarrenError::not_found(NotFoundKind::Actor, actor_id.to_string()))?;
        actor_ref.send(message, context).await
    }

    /// Handles to every actor whose process is still running
    pub fn list_actors(&self) -> Vec<ActorRef> {
        let mut refs: Vec<ActorRef> = self
            .actors
            .iter()
            .map(|entry| entry.actor_ref.clone())
            .filter(ActorRef::is_alive)
            .collect();
        refs.sort_by(|a, b| a.key().actor_id.cmp(&b.key().actor_id));
        refs
    }

    /// Probe every actor concurrently
    ///
    /// Actors that do not answer within the probe timeout are listed as
    /// unresponsive rather than left out.
    pub async fn list_active_actors(&self) -> Vec<ActorInfo> {
        let probe_timeout = self.config.probe_timeout();
        let probes = self.list_actors().into_iter().map(|actor_ref| async move {
            match actor_ref.probe(probe_timeout).await {
                Ok(snapshot) => ActorInfo {
                    key: snapshot.key,
                    status: ProbeStatus::Responsive(snapshot.status),
                    metadata: Some(snapshot.metadata),
                },
                Err(_) => ActorInfo {
                    key: actor_ref.key().clone(),
                    status: ProbeStatus::Unresponsive,
                    metadata: None,
                },
            }
        });
        join_all(probes).await
    }

    pub fn stats(&self) -> SupervisorStats {
        let live_actors = self.list_actors().len();
        let counters = self.counters.lock();
        SupervisorStats {
            live_actors,
            started: counters.started,
            restarts: counters.restarts,
            terminations: counters.terminations.clone(),
        }
    }

    /// Stop every actor and wait for their state to be flushed
    pub async fn shutdown(&self) {
        let refs: Vec<ActorRef> = self
            .actors
            .iter()
            .map(|entry| entry.actor_ref.clone())
            .collect();
        self.actors.clear();
        let count = refs.len();
        join_all(refs.iter().map(|r| r.stop("shutdown"))).await;
        info!(actors = count, "supervisor shut down");
    }
}

impl ConnectionCounter for Supervisor {
    /// Live actors running a capability the component published
    fn active_sessions(&self, component: &ComponentId) -> usize {
        let capabilities: Vec<String> = self
            .actors
            .iter()
            .filter(|entry| entry.actor_ref.is_alive())
            .map(|entry| entry.actor_ref.key().capability_id.clone())
            .collect();
        capabilities
            .iter()
            .filter(|cap| self.registry.owner_of(cap).as_ref() == Some(component))
            .count()
    }
}
