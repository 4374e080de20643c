//! Supervised actor lifecycle: get-or-create, idle timeout, crash restarts,
//! probes and persistence

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use warren_core::{
    ActorOptions, ActorRef, ActorStatus, CapabilityDescriptor, CapabilityProvider, ComponentId,
    Engine, EngineConfig, ExecutionContext, FileBackend, MetadataPatch, Persistence,
    PersistenceStrategy, ProbeStatus, ProviderError, State, Strategy, DiscoveryQuery,
};

/// `session` counts messages in its state. "crash" fails, "panic" panics,
/// "slow" sleeps for ten seconds.
struct Sessions;

#[async_trait]
impl CapabilityProvider for Sessions {
    fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        vec![CapabilityDescriptor::new("session", "Stateful chat session")]
    }

    async fn execute(
        &self,
        _capability_id: &str,
        payload: Value,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ProviderError> {
        Ok(payload)
    }

    fn handles_messages(&self, _capability_id: &str) -> bool {
        true
    }

    async fn handle_message(
        &self,
        _capability_id: &str,
        message: Value,
        _ctx: &ExecutionContext,
        state: &State,
    ) -> Result<(Value, State), ProviderError> {
        match message.as_str() {
            Some("crash") => return Err(ProviderError::failed("model backend unavailable")),
            Some("panic") => panic!("session handler panicked"),
            Some("slow") => tokio::time::sleep(Duration::from_secs(10)).await,
            _ => {}
        }
        let mut history = state["history"].as_array().cloned().unwrap_or_default();
        history.push(message);
        let next = json!({ "history": history });
        Ok((json!({ "turns": history.len() }), next))
    }
}

fn engine_with(config: EngineConfig) -> Engine {
    let engine = Engine::new(config);
    engine
        .register("sessions", Arc::new(Sessions), MetadataPatch::new())
        .unwrap();
    engine
}

fn engine() -> Engine {
    engine_with(EngineConfig::default())
}

/// Wait for the supervisor to bring the actor back under a new instance
async fn wait_for_restart(actor: &ActorRef, before: uuid::Uuid) {
    for _ in 0..400 {
        if actor.instance() != before && actor.is_alive() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("actor {} was not restarted", actor.key());
}

#[tokio::test]
async fn test_start_actor_is_idempotent() {
    let engine = engine();
    let first = engine
        .start_actor("session", "conv-1", ActorOptions::new())
        .await
        .unwrap();
    let second = engine
        .start_actor("session", "conv-1", ActorOptions::new())
        .await
        .unwrap();
    assert!(first.same_actor(&second));
    assert_eq!(engine.supervisor().list_actors().len(), 1);
    assert_eq!(engine.supervisor().stats().started, 1);
}

#[tokio::test]
async fn test_sequential_sends_see_previous_state() {
    let engine = engine();
    let actor = engine
        .start_actor("session", "conv-1", ActorOptions::new())
        .await
        .unwrap();
    let ctx = ExecutionContext::new();

    actor.send(json!("msg1"), ctx.clone()).await.unwrap();
    let snap = actor.get_state().await.unwrap();
    assert_eq!(snap.metadata.message_count, 1);

    let reply = actor.send(json!("msg2"), ctx).await.unwrap();
    assert_eq!(reply, json!({"turns": 2}));
    let snap = actor.get_state().await.unwrap();
    assert_eq!(snap.metadata.message_count, 2);
    assert_eq!(snap.state, json!({"history": ["msg1", "msg2"]}));
}

#[tokio::test]
async fn test_start_actor_unknown_capability() {
    let engine = engine();
    let err = engine
        .start_actor("missing", "a", ActorOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "capability_not_found");
    assert!(engine.supervisor().list_actors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_idle_actor_self_terminates() {
    let engine = engine();
    let supervisor = engine.supervisor();
    engine
        .start_actor(
            "session",
            "conv-1",
            ActorOptions::new().timeout(Duration::from_secs(60)),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;

    let err = supervisor
        .send(&"conv-1".into(), json!("hello"), ExecutionContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "actor_not_found");
    assert!(supervisor.list_actors().is_empty());

    // get-or-create brings up a fresh actor
    let reply = engine
        .send_to_actor("session", "conv-1", json!("again"), ExecutionContext::new())
        .await
        .unwrap();
    assert_eq!(reply, json!({"turns": 1}));
}

#[tokio::test]
async fn test_crash_restarts_with_pre_crash_state() {
    let engine = engine();
    let actor = engine
        .start_actor("session", "conv-1", ActorOptions::new())
        .await
        .unwrap();
    actor.send(json!("hello"), ExecutionContext::new()).await.unwrap();

    let before = actor.instance();
    let err = actor
        .send(json!("crash"), ExecutionContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "actor_crash");

    wait_for_restart(&actor, before).await;
    let snap = actor.get_state().await.unwrap();
    assert_eq!(snap.state, json!({"history": ["hello"]}));
    assert_eq!(snap.status, ActorStatus::Ready);
    assert_eq!(engine.supervisor().stats().restarts, 1);

    let reply = actor.send(json!("after"), ExecutionContext::new()).await.unwrap();
    assert_eq!(reply, json!({"turns": 2}));
}

#[tokio::test]
async fn test_panic_is_reported_as_crash() {
    let engine = engine();
    let actor = engine
        .start_actor("session", "conv-1", ActorOptions::new())
        .await
        .unwrap();
    let before = actor.instance();
    let err = actor
        .send(json!("panic"), ExecutionContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "actor_crash");
    wait_for_restart(&actor, before).await;
}

#[tokio::test]
async fn test_restart_budget_drops_actor() {
    let mut config = EngineConfig::default();
    config.restart.max_restarts = 1;
    let engine = engine_with(config);
    let actor = engine
        .start_actor("session", "conv-1", ActorOptions::new())
        .await
        .unwrap();

    let before = actor.instance();
    actor.send(json!("crash"), ExecutionContext::new()).await.unwrap_err();
    wait_for_restart(&actor, before).await;

    actor.send(json!("crash"), ExecutionContext::new()).await.unwrap_err();
    for _ in 0..400 {
        if engine.supervisor().stats().terminations.get("crashed") == Some(&1) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let stats = engine.supervisor().stats();
    assert_eq!(stats.restarts, 1);
    assert_eq!(stats.terminations.get("crashed"), Some(&1));
    assert!(!actor.is_alive());
    assert!(engine.supervisor().get(&"conv-1".into()).is_none());
}

#[tokio::test]
async fn test_no_restart_after_capability_unregistered() {
    let engine = engine();
    let actor = engine
        .start_actor("session", "conv-1", ActorOptions::new())
        .await
        .unwrap();
    engine.registry().unregister(&ComponentId::from("sessions"));

    actor.send(json!("crash"), ExecutionContext::new()).await.unwrap_err();
    for _ in 0..400 {
        if engine.supervisor().stats().terminations.contains_key("crashed") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(engine.supervisor().stats().restarts, 0);
    assert!(!actor.is_alive());
}

#[tokio::test]
async fn test_terminate_is_idempotent() {
    let engine = engine();
    let supervisor = engine.supervisor();
    let actor = engine
        .start_actor("session", "conv-1", ActorOptions::new())
        .await
        .unwrap();

    supervisor.terminate_actor(&actor, "user closed chat").await;
    assert!(!actor.is_alive());
    supervisor.terminate_actor(&actor, "again").await;
    assert!(supervisor.list_actors().is_empty());

    let err = actor.send(json!("x"), ExecutionContext::new()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_busy_actor_reported_unresponsive() {
    let engine = engine();
    let busy = engine
        .start_actor("session", "busy", ActorOptions::new())
        .await
        .unwrap();
    engine
        .start_actor("session", "idle", ActorOptions::new())
        .await
        .unwrap();

    let in_flight = {
        let busy = busy.clone();
        tokio::spawn(async move { busy.send(json!("slow"), ExecutionContext::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let infos = engine.supervisor().list_active_actors().await;
    assert_eq!(infos.len(), 2);
    let busy_info = infos
        .iter()
        .find(|i| i.key.actor_id.as_str() == "busy")
        .unwrap();
    assert_eq!(busy_info.status, ProbeStatus::Unresponsive);
    assert!(busy_info.metadata.is_none());
    let idle_info = infos
        .iter()
        .find(|i| i.key.actor_id.as_str() == "idle")
        .unwrap();
    assert_eq!(idle_info.status, ProbeStatus::Responsive(ActorStatus::Ready));

    assert!(in_flight.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_least_connections_counts_actor_sessions() {
    let engine = engine();
    engine
        .register(
            "other",
            Arc::new(Sessions2),
            MetadataPatch::new().component_type("chat"),
        )
        .unwrap();
    engine
        .registry()
        .update_metadata(
            &ComponentId::from("sessions"),
            MetadataPatch::new().component_type("chat"),
        )
        .unwrap();

    engine
        .start_actor("session", "conv-1", ActorOptions::new())
        .await
        .unwrap();

    let pick = engine
        .best_match_with(
            &DiscoveryQuery::any().component_type("chat"),
            Strategy::LeastConnections,
        )
        .unwrap();
    assert_eq!(pick.component_id.as_str(), "other");
}

struct Sessions2;

#[async_trait]
impl CapabilityProvider for Sessions2 {
    fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        vec![CapabilityDescriptor::new("session.v2", "Second chat session")]
    }

    async fn execute(
        &self,
        _capability_id: &str,
        payload: Value,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ProviderError> {
        Ok(payload)
    }
}

#[tokio::test]
async fn test_shutdown_flushes_disk_state() {
    let dir = tempfile::tempdir().unwrap();
    let persistence = || Persistence::new().with_disk(Arc::new(FileBackend::new(dir.path())));
    let options = || ActorOptions::new().persistence(PersistenceStrategy::Disk);

    let engine = Engine::with_persistence(EngineConfig::default(), persistence());
    engine
        .register("sessions", Arc::new(Sessions), MetadataPatch::new())
        .unwrap();
    let actor = engine.start_actor("session", "conv-1", options()).await.unwrap();
    actor.send(json!("remember me"), ExecutionContext::new()).await.unwrap();
    engine.shutdown().await;
    assert!(dir.path().join("conv-1.json").exists());

    let engine = Engine::with_persistence(EngineConfig::default(), persistence());
    engine
        .register("sessions", Arc::new(Sessions), MetadataPatch::new())
        .unwrap();
    let actor = engine.start_actor("session", "conv-1", options()).await.unwrap();
    let snap = actor.get_state().await.unwrap();
    assert_eq!(snap.state, json!({"history": ["remember me"]}));
    assert_eq!(snap.metadata.message_count, 1);
}

#[tokio::test]
async fn test_distributed_actor_resumes_with_default_engine() {
    let engine = engine();
    let options = || ActorOptions::new().persistence(PersistenceStrategy::Distributed);

    let actor = engine.start_actor("session", "conv-9", options()).await.unwrap();
    actor.send(json!("keep me"), ExecutionContext::new()).await.unwrap();
    engine
        .supervisor()
        .terminate_actor(&actor, "user closed chat")
        .await;
    assert!(!actor.is_alive());

    let actor = engine.start_actor("session", "conv-9", options()).await.unwrap();
    let snap = actor.get_state().await.unwrap();
    assert_eq!(snap.state, json!({"history": ["keep me"]}));
    assert_eq!(snap.metadata.message_count, 1);
    assert_eq!(
        snap.metadata.persistence_strategy,
        PersistenceStrategy::Distributed
    );
}
