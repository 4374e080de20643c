//! Engine coordinator
//!
//! `Engine` wires one registry, one discovery service and one supervisor
//! around a shared health cache. The application root constructs it and
//! passes it (or its parts) to whatever needs them.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use warren_types::{ActorId, ComponentId};

use crate::actor::{ActorOptions, ActorRef};
use crate::config::{ConfigError, EngineConfig};
use crate::discovery::{Discovery, DiscoveryQuery, DiscoveryRequest, Match, Strategy};
use crate::error::Result;
use crate::health::HealthCache;
use crate::persistence::Persistence;
use crate::provider::{CapabilityProvider, ExecutionContext};
use crate::registry::{MetadataPatch, Registry};
use crate::supervisor::Supervisor;

pub struct Engine {
    config: EngineConfig,
    registry: Arc<Registry>,
    discovery: Discovery,
    supervisor: Arc<Supervisor>,
}

impl Engine {
    /// Engine with persistence backends taken from `config`
    pub fn new(config: EngineConfig) -> Self {
        let persistence = Persistence::from_config(&config);
        Self::with_persistence(config, persistence)
    }

    pub fn with_persistence(config: EngineConfig, persistence: Persistence) -> Self {
        let health = Arc::new(HealthCache::new());
        let registry = Arc::new(Registry::with_config(&config, health));
        let supervisor = Supervisor::new(registry.clone(), Arc::new(persistence), config.clone());
        let discovery =
            Discovery::new(registry.clone(), &config).with_connections(supervisor.clone());
        Self {
            config,
            registry,
            discovery,
            supervisor,
        }
    }

    pub fn from_config_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let config = EngineConfig::from_file(path)?;
        info!(path = %path.display(), "loaded engine config");
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    pub fn register(
        &self,
        id: impl Into<ComponentId>,
        provider: Arc<dyn CapabilityProvider>,
        patch: MetadataPatch,
    ) -> Result<()> {
        self.registry.register(id, provider, patch)
    }

    pub fn discover(&self, request: impl Into<DiscoveryRequest>) -> Vec<Match> {
        self.registry.discover(request)
    }

    /// Best match using the configured default strategy
    pub fn best_match(&self, pattern: &DiscoveryQuery) -> Option<Match> {
        self.discovery
            .get_best_match(pattern, self.config.default_strategy)
    }

    pub fn best_match_with(&self, pattern: &DiscoveryQuery, strategy: Strategy) -> Option<Match> {
        self.discovery.get_best_match(pattern, strategy)
    }

    pub async fn execute(
        &self,
        capability_id: &str,
        payload: Value,
        ctx: &ExecutionContext,
    ) -> Result<Value> {
        self.registry.execute(capability_id, payload, ctx).await
    }

    pub async fn start_actor(
        &self,
        capability_id: &str,
        actor_id: impl Into<ActorId>,
        options: ActorOptions,
    ) -> Result<ActorRef> {
        self.supervisor
            .start_actor(capability_id, actor_id, options)
            .await
    }

    /// Get-or-create the actor, then send to it
    pub async fn send_to_actor(
        &self,
        capability_id: &str,
        actor_id: impl Into<ActorId>,
        message: Value,
        ctx: ExecutionContext,
    ) -> Result<Value> {
        let actor = self
            .supervisor
            .start_actor(capability_id, actor_id, ActorOptions::default())
            .await?;
        actor.send(message, ctx).await
    }

    pub async fn refresh_health(&self) {
        self.discovery.refresh_health_cache().await;
    }

    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
