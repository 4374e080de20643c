//! Component registry
//!
//! The registry is the directory of everything that can be found or
//! invoked. Components live in one concurrent table keyed by id, and
//! every descriptor a component publishes is indexed by descriptor id so
//! that execution and actor spawning resolve their provider directly.
//!
//! Reads never block on writers. Writes to one id (register, unregister,
//! update_metadata) are serialized by a per-id lock so the component
//! table, the descriptor index and the health cache change together;
//! writes to different ids never contend. No code path holds a guard on
//! one table while touching the other.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use warren_types::{ComponentId, HealthStatus};

use crate::capability::ImplicationRules;
use crate::config::EngineConfig;
use crate::discovery::scoring::{self, Candidate, Match};
use crate::discovery::DiscoveryRequest;
use crate::error::{panic_reason, NotFoundKind, Result, WarrenError};
use crate::health::HealthCache;
use crate::provider::{CapabilityDescriptor, CapabilityProvider, ExecutionContext};

const DEFAULT_TYPE: &str = "generic";
const DEFAULT_VERSION: &str = "1.0.0";

/// What the registry knows about one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub id: ComponentId,
    #[serde(rename = "type")]
    pub component_type: String,
    pub version: String,
    /// Capability tags this component provides (`read:/docs`, `admin`)
    pub capabilities: Vec<String>,
    pub dependencies: Vec<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    /// Introspected shape: descriptor id to its inputs, outputs and effects
    pub interface: Value,
    /// Cached health at the time this snapshot was taken
    pub health: HealthStatus,
    pub registered_at: DateTime<Utc>,
}

impl ComponentMetadata {
    pub fn new(id: ComponentId) -> Self {
        Self {
            id,
            component_type: DEFAULT_TYPE.to_string(),
            version: DEFAULT_VERSION.to_string(),
            capabilities: Vec::new(),
            dependencies: Vec::new(),
            tags: Vec::new(),
            description: None,
            interface: Value::Object(Map::new()),
            health: HealthStatus::Unknown,
            registered_at: Utc::now(),
        }
    }
}

/// Caller-supplied metadata; set fields win over introspected values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataPatch {
    #[serde(rename = "type")]
    pub component_type: Option<String>,
    pub version: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub dependencies: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub description: Option<String>,
    pub interface: Option<Value>,
    pub health: Option<HealthStatus>,
}

impl MetadataPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component_type(mut self, value: impl Into<String>) -> Self {
        self.component_type = Some(value.into());
        self
    }

    pub fn version(mut self, value: impl Into<String>) -> Self {
        self.version = Some(value.into());
        self
    }

    pub fn capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(caps.into_iter().map(Into::into).collect());
        self
    }

    pub fn dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(deps.into_iter().map(Into::into).collect());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn description(mut self, value: impl Into<String>) -> Self {
        self.description = Some(value.into());
        self
    }

    pub fn health(mut self, status: HealthStatus) -> Self {
        self.health = Some(status);
        self
    }

    /// Merge set fields into `meta`. Health lives in the health cache and
    /// is applied by the registry, not here.
    fn apply(&self, meta: &mut ComponentMetadata) {
        if let Some(v) = &self.component_type {
            meta.component_type = v.clone();
        }
        if let Some(v) = &self.version {
            meta.version = v.clone();
        }
        if let Some(v) = &self.capabilities {
            meta.capabilities = v.clone();
        }
        if let Some(v) = &self.dependencies {
            meta.dependencies = v.clone();
        }
        if let Some(v) = &self.tags {
            meta.tags = v.clone();
        }
        if let Some(v) = &self.description {
            meta.description = Some(v.clone());
        }
        if let Some(v) = &self.interface {
            meta.interface = v.clone();
        }
    }
}

struct ComponentEntry {
    metadata: ComponentMetadata,
    provider: Arc<dyn CapabilityProvider>,
    descriptors: Vec<CapabilityDescriptor>,
}

struct DescriptorEntry {
    descriptor: CapabilityDescriptor,
    owner: ComponentId,
    provider: Arc<dyn CapabilityProvider>,
}

/// The component directory
pub struct Registry {
    components: DashMap<ComponentId, ComponentEntry>,
    descriptors: DashMap<String, DescriptorEntry>,
    writes: DashMap<ComponentId, Arc<Mutex<()>>>,
    health: Arc<HealthCache>,
    rules: Arc<ImplicationRules>,
    call_timeout: Duration,
    stale_after: Duration,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default(), Arc::new(HealthCache::new()))
    }

    pub fn with_config(config: &EngineConfig, health: Arc<HealthCache>) -> Self {
        Self {
            components: DashMap::new(),
            descriptors: DashMap::new(),
            writes: DashMap::new(),
            health,
            rules: Arc::new(ImplicationRules::builtin()),
            call_timeout: config.call_timeout(),
            stale_after: config.health_stale_after(),
        }
    }

    /// Replace the implication table used by structured discovery
    pub fn with_rules(mut self, rules: ImplicationRules) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    pub fn rules(&self) -> &ImplicationRules {
        &self.rules
    }

    pub fn health_cache(&self) -> &Arc<HealthCache> {
        &self.health
    }

    /// Run `write` while holding the write lock for `id`
    fn with_write_lock<T>(&self, id: &ComponentId, write: impl FnOnce() -> T) -> T {
        let lock = self
            .writes
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock();
            write()
        };
        drop(lock);
        self.writes
            .remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Register `provider` under `id`, replacing any existing entry
    ///
    /// Metadata is merged in priority order: `patch`, then what the
    /// provider reports about itself, then defaults. A provider that lists
    /// no capability tags advertises its descriptor ids instead.
    pub fn register(
        &self,
        id: impl Into<ComponentId>,
        provider: Arc<dyn CapabilityProvider>,
        patch: MetadataPatch,
    ) -> Result<()> {
        let id = id.into();
        if id.as_str().trim().is_empty() {
            return Err(WarrenError::InvalidInput(
                "component id must not be empty".to_string(),
            ));
        }

        let descriptors = provider.descriptors();
        let profile = provider.profile();

        let mut metadata = ComponentMetadata::new(id.clone());
        if let Some(t) = profile.component_type {
            metadata.component_type = t;
        }
        if let Some(v) = profile.version {
            metadata.version = v;
        }
        metadata.capabilities = profile
            .capabilities
            .unwrap_or_else(|| descriptors.iter().map(|d| d.id.clone()).collect());
        metadata.dependencies = profile.dependencies.unwrap_or_default();
        metadata.tags = profile.tags.unwrap_or_default();
        metadata.description = profile.description;
        metadata.interface = interface_of(&descriptors);
        patch.apply(&mut metadata);

        let published = self.with_write_lock(&id, || {
            let published: BTreeSet<String> = descriptors.iter().map(|d| d.id.clone()).collect();
            let replaced = self.components.insert(
                id.clone(),
                ComponentEntry {
                    metadata,
                    provider: provider.clone(),
                    descriptors: descriptors.clone(),
                },
            );

            if replaced.is_some() {
                self.descriptors
                    .retain(|desc_id, entry| entry.owner != id || published.contains(desc_id));
                debug!(component = %id, "replaced existing registration");
            }

            for descriptor in descriptors {
                let desc_id = descriptor.id.clone();
                let previous = self.descriptors.insert(
                    desc_id.clone(),
                    DescriptorEntry {
                        descriptor,
                        owner: id.clone(),
                        provider: provider.clone(),
                    },
                );
                if let Some(previous) = previous {
                    if previous.owner != id {
                        warn!(
                            capability = %desc_id,
                            previous = %previous.owner,
                            component = %id,
                            "capability descriptor taken over by another component"
                        );
                    }
                }
            }

            match patch.health {
                Some(status) => self.health.set(id.clone(), status),
                None => self.health.remove(&id),
            }
            published
        });

        info!(component = %id, capabilities = published.len(), "registered component");
        Ok(())
    }

    /// Remove `id` and everything it published; missing ids are a no-op
    pub fn unregister(&self, id: &ComponentId) {
        let removed = self.with_write_lock(id, || {
            if self.components.remove(id).is_none() {
                return false;
            }
            self.descriptors.retain(|_, entry| entry.owner != *id);
            self.health.remove(id);
            true
        });
        if removed {
            info!(component = %id, "unregistered component");
        }
    }

    /// Cache `status` for `id` if it is still registered
    pub fn record_health(&self, id: &ComponentId, status: HealthStatus) -> bool {
        self.with_write_lock(id, || {
            if !self.components.contains_key(id) {
                return false;
            }
            self.health.set(id.clone(), status);
            true
        })
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.components.contains_key(id)
    }

    pub fn get_metadata(&self, id: &ComponentId) -> Option<ComponentMetadata> {
        let mut metadata = self.components.get(id)?.metadata.clone();
        metadata.health = self.health.get(id);
        Some(metadata)
    }

    pub fn update_metadata(&self, id: &ComponentId, patch: MetadataPatch) -> Result<()> {
        self.with_write_lock(id, || -> Result<()> {
            {
                let mut entry = self
                    .components
                    .get_mut(id)
                    .ok_or_else(|| WarrenError::NotRegistered(id.to_string()))?;
                patch.apply(&mut entry.metadata);
            }
            if let Some(status) = patch.health {
                self.health.set(id.clone(), status);
            }
            Ok(())
        })?;
        debug!(component = %id, "updated metadata");
        Ok(())
    }

    /// Every component, ordered by id
    pub fn list_all(&self) -> Vec<ComponentMetadata> {
        let mut all: Vec<ComponentMetadata> = self
            .components
            .iter()
            .map(|entry| entry.metadata.clone())
            .collect();
        for metadata in &mut all {
            metadata.health = self.health.get(&metadata.id);
        }
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Every published descriptor, ordered by id
    pub fn list_descriptors(&self) -> Vec<CapabilityDescriptor> {
        let mut all: Vec<CapabilityDescriptor> = self
            .descriptors
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn descriptor(&self, capability_id: &str) -> Option<CapabilityDescriptor> {
        self.descriptors
            .get(capability_id)
            .map(|entry| entry.descriptor.clone())
    }

    /// Component that published `capability_id`
    pub fn owner_of(&self, capability_id: &str) -> Option<ComponentId> {
        self.descriptors
            .get(capability_id)
            .map(|entry| entry.owner.clone())
    }

    pub(crate) fn provider_for(&self, capability_id: &str) -> Option<Arc<dyn CapabilityProvider>> {
        self.descriptors
            .get(capability_id)
            .map(|entry| entry.provider.clone())
    }

    pub(crate) fn providers(&self) -> Vec<(ComponentId, Arc<dyn CapabilityProvider>)> {
        self.components
            .iter()
            .map(|entry| (entry.key().clone(), entry.provider.clone()))
            .collect()
    }

    /// Metadata snapshots with live health, for scoring
    pub(crate) fn candidates(&self) -> Vec<Candidate> {
        self.list_all()
            .into_iter()
            .map(|metadata| {
                let stale = self.health.is_stale(&metadata.id, self.stale_after);
                Candidate { metadata, stale }
            })
            .collect()
    }

    /// Free-text or structured discovery; zero matches is an empty list
    pub fn discover(&self, request: impl Into<DiscoveryRequest>) -> Vec<Match> {
        match request.into() {
            DiscoveryRequest::Text(text) => self.discover_text(&text),
            DiscoveryRequest::Structured(query) => {
                scoring::rank(&self.rules, &query, self.candidates())
            }
        }
    }

    /// Case-insensitive word search over descriptions and intents
    ///
    /// A component matches when any query word is a substring of its
    /// searchable text; the score is the fraction of words found.
    fn discover_text(&self, text: &str) -> Vec<Match> {
        let words: BTreeSet<String> = text.split_whitespace().map(str::to_lowercase).collect();
        if words.is_empty() {
            return Vec::new();
        }

        let searchable: Vec<(ComponentMetadata, String)> = self
            .components
            .iter()
            .map(|entry| {
                let mut haystack = entry.metadata.description.clone().unwrap_or_default();
                for descriptor in &entry.descriptors {
                    haystack.push('\n');
                    haystack.push_str(&descriptor.intent);
                }
                (entry.metadata.clone(), haystack.to_lowercase())
            })
            .collect();

        let mut matches: Vec<Match> = searchable
            .into_iter()
            .filter_map(|(mut metadata, haystack)| {
                let hits = words.iter().filter(|w| haystack.contains(w.as_str())).count();
                if hits == 0 {
                    return None;
                }
                metadata.health = self.health.get(&metadata.id);
                Some(Match {
                    component_id: metadata.id.clone(),
                    metadata,
                    score: hits as f64 / words.len() as f64,
                })
            })
            .collect();
        scoring::sort_matches(&mut matches);
        matches
    }

    /// Run a capability statelessly, bounded by the call timeout
    ///
    /// The provider call runs on its own task. If the budget elapses the
    /// caller gets `timeout` while the call keeps running to completion.
    pub async fn execute(
        &self,
        capability_id: &str,
        payload: Value,
        ctx: &ExecutionContext,
    ) -> Result<Value> {
        let provider = self
            .provider_for(capability_id)
            .ok_or_else(|| WarrenError::not_found(NotFoundKind::Capability, capability_id))?;

        let id = capability_id.to_string();
        let ctx = ctx.clone();
        let call = tokio::spawn(async move { provider.execute(&id, payload, &ctx).await });

        match tokio::time::timeout(self.call_timeout, call).await {
            Err(_) => {
                warn!(capability = %capability_id, "execution timed out");
                Err(WarrenError::Timeout {
                    operation: format!("execute {}", capability_id),
                    after: self.call_timeout,
                })
            }
            Ok(Err(join_err)) => {
                let reason = if join_err.is_panic() {
                    panic_reason(join_err.into_panic().as_ref())
                } else {
                    "execution task was cancelled".to_string()
                };
                warn!(capability = %capability_id, %reason, "execution aborted");
                Err(WarrenError::ExecutionFailed {
                    id: capability_id.to_string(),
                    reason,
                })
            }
            Ok(Ok(result)) => {
                result.map_err(|err| WarrenError::from_execution(capability_id, err))
            }
        }
    }
}

fn interface_of(descriptors: &[CapabilityDescriptor]) -> Value {
    let shape: Map<String, Value> = descriptors
        .iter()
        .map(|d| {
            (
                d.id.clone(),
                json!({
                    "requires": d.requires,
                    "provides": d.provides,
                    "effects": d.effects,
                }),
            )
        })
        .collect();
    Value::Object(shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryQuery;
    use crate::provider::{ProviderError, ProviderProfile};
    use async_trait::async_trait;

    struct Notes;

    #[async_trait]
    impl CapabilityProvider for Notes {
        fn descriptors(&self) -> Vec<CapabilityDescriptor> {
            vec![
                CapabilityDescriptor::new("notes.search", "Search notes by keyword")
                    .requires(["query"])
                    .provides(["hits"]),
                CapabilityDescriptor::new("notes.fail", "Always fails"),
            ]
        }

        async fn execute(
            &self,
            capability_id: &str,
            payload: Value,
            _ctx: &ExecutionContext,
        ) -> std::result::Result<Value, ProviderError> {
            match capability_id {
                "notes.fail" => Err(ProviderError::failed("index offline")),
                _ => Ok(json!({ "echo": payload })),
            }
        }

        fn profile(&self) -> ProviderProfile {
            ProviderProfile {
                component_type: Some("reactor".into()),
                tags: Some(vec!["notes".into()]),
                description: Some("Personal note store".into()),
                ..ProviderProfile::default()
            }
        }
    }

    struct Bare;

    #[async_trait]
    impl CapabilityProvider for Bare {
        fn descriptors(&self) -> Vec<CapabilityDescriptor> {
            vec![CapabilityDescriptor::new("bare.run", "Run the bare thing")]
        }

        async fn execute(
            &self,
            _capability_id: &str,
            _payload: Value,
            _ctx: &ExecutionContext,
        ) -> std::result::Result<Value, ProviderError> {
            Ok(Value::Null)
        }
    }

    fn id(s: &str) -> ComponentId {
        ComponentId::from(s)
    }

    #[test]
    fn test_register_merges_profile_and_defaults() {
        let registry = Registry::new();
        registry
            .register("bare", Arc::new(Bare), MetadataPatch::new())
            .unwrap();
        let meta = registry.get_metadata(&id("bare")).unwrap();
        assert_eq!(meta.component_type, "generic");
        assert_eq!(meta.version, "1.0.0");
        assert_eq!(meta.capabilities, vec!["bare.run"]);
        assert_eq!(meta.health, HealthStatus::Unknown);

        registry
            .register("notes", Arc::new(Notes), MetadataPatch::new().version("2.1.0"))
            .unwrap();
        let meta = registry.get_metadata(&id("notes")).unwrap();
        assert_eq!(meta.component_type, "reactor");
        assert_eq!(meta.version, "2.1.0");
        assert_eq!(meta.tags, vec!["notes"]);
        assert_eq!(meta.interface["notes.search"]["requires"], json!(["query"]));
    }

    #[test]
    fn test_register_rejects_empty_id() {
        let registry = Registry::new();
        let err = registry
            .register("  ", Arc::new(Bare), MetadataPatch::new())
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = Registry::new();
        registry
            .register("notes", Arc::new(Notes), MetadataPatch::new().health(HealthStatus::Healthy))
            .unwrap();
        assert!(registry.descriptor("notes.search").is_some());

        registry.unregister(&id("notes"));
        registry.unregister(&id("notes"));
        assert!(registry.get_metadata(&id("notes")).is_none());
        assert!(registry.descriptor("notes.search").is_none());
        assert_eq!(registry.health_cache().get(&id("notes")), HealthStatus::Unknown);
    }

    #[test]
    fn test_reregister_overwrites_and_reindexes() {
        let registry = Registry::new();
        registry
            .register("x", Arc::new(Notes), MetadataPatch::new())
            .unwrap();
        registry
            .register("x", Arc::new(Bare), MetadataPatch::new())
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.descriptor("notes.search").is_none());
        assert_eq!(registry.owner_of("bare.run"), Some(id("x")));
    }

    #[test]
    fn test_update_metadata() {
        let registry = Registry::new();
        let err = registry
            .update_metadata(&id("ghost"), MetadataPatch::new().version("9"))
            .unwrap_err();
        assert_eq!(err.code(), "component_not_registered");

        registry
            .register("bare", Arc::new(Bare), MetadataPatch::new())
            .unwrap();
        registry
            .update_metadata(
                &id("bare"),
                MetadataPatch::new().tags(["fast"]).health(HealthStatus::Degraded),
            )
            .unwrap();
        let meta = registry.get_metadata(&id("bare")).unwrap();
        assert_eq!(meta.tags, vec!["fast"]);
        assert_eq!(meta.version, "1.0.0");
        assert_eq!(meta.health, HealthStatus::Degraded);
    }

    #[test]
    fn test_text_discovery() {
        let registry = Registry::new();
        registry
            .register("notes", Arc::new(Notes), MetadataPatch::new())
            .unwrap();
        registry
            .register("bare", Arc::new(Bare), MetadataPatch::new())
            .unwrap();

        let hits = registry.discover("KEYWORD search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].component_id, id("notes"));
        assert_eq!(hits[0].score, 1.0);

        let hits = registry.discover("run keyword");
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);

        assert!(registry.discover("").is_empty());
        assert!(registry.discover("teleport").is_empty());
    }

    #[test]
    fn test_structured_discovery_empty_pattern_returns_all() {
        let registry = Registry::new();
        registry
            .register("notes", Arc::new(Notes), MetadataPatch::new())
            .unwrap();
        registry
            .register("bare", Arc::new(Bare), MetadataPatch::new())
            .unwrap();
        assert_eq!(registry.discover(DiscoveryQuery::any()).len(), 2);
        assert_eq!(
            registry
                .discover(DiscoveryQuery::any().component_type("reactor"))
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_execute_paths() {
        let registry = Registry::new();
        registry
            .register("notes", Arc::new(Notes), MetadataPatch::new())
            .unwrap();
        let ctx = ExecutionContext::new();

        let out = registry
            .execute("notes.search", json!({"query": "rust"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out["echo"]["query"], "rust");

        let err = registry
            .execute("notes.fail", Value::Null, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "execution_failed");

        let err = registry
            .execute("notes.missing", Value::Null, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "capability_not_found");
    }

    #[test]
    fn test_same_id_register_unregister_race_keeps_index_consistent() {
        use std::sync::Barrier;

        let registry = Registry::new();
        for _ in 0..2000 {
            registry
                .register("bare", Arc::new(Bare), MetadataPatch::new())
                .unwrap();
            let barrier = Barrier::new(2);
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    registry.unregister(&id("bare"));
                });
                scope.spawn(|| {
                    barrier.wait();
                    registry
                        .register(
                            "bare",
                            Arc::new(Bare),
                            MetadataPatch::new().health(HealthStatus::Healthy),
                        )
                        .unwrap();
                });
            });
            let registered = registry.get_metadata(&id("bare")).is_some();
            assert_eq!(registered, registry.descriptor("bare.run").is_some());
            assert_eq!(registered, registry.health_cache().len() == 1);
            registry.unregister(&id("bare"));
        }
        assert!(registry.writes.is_empty());
    }

    #[test]
    fn test_update_metadata_race_leaves_no_orphan_health() {
        use std::sync::Barrier;

        let registry = Registry::new();
        for _ in 0..2000 {
            registry
                .register("bare", Arc::new(Bare), MetadataPatch::new())
                .unwrap();
            let barrier = Barrier::new(2);
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    registry.unregister(&id("bare"));
                });
                scope.spawn(|| {
                    barrier.wait();
                    let _ = registry.update_metadata(
                        &id("bare"),
                        MetadataPatch::new().health(HealthStatus::Degraded),
                    );
                });
            });
            assert!(registry.get_metadata(&id("bare")).is_none());
            assert!(registry.health_cache().is_empty());
        }
    }

    #[test]
    fn test_record_health_ignores_unregistered() {
        let registry = Registry::new();
        assert!(!registry.record_health(&id("ghost"), HealthStatus::Healthy));
        assert!(registry.health_cache().is_empty());

        registry
            .register("bare", Arc::new(Bare), MetadataPatch::new())
            .unwrap();
        assert!(registry.record_health(&id("bare"), HealthStatus::Degraded));
        assert_eq!(
            registry.get_metadata(&id("bare")).unwrap().health,
            HealthStatus::Degraded
        );
    }
}
