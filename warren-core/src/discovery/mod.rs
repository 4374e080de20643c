//! Discovery and load balancing
//!
//! `Discovery` answers structured patterns against the registry, keeps
//! the health cache fresh, and picks one match per request according to a
//! [`Strategy`].

mod balancer;
mod query;
pub mod scoring;

pub use balancer::{Balancer, Strategy};
pub use query::{DiscoveryQuery, DiscoveryRequest, Matcher};
pub use scoring::Match;

use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use warren_types::{ComponentId, HealthStatus};

use crate::capability::Capability;
use crate::config::EngineConfig;
use crate::registry::Registry;

/// Source of active-session counts for `least_connections`
pub trait ConnectionCounter: Send + Sync {
    fn active_sessions(&self, component: &ComponentId) -> usize;
}

pub struct Discovery {
    registry: Arc<Registry>,
    balancer: Balancer,
    connections: Option<Arc<dyn ConnectionCounter>>,
    probe_timeout: Duration,
}

impl Discovery {
    pub fn new(registry: Arc<Registry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            balancer: Balancer::new(),
            connections: None,
            probe_timeout: config.probe_timeout(),
        }
    }

    /// Count sessions with `counter` when balancing by connections
    pub fn with_connections(mut self, counter: Arc<dyn ConnectionCounter>) -> Self {
        self.connections = Some(counter);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// All matches for `pattern`, best first
    pub fn find(&self, pattern: &DiscoveryQuery) -> Vec<Match> {
        self.registry.discover(pattern.clone())
    }

    pub fn find_by_capabilities<I>(&self, caps: I) -> Vec<Match>
    where
        I: IntoIterator<Item = Capability>,
    {
        self.find(&DiscoveryQuery::any().capabilities(caps))
    }

    pub fn find_by_type(&self, component_type: &str) -> Vec<Match> {
        self.find(&DiscoveryQuery::any().component_type(component_type))
    }

    /// Components whose cached health is exactly `healthy`
    pub fn find_healthy(&self) -> Vec<Match> {
        self.find(&DiscoveryQuery::any().health(HealthStatus::Healthy))
    }

    /// One match for `pattern` chosen by `strategy`
    pub fn get_best_match(&self, pattern: &DiscoveryQuery, strategy: Strategy) -> Option<Match> {
        let matches = self.find(pattern);
        let key = pattern.cursor_key();
        let selected = self
            .balancer
            .select(&key, matches, strategy, |m| match &self.connections {
                Some(counter) => counter.active_sessions(&m.component_id),
                None => 0,
            });
        if let Some(m) = &selected {
            debug!(component = %m.component_id, %strategy, score = m.score, "selected match");
        }
        selected
    }

    /// Cached health; `unknown` for anything unregistered or never probed
    pub fn get_health(&self, id: &ComponentId) -> HealthStatus {
        self.registry.health_cache().get(id)
    }

    /// Record health pushed by an outside observer
    pub fn set_health(&self, id: &ComponentId, status: HealthStatus) {
        self.registry.record_health(id, status);
    }

    /// Probe every registered component concurrently
    ///
    /// Providers without a health hook are recorded as `unknown`. A probe
    /// that panics or exceeds the probe timeout degrades the component to
    /// `unhealthy`; it is never removed.
    pub async fn refresh_health_cache(&self) {
        let probe_timeout = self.probe_timeout;
        let probes = self.registry.providers().into_iter().map(|(id, provider)| {
            let probe = tokio::spawn(async move {
                AssertUnwindSafe(provider.health_check())
                    .catch_unwind()
                    .await
            });
            async move {
                let status = match tokio::time::timeout(probe_timeout, probe).await {
                    Ok(Ok(Ok(Some(status)))) => status,
                    Ok(Ok(Ok(None))) => HealthStatus::Unknown,
                    Ok(Ok(Err(_))) | Ok(Err(_)) => {
                        warn!(component = %id, "health probe panicked");
                        HealthStatus::Unhealthy
                    }
                    Err(_) => {
                        warn!(component = %id, after = ?probe_timeout, "health probe timed out");
                        HealthStatus::Unhealthy
                    }
                };
                (id, status)
            }
        });

        // components unregistered while their probe ran are skipped
        for (id, status) in join_all(probes).await {
            self.registry.record_health(&id, status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CapabilityDescriptor, CapabilityProvider, ExecutionContext, ProviderError};
    use crate::registry::MetadataPatch;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Probe {
        answer: Option<HealthStatus>,
        delay: Duration,
        panic: bool,
    }

    #[async_trait]
    impl CapabilityProvider for Probe {
        fn descriptors(&self) -> Vec<CapabilityDescriptor> {
            Vec::new()
        }

        async fn execute(
            &self,
            _capability_id: &str,
            _payload: Value,
            _ctx: &ExecutionContext,
        ) -> Result<Value, ProviderError> {
            Ok(Value::Null)
        }

        async fn health_check(&self) -> Option<HealthStatus> {
            tokio::time::sleep(self.delay).await;
            if self.panic {
                panic!("probe exploded");
            }
            self.answer
        }
    }

    fn probe(answer: Option<HealthStatus>) -> Arc<Probe> {
        Arc::new(Probe {
            answer,
            delay: Duration::ZERO,
            panic: false,
        })
    }

    fn setup() -> (Arc<Registry>, Discovery) {
        let registry = Arc::new(Registry::new());
        let discovery = Discovery::new(registry.clone(), &EngineConfig::default());
        (registry, discovery)
    }

    #[tokio::test]
    async fn test_refresh_records_probe_results() {
        let (registry, discovery) = setup();
        registry
            .register("up", probe(Some(HealthStatus::Healthy)), MetadataPatch::new())
            .unwrap();
        registry
            .register("silent", probe(None), MetadataPatch::new())
            .unwrap();
        registry
            .register(
                "boom",
                Arc::new(Probe {
                    answer: None,
                    delay: Duration::ZERO,
                    panic: true,
                }),
                MetadataPatch::new(),
            )
            .unwrap();

        discovery.refresh_health_cache().await;

        assert_eq!(discovery.get_health(&"up".into()), HealthStatus::Healthy);
        assert_eq!(discovery.get_health(&"silent".into()), HealthStatus::Unknown);
        assert_eq!(discovery.get_health(&"boom".into()), HealthStatus::Unhealthy);
        assert!(registry.contains(&"boom".into()));
        assert_eq!(discovery.get_health(&"never".into()), HealthStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_marked_unhealthy() {
        let (registry, discovery) = setup();
        registry
            .register(
                "slow",
                Arc::new(Probe {
                    answer: Some(HealthStatus::Healthy),
                    delay: Duration::from_secs(5),
                    panic: false,
                }),
                MetadataPatch::new(),
            )
            .unwrap();

        discovery.refresh_health_cache().await;
        assert_eq!(discovery.get_health(&"slow".into()), HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_find_healthy_excludes_unhealthy() {
        let (registry, discovery) = setup();
        registry
            .register("a", probe(None), MetadataPatch::new().health(HealthStatus::Healthy))
            .unwrap();
        registry
            .register("b", probe(None), MetadataPatch::new().health(HealthStatus::Unhealthy))
            .unwrap();
        let ids: Vec<String> = discovery
            .find_healthy()
            .into_iter()
            .map(|m| m.component_id.0)
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_set_health_ignores_unknown_ids() {
        let (registry, discovery) = setup();
        registry
            .register("a", probe(None), MetadataPatch::new())
            .unwrap();
        discovery.set_health(&"a".into(), HealthStatus::Degraded);
        discovery.set_health(&"ghost".into(), HealthStatus::Healthy);
        assert_eq!(discovery.get_health(&"a".into()), HealthStatus::Degraded);
        assert_eq!(registry.health_cache().len(), 1);
    }

    struct FixedLoad;

    impl ConnectionCounter for FixedLoad {
        fn active_sessions(&self, component: &ComponentId) -> usize {
            if component.as_str() == "busy" {
                10
            } else {
                0
            }
        }
    }

    #[tokio::test]
    async fn test_best_match_least_connections() {
        let registry = Arc::new(Registry::new());
        let discovery = Discovery::new(registry.clone(), &EngineConfig::default())
            .with_connections(Arc::new(FixedLoad));
        registry
            .register("busy", probe(None), MetadataPatch::new().health(HealthStatus::Healthy))
            .unwrap();
        registry
            .register("idle", probe(None), MetadataPatch::new().health(HealthStatus::Degraded))
            .unwrap();

        let pick = discovery
            .get_best_match(&DiscoveryQuery::any(), Strategy::LeastConnections)
            .unwrap();
        assert_eq!(pick.component_id.as_str(), "idle");

        assert!(discovery
            .get_best_match(&DiscoveryQuery::any().name("nothing"), Strategy::Random)
            .is_none());
    }
}
