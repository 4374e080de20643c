//! Warren - capability-aware component registry and actor engine
//!
//! This crate is the in-process core that surrounding services call into:
//! it keeps a directory of capability providers, answers discovery queries
//! over it, picks among matches with a load-balancing strategy, and runs
//! supervised stateful actors on top of the same providers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Engine                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────────┐        ┌───────────────────────────┐   │
//! │  │     Registry     │◄───────│   Discovery + Balancer    │   │
//! │  │ components (map) │ query  │ scoring, strategies       │   │
//! │  │ descriptor index │        └─────────────┬─────────────┘   │
//! │  └───────┬──────────┘                      │ health          │
//! │          │ provider_for         ┌──────────▼──────────┐      │
//! │          │                      │     HealthCache     │      │
//! │          ▼                      └─────────────────────┘      │
//! │  ┌─────────────────────────────────────────────────────┐     │
//! │  │                     Supervisor                      │     │
//! │  │  ┌─────────────┐  ┌─────────────┐                   │     │
//! │  │  │ ActorProcess│  │ ActorProcess│  ...              │     │
//! │  │  │ state + mbox│  │ state + mbox│                   │     │
//! │  │  └─────────────┘  └─────────────┘                   │     │
//! │  └──────────────────────────┬──────────────────────────┘     │
//! │                             │ flush / restore                │
//! │                     ┌───────▼───────┐                        │
//! │                     │  Persistence  │                        │
//! │                     └───────────────┘                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! ## Capabilities
//!
//! A **capability** is a value like `read:/docs` or `admin`. The algebra in
//! [`capability`] decides implication (`admin` implies everything on its
//! resource, `write` implies `read`) and never fails: bad input denies.
//!
//! ## Providers and components
//!
//! A [`CapabilityProvider`] publishes descriptors and executes them. It is
//! registered as a **component** whose metadata (type, version, tags,
//! capability tags) drives discovery.
//!
//! ## Actors
//!
//! An **actor** is a long-lived, single-threaded instance of one capability
//! for one actor id (for example one conversation). It keeps state between
//! messages, ends itself after an idle timeout, and is restarted by the
//! [`Supervisor`] if its handler crashes.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use warren_core::{Engine, EngineConfig, MetadataPatch};
//! use warren_core::manifest::{ComponentManifest, ManifestProvider};
//!
//! let engine = Engine::new(EngineConfig::default());
//! let manifest: ComponentManifest = serde_yaml::from_str("id: notes\ntype: reactor").unwrap();
//! engine
//!     .register("notes", Arc::new(ManifestProvider::new(manifest)), MetadataPatch::new())
//!     .unwrap();
//!
//! let hits = engine.discover(warren_core::DiscoveryQuery::any().component_type("reactor"));
//! assert_eq!(hits.len(), 1);
//! ```

pub mod actor;
pub mod capability;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod health;
pub mod manifest;
pub mod persistence;
pub mod provider;
pub mod registry;
pub mod supervisor;

pub use actor::{ActorMetadata, ActorOptions, ActorRef, ActorSnapshot, ActorStatus, ExitReason};
pub use capability::{Capability, CapabilitySet, ImplicationRules};
pub use config::{ConfigError, EngineConfig};
pub use discovery::{Discovery, DiscoveryQuery, DiscoveryRequest, Match, Matcher, Strategy};
pub use engine::Engine;
pub use error::{NotFoundKind, Result, WarrenError};
pub use health::HealthCache;
pub use persistence::{FileBackend, InMemoryBackend, Persistence, PersistenceBackend};
pub use provider::{
    CapabilityDescriptor, CapabilityProvider, ExecutionContext, ProviderError, ProviderProfile,
    State,
};
pub use registry::{ComponentMetadata, MetadataPatch, Registry};
pub use supervisor::{ActorInfo, ProbeStatus, Supervisor, SupervisorStats};

pub use warren_types::{ActorId, ActorKey, ComponentId, HealthStatus, PersistenceStrategy};
