//! Actor state persistence
//!
//! Durable actors hand their state to a backend when they terminate and
//! read it back when they are next spawned. The backends themselves are
//! byte stores keyed by actor id; `Persistence` owns the JSON encoding and
//! picks the backend for each strategy.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use warren_types::{ActorId, ActorKey, PersistenceStrategy};

use crate::actor::ActorMetadata;
use crate::config::EngineConfig;
use crate::provider::State;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode actor state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn store(&self, actor_id: &ActorId, bytes: Vec<u8>) -> Result<(), PersistenceError>;

    async fn retrieve(&self, actor_id: &ActorId) -> Result<Option<Vec<u8>>, PersistenceError>;
}

/// Process-local backend
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: DashMap<ActorId, Vec<u8>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn store(&self, actor_id: &ActorId, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        self.entries.insert(actor_id.clone(), bytes);
        Ok(())
    }

    async fn retrieve(&self, actor_id: &ActorId) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.entries.get(actor_id).map(|bytes| bytes.clone()))
    }
}

/// One file per actor under a directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, actor_id: &ActorId) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_stem(actor_id.as_str())))
    }
}

/// Escape everything outside `[A-Za-z0-9_-]` so distinct ids never share a file
fn encode_file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02x}", byte));
        }
    }
    out
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn store(&self, actor_id: &ActorId, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(actor_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn retrieve(&self, actor_id: &ActorId) -> Result<Option<Vec<u8>>, PersistenceError> {
        match tokio::fs::read(self.path_for(actor_id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// What gets written for a terminated actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedActor {
    pub capability_id: String,
    pub state: State,
    pub metadata: ActorMetadata,
}

/// Strategy-to-backend routing
#[derive(Clone, Default)]
pub struct Persistence {
    disk: Option<Arc<dyn PersistenceBackend>>,
    distributed: Option<Arc<dyn PersistenceBackend>>,
}

impl Persistence {
    /// No backends: durable strategies log and keep nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Disk backend from `persistence.disk_dir`, if set; the distributed
    /// slot is process-local
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut persistence = Self::new().with_distributed(Arc::new(InMemoryBackend::new()));
        if let Some(dir) = &config.persistence.disk_dir {
            persistence.disk = Some(Arc::new(FileBackend::new(dir.clone())));
        }
        persistence
    }

    pub fn with_disk(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.disk = Some(backend);
        self
    }

    pub fn with_distributed(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.distributed = Some(backend);
        self
    }

    pub fn backend_for(&self, strategy: PersistenceStrategy) -> Option<&Arc<dyn PersistenceBackend>> {
        match strategy {
            PersistenceStrategy::Memory => None,
            PersistenceStrategy::Disk => self.disk.as_ref(),
            PersistenceStrategy::Distributed => self.distributed.as_ref(),
        }
    }

    /// Hand a terminated actor's state to its backend
    ///
    /// Failures are logged and swallowed; termination always completes.
    pub async fn flush(&self, key: &ActorKey, strategy: PersistenceStrategy, record: &PersistedActor) {
        if !strategy.is_durable() {
            return;
        }
        let Some(backend) = self.backend_for(strategy) else {
            warn!(actor = %key, ?strategy, "no persistence backend configured, state dropped");
            return;
        };
        let result = match serde_json::to_vec(record) {
            Ok(bytes) => backend.store(&key.actor_id, bytes).await,
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(()) => debug!(actor = %key, ?strategy, "persisted actor state"),
            Err(err) => warn!(actor = %key, ?strategy, error = %err, "failed to persist actor state"),
        }
    }

    /// Previously flushed state for `key`, if any
    pub async fn restore(&self, key: &ActorKey, strategy: PersistenceStrategy) -> Option<PersistedActor> {
        let backend = self.backend_for(strategy)?;
        let bytes = match backend.retrieve(&key.actor_id).await {
            Ok(bytes) => bytes?,
            Err(err) => {
                warn!(actor = %key, error = %err, "failed to read persisted actor state");
                return None;
            }
        };
        let record: PersistedActor = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(err) => {
                warn!(actor = %key, error = %err, "discarding unreadable actor state");
                return None;
            }
        };
        if record.capability_id != key.capability_id {
            debug!(
                actor = %key,
                stored = %record.capability_id,
                "ignoring state persisted for another capability"
            );
            return None;
        }
        Some(record)
    }
}
