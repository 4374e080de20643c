//! Command implementations

pub mod best;
pub mod check;
pub mod discover;
pub mod exec;
pub mod list;

pub use best::best_component;
pub use check::check_capabilities;
pub use discover::discover_components;
pub use exec::exec_capability;
pub use list::list_components;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;
use warren_core::manifest::Manifest;
use warren_core::{Engine, EngineConfig};

/// Where the engine config and component manifest come from
#[derive(Debug, Clone)]
pub struct Sources {
    pub config: Option<PathBuf>,
    pub manifest: PathBuf,
}

/// Build an engine, register the manifest and take one health snapshot
pub async fn load_engine(sources: &Sources) -> Result<Engine> {
    let config = match &sources.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(config);

    let manifest = Manifest::from_file(&sources.manifest)
        .with_context(|| format!("Failed to load manifest {}", sources.manifest.display()))?;
    let count = manifest
        .load_into(engine.registry())
        .context("Failed to register manifest components")?;
    debug!(count, manifest = %sources.manifest.display(), "registered components");

    engine.refresh_health().await;
    Ok(engine)
}
