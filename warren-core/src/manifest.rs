//! Declarative components loaded from YAML
//!
//! ```yaml
//! components:
//!   - id: notes
//!     type: reactor
//!     capabilities: ["read:/notes", "write:/notes"]
//!     tags: [notes]
//!     health: healthy
//!     descriptors:
//!       - id: notes.search
//!         intent: Search notes by keyword
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use warren_types::HealthStatus;

use crate::error::WarrenError;
use crate::provider::{
    CapabilityDescriptor, CapabilityProvider, ExecutionContext, ProviderError, ProviderProfile,
};
use crate::registry::{MetadataPatch, Registry};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Failed to register {id}: {source}")]
    RegisterError { id: String, source: WarrenError },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub components: Vec<ComponentManifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentManifest {
    pub id: String,
    #[serde(default, rename = "type")]
    pub component_type: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Reported by the health hook; no hook when absent
    #[serde(default)]
    pub health: Option<HealthStatus>,
    #[serde(default)]
    pub descriptors: Vec<CapabilityDescriptor>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ManifestError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Register every component; returns how many were registered
    pub fn load_into(&self, registry: &Registry) -> Result<usize, ManifestError> {
        for component in &self.components {
            let mut patch = MetadataPatch::new();
            patch.health = component.health;
            registry
                .register(
                    component.id.as_str(),
                    Arc::new(ManifestProvider::new(component.clone())),
                    patch,
                )
                .map_err(|source| ManifestError::RegisterError {
                    id: component.id.clone(),
                    source,
                })?;
        }
        Ok(self.components.len())
    }
}

/// Provider backed by a manifest entry
///
/// `execute` echoes the payload tagged with the capability id.
pub struct ManifestProvider {
    manifest: ComponentManifest,
}

impl ManifestProvider {
    pub fn new(manifest: ComponentManifest) -> Self {
        Self { manifest }
    }
}

#[async_trait]
impl CapabilityProvider for ManifestProvider {
    fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.manifest.descriptors.clone()
    }

    async fn execute(
        &self,
        capability_id: &str,
        payload: Value,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ProviderError> {
        Ok(json!({
            "component": self.manifest.id,
            "capability": capability_id,
            "payload": payload,
        }))
    }

    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            component_type: self.manifest.component_type.clone(),
            version: self.manifest.version.clone(),
            capabilities: self.manifest.capabilities.clone(),
            dependencies: Some(self.manifest.dependencies.clone()),
            tags: Some(self.manifest.tags.clone()),
            description: self.manifest.description.clone(),
        }
    }

    async fn health_check(&self) -> Option<HealthStatus> {
        self.manifest.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_types::ComponentId;

    const MANIFEST: &str = r#"
components:
  - id: notes
    type: reactor
    version: 2.0.0
    capabilities: ["read:/notes", "write:/notes"]
    tags: [notes, fast]
    description: Personal note store
    health: healthy
    descriptors:
      - id: notes.search
        intent: Search notes by keyword
        requires: [query]
  - id: scratch
"#;

    #[test]
    fn test_load_into_registry() {
        let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();
        let registry = Registry::new();
        assert_eq!(manifest.load_into(&registry).unwrap(), 2);

        let notes = registry.get_metadata(&ComponentId::from("notes")).unwrap();
        assert_eq!(notes.component_type, "reactor");
        assert_eq!(notes.version, "2.0.0");
        assert_eq!(notes.capabilities, vec!["read:/notes", "write:/notes"]);
        assert_eq!(notes.health, HealthStatus::Healthy);

        let scratch = registry.get_metadata(&ComponentId::from("scratch")).unwrap();
        assert_eq!(scratch.component_type, "generic");
        assert!(scratch.capabilities.is_empty());
        assert_eq!(registry.owner_of("notes.search"), Some(ComponentId::from("notes")));
    }

    #[tokio::test]
    async fn test_execute_echoes() {
        let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();
        let registry = Registry::new();
        manifest.load_into(&registry).unwrap();
        let out = registry
            .execute("notes.search", json!({"query": "x"}), &ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(out["component"], "notes");
        assert_eq!(out["capability"], "notes.search");
        assert_eq!(out["payload"]["query"], "x");
    }

    #[test]
    fn test_invalid_manifest() {
        assert!(matches!(
            Manifest::from_yaml_str("components: [{type: x}]"),
            Err(ManifestError::ParseError(_))
        ));
    }
}
