//! JSON shapes printed by `--json` commands

use serde::Serialize;
use warren_core::{ComponentMetadata, Match};

pub const SCHEMA_VERSION: &str = "warren-cli-v1";

/// Standard envelope for machine-consumable responses.
#[derive(Serialize)]
pub struct Envelope<T> {
    pub schema_version: &'static str,
    pub kind: &'static str,
    pub data: T,
}

pub fn envelope<T>(kind: &'static str, data: T) -> Envelope<T> {
    Envelope {
        schema_version: SCHEMA_VERSION,
        kind,
        data,
    }
}

#[derive(Serialize)]
pub struct ComponentSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub version: String,
    pub health: String,
    pub capabilities: Vec<String>,
    pub tags: Vec<String>,
}

impl From<&ComponentMetadata> for ComponentSummary {
    fn from(meta: &ComponentMetadata) -> Self {
        Self {
            id: meta.id.to_string(),
            component_type: meta.component_type.clone(),
            version: meta.version.clone(),
            health: meta.health.to_string(),
            capabilities: meta.capabilities.clone(),
            tags: meta.tags.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct ScoredComponent {
    #[serde(flatten)]
    pub component: ComponentSummary,
    pub score: f64,
}

impl From<&Match> for ScoredComponent {
    fn from(m: &Match) -> Self {
        Self {
            component: ComponentSummary::from(&m.metadata),
            score: m.score,
        }
    }
}

#[derive(Serialize)]
pub struct CheckData {
    pub allowed: bool,
    pub required: Vec<String>,
    pub held: Vec<String>,
    pub missing: Vec<String>,
}

/// One text line per component
pub fn component_line(meta: &ComponentMetadata) -> String {
    let mut line = format!(
        "{} ({} {}) [{}]",
        meta.id, meta.component_type, meta.version, meta.health
    );
    if !meta.capabilities.is_empty() {
        line.push_str(&format!(" caps: {}", meta.capabilities.join(", ")));
    }
    if !meta.tags.is_empty() {
        line.push_str(&format!(" tags: {}", meta.tags.join(", ")));
    }
    line
}
