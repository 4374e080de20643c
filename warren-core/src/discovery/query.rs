//! Discovery patterns

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use warren_types::HealthStatus;

use crate::capability::Capability;

const WILDCARD: &str = "any";

/// A single pattern field: the wildcard `any`, or a concrete value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Matcher<T> {
    #[default]
    Any,
    Is(T),
}

impl<T> Matcher<T> {
    pub fn is_any(&self) -> bool {
        matches!(self, Matcher::Any)
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Matcher::Any => None,
            Matcher::Is(value) => Some(value),
        }
    }

    /// Wildcards always pass; concrete values go through `check`
    pub fn accepts(&self, check: impl FnOnce(&T) -> bool) -> bool {
        self.as_option().map_or(true, check)
    }
}

impl<T> From<Option<T>> for Matcher<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Matcher::Any, Matcher::Is)
    }
}

impl<T: Serialize> Serialize for Matcher<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Matcher::Any => serializer.serialize_str(WILDCARD),
            Matcher::Is(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Matcher<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        match &raw {
            Value::Null => Ok(Matcher::Any),
            Value::String(s) if s == WILDCARD => Ok(Matcher::Any),
            _ => serde_json::from_value(raw)
                .map(Matcher::Is)
                .map_err(D::Error::custom),
        }
    }
}

/// Structured discovery pattern
///
/// Every field defaults to the wildcard, so `{}` matches every component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryQuery {
    /// Substring of the component id
    pub name: Matcher<String>,
    #[serde(rename = "type")]
    pub component_type: Matcher<String>,
    /// Each must be implied by some capability the component provides
    pub capabilities: Matcher<Vec<Capability>>,
    pub version: Matcher<String>,
    pub health: Matcher<HealthStatus>,
    /// Each must be present on the component
    pub tags: Matcher<Vec<String>>,
}

impl DiscoveryQuery {
    /// The all-wildcard pattern
    pub fn any() -> Self {
        Self::default()
    }

    pub fn name(mut self, fragment: impl Into<String>) -> Self {
        self.name = Matcher::Is(fragment.into());
        self
    }

    pub fn component_type(mut self, component_type: impl Into<String>) -> Self {
        self.component_type = Matcher::Is(component_type.into());
        self
    }

    pub fn capabilities<I>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = Capability>,
    {
        self.capabilities = Matcher::Is(caps.into_iter().collect());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Matcher::Is(version.into());
        self
    }

    pub fn health(mut self, health: HealthStatus) -> Self {
        self.health = Matcher::Is(health);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Matcher::Is(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Canonical form used to key per-pattern balancer state
    pub fn cursor_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// What `Registry::discover` accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiscoveryRequest {
    /// Free text matched word by word against descriptions and intents
    Text(String),
    Structured(DiscoveryQuery),
}

impl From<&str> for DiscoveryRequest {
    fn from(text: &str) -> Self {
        DiscoveryRequest::Text(text.to_string())
    }
}

impl From<String> for DiscoveryRequest {
    fn from(text: String) -> Self {
        DiscoveryRequest::Text(text)
    }
}

impl From<DiscoveryQuery> for DiscoveryRequest {
    fn from(query: DiscoveryQuery) -> Self {
        DiscoveryRequest::Structured(query)
    }
}
