//! Capability algebra
//!
//! Capabilities are plain values: an operation name plus an optional list
//! of parameters naming the resource it applies to (`read:/docs`,
//! `admin`). Nothing here ever fails. Malformed input evaluates to
//! `false` or an empty set so authorization checks deny by default.

mod grants;
mod rules;

pub use grants::{
    authorize, authorize_temporal, delegate, revoke, temporal_valid, DelegationRecord,
    RevocationRecord, TemporalCapability,
};
pub use rules::{implies, validate, validate_all, ImplicationRules};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A set of capabilities; duplicates collapse
pub type CapabilitySet = BTreeSet<Capability>;

/// An operation name plus the resource parameters it is scoped to
///
/// Equality is structural: two capabilities are equal iff both the name
/// and the parameter list match exactly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Capability {
    pub name: String,
    pub params: Vec<String>,
}

impl Capability {
    /// An unscoped capability
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Parse the `name[:param...]` tag form
    ///
    /// Never fails. Text that does not look like a tag (empty name or empty
    /// segment) becomes a capability named by the raw text with no params,
    /// which implies nothing but itself.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let mut parts = raw.split(':');
        let name = parts.next().unwrap_or_default();
        let params: Vec<String> = parts.map(str::to_string).collect();

        if name.is_empty() || params.iter().any(|p| p.is_empty()) {
            return Self::new(raw);
        }
        Self {
            name: name.to_string(),
            params,
        }
    }

    pub fn is_scoped(&self) -> bool {
        !self.params.is_empty()
    }

    /// Whether `other` targets a resource this capability covers
    ///
    /// An unscoped capability covers every resource.
    pub fn covers_resource_of(&self, other: &Capability) -> bool {
        self.params.is_empty() || self.params == other.params
    }

    /// A different operation on the same resource
    pub fn renamed(&self, name: impl Into<String>) -> Capability {
        Capability {
            name: name.into(),
            params: self.params.clone(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for param in &self.params {
            write!(f, ":{}", param)?;
        }
        Ok(())
    }
}

impl FromStr for Capability {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Capability::parse(s))
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        Capability::parse(s)
    }
}

impl From<String> for Capability {
    fn from(s: String) -> Self {
        Capability::parse(&s)
    }
}

impl From<Capability> for String {
    fn from(cap: Capability) -> Self {
        cap.to_string()
    }
}

/// Deduplicating union
pub fn compose<I>(caps: I) -> CapabilitySet
where
    I: IntoIterator<Item = Capability>,
{
    caps.into_iter().collect()
}

/// Parse a list of tags
pub fn parse_all<I, S>(tags: I) -> Vec<Capability>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter().map(|t| Capability::parse(t.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let cap = Capability::parse("read:/docs");
        assert_eq!(cap.name, "read");
        assert_eq!(cap.params, vec!["/docs".to_string()]);
        assert_eq!(cap.to_string(), "read:/docs");

        let cap = Capability::parse("admin");
        assert!(!cap.is_scoped());
        assert_eq!(cap.to_string(), "admin");

        let cap = Capability::parse("grant:alice:/db");
        assert_eq!(cap.params.len(), 2);
    }

    #[test]
    fn test_malformed_tag_keeps_raw_name() {
        let cap = Capability::parse(":oops");
        assert_eq!(cap.name, ":oops");
        assert!(cap.params.is_empty());

        let cap = Capability::parse("read::x");
        assert_eq!(cap.name, "read::x");
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(Capability::parse("read:/a"), Capability::new("read").with_param("/a"));
        assert_ne!(Capability::parse("read:/a"), Capability::parse("read:/b"));
        assert_ne!(Capability::parse("read"), Capability::parse("read:/a"));
    }

    #[test]
    fn test_compose_collapses_duplicates() {
        let set = compose(vec![
            Capability::parse("read:/a"),
            Capability::parse("read:/a"),
            Capability::parse("write:/a"),
        ]);
        assert_eq!(set.len(), 2);
        assert!(compose(Vec::new()).is_empty());
    }

    #[test]
    fn test_serde_uses_tag_form() {
        let cap = Capability::parse("write:/notes");
        let json = serde_json::to_string(&cap).unwrap();
        assert_eq!(json, "\"write:/notes\"");
        let back: Capability = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cap);
    }
}
