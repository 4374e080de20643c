//! Implication rule tables

use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};

use super::{Capability, CapabilitySet};

static BUILTIN: Lazy<ImplicationRules> = Lazy::new(ImplicationRules::builtin);

/// A directed `operation -> implied operations` relation
///
/// Rules relate operation names only. An implication holds when the
/// stronger capability also covers the weaker one's resource. Operations
/// listed as universal imply every operation on their resource.
///
/// Implication is not transitive here. Use [`ImplicationRules::closure`]
/// when the full reachable set is needed.
#[derive(Debug, Clone, Default)]
pub struct ImplicationRules {
    implied: HashMap<String, BTreeSet<String>>,
    universal: BTreeSet<String>,
}

impl ImplicationRules {
    /// No rules at all: only equal capabilities imply each other
    pub fn empty() -> Self {
        Self::default()
    }

    /// `admin` implies everything, `write` implies `read`, `delete`
    /// implies `read` and `write`
    pub fn builtin() -> Self {
        Self::empty()
            .with_universal("admin")
            .with_rule("write", ["read"])
            .with_rule("delete", ["read", "write"])
    }

    pub fn with_rule<I, S>(mut self, operation: impl Into<String>, implied: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implied
            .entry(operation.into())
            .or_default()
            .extend(implied.into_iter().map(Into::into));
        self
    }

    pub fn with_universal(mut self, operation: impl Into<String>) -> Self {
        self.universal.insert(operation.into());
        self
    }

    /// Whether holding `a` is sufficient for `b`
    pub fn implies(&self, a: &Capability, b: &Capability) -> bool {
        if a == b {
            return true;
        }
        if !a.covers_resource_of(b) {
            return false;
        }
        if a.name == b.name || self.universal.contains(&a.name) {
            return true;
        }
        self.implied
            .get(&a.name)
            .map_or(false, |weaker| weaker.contains(&b.name))
    }

    /// True iff some capability in `available` implies `required`
    pub fn validate<'a, I>(&self, required: &Capability, available: I) -> bool
    where
        I: IntoIterator<Item = &'a Capability>,
    {
        available.into_iter().any(|cap| self.implies(cap, required))
    }

    /// Conjunction of [`validate`](Self::validate) over `required`
    pub fn validate_all(&self, required: &[Capability], available: &CapabilitySet) -> bool {
        self.missing(required, available).is_empty()
    }

    /// The required capabilities nothing in `available` implies
    pub fn missing(&self, required: &[Capability], available: &CapabilitySet) -> Vec<Capability> {
        required
            .iter()
            .filter(|req| !self.validate(req, available))
            .cloned()
            .collect()
    }

    /// Everything reachable from `caps` by repeated rule application
    ///
    /// Universal operations cannot be enumerated and contribute only
    /// themselves.
    pub fn closure(&self, caps: &CapabilitySet) -> CapabilitySet {
        let mut closed = caps.clone();
        let mut frontier: Vec<Capability> = caps.iter().cloned().collect();

        while let Some(cap) = frontier.pop() {
            let Some(weaker) = self.implied.get(&cap.name) else {
                continue;
            };
            for name in weaker {
                let derived = cap.renamed(name.as_str());
                if closed.insert(derived.clone()) {
                    frontier.push(derived);
                }
            }
        }
        closed
    }
}

/// [`ImplicationRules::implies`] under the built-in table
pub fn implies(a: &Capability, b: &Capability) -> bool {
    BUILTIN.implies(a, b)
}

/// [`ImplicationRules::validate`] under the built-in table
pub fn validate(required: &Capability, available: &CapabilitySet) -> bool {
    BUILTIN.validate(required, available)
}

/// [`ImplicationRules::validate_all`] under the built-in table
pub fn validate_all(required: &[Capability], available: &CapabilitySet) -> bool {
    BUILTIN.validate_all(required, available)
}
