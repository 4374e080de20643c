//! Delegation, revocation and time-bounded capabilities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Capability, CapabilitySet, ImplicationRules};
use crate::error::{Result, WarrenError};

/// `from` hands `capability` to `to`
///
/// Records carry no authority of their own. Callers interpret them
/// against whatever grant store they keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRecord {
    pub capability: Capability,
    pub from: String,
    pub to: String,
}

/// `capability` is withdrawn from `entity`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub capability: Capability,
    pub entity: String,
}

pub fn delegate(
    capability: Capability,
    from: impl Into<String>,
    to: impl Into<String>,
) -> DelegationRecord {
    DelegationRecord {
        capability,
        from: from.into(),
        to: to.into(),
    }
}

pub fn revoke(capability: Capability, entity: impl Into<String>) -> RevocationRecord {
    RevocationRecord {
        capability,
        entity: entity.into(),
    }
}

/// A capability valid only within `[valid_from, valid_until)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalCapability {
    pub capability: Capability,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl TemporalCapability {
    pub fn new(
        capability: Capability,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            capability,
            valid_from,
            valid_until,
        }
    }
}

/// Half-open interval check
pub fn temporal_valid(tc: &TemporalCapability, now: DateTime<Utc>) -> bool {
    tc.valid_from <= now && now < tc.valid_until
}

/// Like `validate_all`, but reports what is missing
pub fn authorize(
    rules: &ImplicationRules,
    required: &[Capability],
    available: &CapabilitySet,
) -> Result<()> {
    let missing = rules.missing(required, available);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(WarrenError::InsufficientCapabilities {
            missing: missing.iter().map(ToString::to_string).collect(),
        })
    }
}

/// Returns the wrapped capability if `now` is inside its window
pub fn authorize_temporal(tc: &TemporalCapability, now: DateTime<Utc>) -> Result<&Capability> {
    if temporal_valid(tc, now) {
        Ok(&tc.capability)
    } else {
        Err(WarrenError::TemporalConstraintViolation {
            capability: tc.capability.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::compose;
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn test_records_are_plain_tags() {
        let cap = Capability::parse("read:/docs");
        let record = delegate(cap.clone(), "alice", "bob");
        assert_eq!(record.capability, cap);
        assert_eq!(record.from, "alice");
        assert_eq!(record.to, "bob");

        let record = revoke(cap.clone(), "bob");
        assert_eq!(record.entity, "bob");
    }

    #[test]
    fn test_temporal_window_is_half_open() {
        let start = Utc::now();
        let end = start + Duration::hours(1);
        let tc = TemporalCapability::new(Capability::parse("read:/a"), start, end);

        assert!(temporal_valid(&tc, start));
        assert!(temporal_valid(&tc, end - Duration::milliseconds(1)));
        assert!(!temporal_valid(&tc, end));
        assert!(!temporal_valid(&tc, start - Duration::milliseconds(1)));
    }

    #[test]
    fn test_authorize_temporal_error() {
        let start = Utc::now();
        let tc = TemporalCapability::new(Capability::parse("read:/a"), start, start);
        let err = authorize_temporal(&tc, start).unwrap_err();
        assert_eq!(err.code(), "temporal_constraint_violation");
    }

    #[test]
    fn test_authorize_reports_missing() {
        let rules = ImplicationRules::builtin();
        let available = compose(vec![Capability::parse("write:/a")]);

        assert!(authorize(&rules, &[Capability::parse("read:/a")], &available).is_ok());

        let err = authorize(
            &rules,
            &[Capability::parse("read:/a"), Capability::parse("delete:/a")],
            &available,
        )
        .unwrap_err();
        assert_eq!(
            err,
            WarrenError::InsufficientCapabilities {
                missing: vec!["delete:/a".to_string()]
            }
        );
    }

    proptest! {
        #[test]
        fn prop_window_membership(offset in -10_000i64..10_000, len in 1i64..5_000) {
            let base = Utc::now();
            let tc = TemporalCapability::new(
                Capability::new("read"),
                base,
                base + Duration::milliseconds(len),
            );
            let now = base + Duration::milliseconds(offset);
            prop_assert_eq!(temporal_valid(&tc, now), offset >= 0 && offset < len);
        }
    }
}
