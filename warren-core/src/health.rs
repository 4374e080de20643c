//! Shared health cache
//!
//! Health is cached apart from component metadata so that probes never
//! contend with registry writes.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use warren_types::{ComponentId, HealthStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
}

/// Latest known health per component
#[derive(Debug, Default)]
pub struct HealthCache {
    entries: DashMap<ComponentId, HealthRecord>,
}

impl HealthCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Unknown` for anything never recorded
    pub fn get(&self, id: &ComponentId) -> HealthStatus {
        self.entries
            .get(id)
            .map(|record| record.status)
            .unwrap_or_default()
    }

    pub fn record(&self, id: &ComponentId) -> Option<HealthRecord> {
        self.entries.get(id).map(|record| *record)
    }

    pub fn set(&self, id: ComponentId, status: HealthStatus) {
        self.entries.insert(
            id,
            HealthRecord {
                status,
                checked_at: Utc::now(),
            },
        );
    }

    pub fn remove(&self, id: &ComponentId) {
        self.entries.remove(id);
    }

    /// Never checked, or last checked longer ago than `max_age`
    pub fn is_stale(&self, id: &ComponentId, max_age: Duration) -> bool {
        match self.record(id) {
            None => true,
            Some(record) => {
                let age = Utc::now().signed_duration_since(record.checked_at);
                age.to_std().map_or(false, |age| age > max_age)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
