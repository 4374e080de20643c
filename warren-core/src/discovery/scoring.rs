//! Pattern matching and scoring over component metadata

use serde::{Deserialize, Serialize};
use warren_types::{ComponentId, HealthStatus};

use super::query::DiscoveryQuery;
use crate::capability::{self, Capability, ImplicationRules};
use crate::registry::ComponentMetadata;

const BASE_SCORE: f64 = 1.0;
const EXACT_CAPABILITY_BONUS: f64 = 1.0;
const IMPLIED_CAPABILITY_BONUS: f64 = 0.5;
const STALE_HEALTH_PENALTY: f64 = 0.25;

fn health_weight(status: HealthStatus) -> f64 {
    match status {
        HealthStatus::Healthy => 1.0,
        HealthStatus::Degraded => 0.25,
        HealthStatus::Unknown => -0.5,
        HealthStatus::Unhealthy => -1.0,
    }
}

/// A discovery result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub component_id: ComponentId,
    pub metadata: ComponentMetadata,
    pub score: f64,
}

/// Metadata snapshot plus whether its cached health is stale
#[derive(Debug, Clone)]
pub struct Candidate {
    pub metadata: ComponentMetadata,
    pub stale: bool,
}

/// How the requested capabilities were satisfied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CapabilityFit {
    exact: usize,
    implied: usize,
}

fn capability_fit(
    rules: &ImplicationRules,
    requested: &[Capability],
    provided: &[Capability],
) -> Option<CapabilityFit> {
    let mut fit = CapabilityFit::default();
    for req in requested {
        if provided.contains(req) {
            fit.exact += 1;
        } else if rules.validate(req, provided) {
            fit.implied += 1;
        } else {
            return None;
        }
    }
    Some(fit)
}

/// Match one candidate against `query`, returning its score if every
/// field passes
pub fn evaluate(
    rules: &ImplicationRules,
    query: &DiscoveryQuery,
    candidate: &Candidate,
) -> Option<Match> {
    let meta = &candidate.metadata;

    let passes = query.name.accepts(|fragment| meta.id.as_str().contains(fragment.as_str()))
        && query.component_type.accepts(|t| *t == meta.component_type)
        && query.version.accepts(|v| *v == meta.version)
        && query.health.accepts(|h| *h == meta.health)
        && query
            .tags
            .accepts(|tags| tags.iter().all(|tag| meta.tags.contains(tag)));
    if !passes {
        return None;
    }

    let fit = match query.capabilities.as_option() {
        None => CapabilityFit::default(),
        Some(requested) => {
            let provided = capability::parse_all(&meta.capabilities);
            capability_fit(rules, requested, &provided)?
        }
    };

    let mut score = BASE_SCORE
        + fit.exact as f64 * EXACT_CAPABILITY_BONUS
        + fit.implied as f64 * IMPLIED_CAPABILITY_BONUS
        + health_weight(meta.health);
    if candidate.stale {
        score -= STALE_HEALTH_PENALTY;
    }

    Some(Match {
        component_id: meta.id.clone(),
        metadata: meta.clone(),
        score,
    })
}

/// Every matching candidate, best first
pub fn rank<I>(rules: &ImplicationRules, query: &DiscoveryQuery, candidates: I) -> Vec<Match>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut matches: Vec<Match> = candidates
        .into_iter()
        .filter_map(|candidate| evaluate(rules, query, &candidate))
        .collect();
    sort_matches(&mut matches);
    matches
}

/// Score descending, ties by id so ordering is deterministic
pub fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.component_id.cmp(&b.component_id))
    });
}
