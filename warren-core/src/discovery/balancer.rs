//! Selection strategies over a ranked match list

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use super::scoring::Match;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    RoundRobin,
    LeastConnections,
    WeightedRoundRobin,
    Random,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::RoundRobin => "round_robin",
            Strategy::LeastConnections => "least_connections",
            Strategy::WeightedRoundRobin => "weighted_round_robin",
            Strategy::Random => "random",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Strategy::RoundRobin),
            "least_connections" => Ok(Strategy::LeastConnections),
            "weighted_round_robin" => Ok(Strategy::WeightedRoundRobin),
            "random" => Ok(Strategy::Random),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

/// Weighted round-robin resolution: one tenth of a score point
const WEIGHT_SCALE: f64 = 10.0;

/// Lowest score a match is weighted as
const MIN_WEIGHTED_SCORE: f64 = 0.1;

/// Per-pattern cursors for the rotating strategies
#[derive(Debug, Default)]
pub struct Balancer {
    cursors: DashMap<String, AtomicU64>,
}

impl Balancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next value of the cursor for `key`
    fn tick(&self, key: &str) -> u64 {
        if let Some(cursor) = self.cursors.get(key) {
            return cursor.fetch_add(1, Ordering::Relaxed);
        }
        self.cursors
            .entry(key.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed)
    }

    /// Pick one of `matches` (sorted best first)
    ///
    /// `connections` reports active sessions per match and is only
    /// consulted by `LeastConnections`.
    pub fn select<F>(
        &self,
        key: &str,
        matches: Vec<Match>,
        strategy: Strategy,
        connections: F,
    ) -> Option<Match>
    where
        F: Fn(&Match) -> usize,
    {
        if matches.is_empty() {
            return None;
        }
        let index = match strategy {
            Strategy::RoundRobin => (self.tick(key) % matches.len() as u64) as usize,
            Strategy::LeastConnections => matches
                .iter()
                .enumerate()
                .min_by_key(|(_, m)| connections(*m))
                .map(|(i, _)| i)
                .unwrap_or(0),
            Strategy::WeightedRoundRobin => {
                let weights = weights(&matches);
                let total: u64 = weights.iter().sum();
                let mut slot = self.tick(key) % total;
                let mut chosen = 0;
                for (i, weight) in weights.iter().enumerate() {
                    if slot < *weight {
                        chosen = i;
                        break;
                    }
                    slot -= weight;
                }
                chosen
            }
            Strategy::Random => rand::thread_rng().gen_range(0..matches.len()),
        };
        matches.into_iter().nth(index)
    }
}

/// Integer weights proportional to score
///
/// Scores at or below `MIN_WEIGHTED_SCORE` share the floor weight so that
/// unhealthy or stale matches still get an occasional turn.
fn weights(matches: &[Match]) -> Vec<u64> {
    matches
        .iter()
        .map(|m| ((m.score.max(MIN_WEIGHTED_SCORE) * WEIGHT_SCALE).round() as u64).max(1))
        .collect()
}
