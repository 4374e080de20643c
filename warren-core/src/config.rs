//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::discovery::Strategy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Engine-wide settings, loadable from a `warren.yml` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Idle timeout applied to actors that do not override it
    #[serde(default = "default_actor_timeout_ms")]
    pub actor_timeout_ms: u64,

    /// Budget for `execute` and actor `send` round-trips
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Budget for health probes and actor liveness probes
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Cached health older than this is scored as stale
    #[serde(default = "default_health_stale_after_ms")]
    pub health_stale_after_ms: u64,

    #[serde(default)]
    pub default_strategy: Strategy,

    #[serde(default)]
    pub restart: RestartConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,
}

fn default_actor_timeout_ms() -> u64 {
    30 * 60 * 1000
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    250
}

fn default_health_stale_after_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            actor_timeout_ms: default_actor_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            health_stale_after_ms: default_health_stale_after_ms(),
            default_strategy: Strategy::default(),
            restart: RestartConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

/// Restart intensity for crashed actors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    #[serde(default = "default_restart_window_ms")]
    pub window_ms: u64,
}

fn default_max_restarts() -> u32 {
    3
}

fn default_restart_window_ms() -> u64 {
    60_000
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            window_ms: default_restart_window_ms(),
        }
    }
}

impl RestartConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory for the disk backend; disk-persisted actors only keep
    /// state in memory when unset
    #[serde(default)]
    pub disk_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the engine unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("actor_timeout_ms", self.actor_timeout_ms),
            ("call_timeout_ms", self.call_timeout_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("restart.window_ms", self.restart.window_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn actor_timeout(&self) -> Duration {
        Duration::from_millis(self.actor_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn health_stale_after(&self) -> Duration {
        Duration::from_millis(self.health_stale_after_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = EngineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.actor_timeout(), Duration::from_secs(30 * 60));
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.probe_timeout_ms, 250);
        assert_eq!(config.default_strategy, Strategy::RoundRobin);
        assert_eq!(config.restart.max_restarts, 3);
        assert!(config.persistence.disk_dir.is_none());
    }

    #[test]
    fn test_partial_override() {
        let yaml = r#"
actor_timeout_ms: 5000
default_strategy: least_connections
restart:
  max_restarts: 1
persistence:
  disk_dir: /var/lib/warren
"#;
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.actor_timeout(), Duration::from_secs(5));
        assert_eq!(config.default_strategy, Strategy::LeastConnections);
        assert_eq!(config.restart.max_restarts, 1);
        assert_eq!(config.restart.window_ms, 60_000);
        assert_eq!(
            config.persistence.disk_dir.as_deref(),
            Some(Path::new("/var/lib/warren"))
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = EngineConfig::from_yaml_str("call_timeout_ms: 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "call_timeout_ms",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = EngineConfig::from_yaml_str("actor_timeout_ms: [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
