// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the configuration schema for a rigwatch host, including:
// - Presence reaper thresholds and sweep cadence
// - Advice hook subscription subject and seed file
// - In-memory event bus sizing

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration file (`rigwatch.yaml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Presence tracker and reaper settings
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Advice hook evaluation settings
    #[serde(default)]
    pub advice: AdviceConfig,

    /// In-memory event bus settings
    #[serde(default)]
    pub event_bus: EventBusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Idle time after which an actor is marked reaped
    #[serde(default = "default_dead_threshold", with = "humantime_serde")]
    pub dead_threshold: Duration,

    /// Time after reaping after which an actor is deleted
    #[serde(default = "default_evict_after", with = "humantime_serde")]
    pub evict_after: Duration,

    /// How often the reaper sweeps
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceConfig {
    /// Subject pattern the subscriber loop listens on
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Optional YAML file of advice beads used to seed the in-memory store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Messages buffered per subscriber before the slowest one lags
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_dead_threshold() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_evict_after() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_subject() -> String {
    crate::domain::events::SESSION_SUBJECT_WILDCARD.to_string()
}

fn default_capacity() -> usize {
    1000
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            dead_threshold: default_dead_threshold(),
            evict_after: default_evict_after(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            advice_file: None,
        }
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. RIGWATCH_CONFIG_PATH environment variable
    /// 2. ./rigwatch.yaml (working directory)
    /// 3. ~/.rigwatch/config.yaml (user home)
    /// 4. /etc/rigwatch/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("RIGWATCH_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./rigwatch.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".rigwatch").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/rigwatch/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
        } else if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(&config_path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", config_path, e))?
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut Duration); 3] = [
            ("RIGWATCH_DEAD_THRESHOLD", &mut self.presence.dead_threshold),
            ("RIGWATCH_EVICT_AFTER", &mut self.presence.evict_after),
            ("RIGWATCH_SWEEP_INTERVAL", &mut self.presence.sweep_interval),
        ];

        for (var, slot) in overrides {
            let Ok(val) = std::env::var(var) else {
                continue;
            };
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(duration) => {
                    tracing::info!("Environment override: {}={}", var, val);
                    *slot = duration;
                }
                Err(e) => {
                    tracing::warn!("Invalid value for {}: '{}' ({}). Ignoring.", var, val, e);
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.presence.sweep_interval.is_zero() {
            anyhow::bail!("presence.sweep_interval must be greater than zero");
        }

        if self.presence.dead_threshold.is_zero() {
            anyhow::bail!("presence.dead_threshold must be greater than zero");
        }

        if self.event_bus.capacity == 0 {
            anyhow::bail!("event_bus.capacity must be greater than zero");
        }

        crate::domain::event_stream::validate_pattern(&self.advice.subject)?;

        Ok(())
    }
}
