//! Harness configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. built-in defaults (1000 players, one created every 100ms, matchmaking at
//!    0.1 and store purchase at 0.02 executions per player per second),
//! 2. an optional TOML file,
//! 3. command-line flags and their environment variables (see [`Cli`]).
//!
//! ```toml
//! gateway_url = "http://gateway:8080"
//! metrics_addr = "0.0.0.0:9464"
//! target_players = 200
//!
//! [[scenarios]]
//! scenario = "matchmaking"
//! rate = 0.5
//! ```

mod cli;

pub use cli::Cli;

use crate::framework::{CompositorConfig, PoolConfig, Scenario};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// One compositor entry: a scenario name and its per-player rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRate {
    pub scenario: String,
    /// Executions per player per second.
    pub rate: f64,
}

impl ScenarioRate {
    pub fn new(scenario: impl Into<String>, rate: f64) -> Self {
        Self {
            scenario: scenario.into(),
            rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub gateway_url: String,
    /// Listen address of the `/metrics` endpoint.
    pub metrics_addr: String,
    pub target_players: usize,
    pub creation_interval_ms: u64,
    pub monitor_interval_ms: u64,
    pub tick_interval_ms: u64,
    pub dispatch_deadline_ms: u64,
    /// How long shutdown waits for players to exit after cancellation.
    pub shutdown_grace_ms: u64,
    pub scenarios: Vec<ScenarioRate>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            gateway_url: gateway_url_from(std::env::var("GATEWAY_HOSTNAME").ok()),
            metrics_addr: "0.0.0.0:9464".to_string(),
            target_players: 1000,
            creation_interval_ms: 100,
            monitor_interval_ms: 1000,
            tick_interval_ms: 100,
            dispatch_deadline_ms: 50,
            shutdown_grace_ms: 1000,
            scenarios: vec![
                ScenarioRate::new("matchmaking", 0.1),
                ScenarioRate::new("store_purchase", 0.02),
            ],
        }
    }
}

/// Gateway root for a hostname, defaulting to `localhost`.
pub fn gateway_url_from(host: Option<String>) -> String {
    let host = host
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string());
    format!("http://{host}:8080")
}

impl HarnessConfig {
    pub fn from_toml(raw: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Defaults, or the file at `path` when given.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.gateway_url.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway_url must not be empty".into()));
        }
        self.metrics_addr()?;
        if self.target_players == 0 {
            return Err(ConfigError::Invalid("target_players must be at least 1".into()));
        }
        for (name, value) in [
            ("creation_interval_ms", self.creation_interval_ms),
            ("monitor_interval_ms", self.monitor_interval_ms),
            ("tick_interval_ms", self.tick_interval_ms),
            ("dispatch_deadline_ms", self.dispatch_deadline_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }
        self.scenario_rates().map(|_| ())
    }

    /// Parsed compositor entries in declaration order.
    pub fn scenario_rates(&self) -> ConfigResult<Vec<(Scenario, f64)>> {
        self.scenarios
            .iter()
            .map(|entry| {
                let scenario: Scenario = entry
                    .scenario
                    .parse()
                    .map_err(|e| ConfigError::Invalid(format!("{e}")))?;
                if !entry.rate.is_finite() || entry.rate < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "rate for {} must be a non-negative number, got {}",
                        entry.scenario, entry.rate
                    )));
                }
                Ok((scenario, entry.rate))
            })
            .collect()
    }

    pub fn metrics_addr(&self) -> ConfigResult<SocketAddr> {
        self.metrics_addr.trim().parse().map_err(|e| {
            ConfigError::Invalid(format!("metrics_addr `{}`: {e}", self.metrics_addr))
        })
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            target_players: self.target_players,
            creation_interval: Duration::from_millis(self.creation_interval_ms),
            monitor_interval: Duration::from_millis(self.monitor_interval_ms),
        }
    }

    pub fn compositor_config(&self) -> CompositorConfig {
        CompositorConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            dispatch_deadline: Duration::from_millis(self.dispatch_deadline_ms),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
