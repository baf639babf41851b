//! Configuration loading.
//!
//! Settings come from a TOML file; only the relay list is required.
//!
//! ```toml
//! relays = ["wss://relay.damus.io", "wss://nos.lol"]
//! database = "hydrator.db"
//! kinds = [30023, 1111, 9802, 1063, 9735]
//! batch_size = 200
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no relays configured")]
    NoRelays,

    #[error("relay URL must start with ws:// or wss://: {0}")]
    InvalidRelayUrl(String),
}

/// Runtime settings for the hydration pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct HydratorConfig {
    /// Relays to hydrate from; at least one is required
    pub relays: Vec<String>,

    /// SQLite database path
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Event kinds to hydrate
    #[serde(default = "default_kinds")]
    pub kinds: Vec<u16>,

    /// Handshake timeout per connection, seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Fan-out query: per-relay deadline, seconds
    #[serde(default = "default_per_relay_timeout")]
    pub per_relay_timeout_secs: u64,

    /// Fan-out query: overall deadline, seconds
    #[serde(default = "default_overall_timeout")]
    pub overall_timeout_secs: u64,

    /// Streaming: fixed delay between reconnect attempts, seconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Streaming: upper bound on one receive call, seconds
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_secs: u64,

    /// Events per persistence flush during backfill
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Connections idle longer than this are closed by the cleanup pass,
    /// seconds
    #[serde(default = "default_stale_max_age")]
    pub stale_max_age_secs: u64,
}

fn default_database() -> PathBuf {
    PathBuf::from("hydrator.db")
}

fn default_kinds() -> Vec<u16> {
    vec![30023, 1111, 9802, 1063, 9735]
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_per_relay_timeout() -> u64 {
    10
}

fn default_overall_timeout() -> u64 {
    30
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_receive_timeout() -> u64 {
    30
}

fn default_batch_size() -> usize {
    200
}

fn default_stale_max_age() -> u64 {
    300
}

impl HydratorConfig {
    /// Load and validate settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: HydratorConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings; an empty relay list is the fatal configuration
    /// error of this pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relays.is_empty() {
            return Err(ConfigError::NoRelays);
        }
        for url in &self.relays {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(ConfigError::InvalidRelayUrl(url.clone()));
            }
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn per_relay_timeout(&self) -> Duration {
        Duration::from_secs(self.per_relay_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }

    pub fn stale_max_age(&self) -> Duration {
        Duration::from_secs(self.stale_max_age_secs)
    }
}
