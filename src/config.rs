use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::domains::reminder::RetryPolicy;
use crate::error::{RemindMeError, Result};
use crate::services::dispatch::DispatchSettings;

pub const DEFAULT_RELAYS: &[&str] = &["wss://relay.damus.io", "wss://relay.nostr.band"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub relays: Vec<String>,
    pub db_path: Option<String>,
    pub poll_interval_secs: u64,
    pub pacing_ms: u64,
    /// Grace period after connecting before subscribing and dispatching.
    pub startup_delay_ms: u64,
    pub dispatch_batch_limit: usize,
    /// How far back the inbound subscription reaches on start.
    pub lookback_secs: u64,
    /// Reaction sent when a reminder is scheduled; empty disables it.
    pub reaction: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|relay| relay.to_string()).collect(),
            db_path: None,
            poll_interval_secs: 10,
            pacing_ms: 1500,
            startup_delay_ms: 2500,
            dispatch_batch_limit: 64,
            lookback_secs: 3600,
            reaction: Some(crate::services::intake::DEFAULT_REACTION.to_string()),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            RemindMeError::Config(format!("Failed to read {}: {e}", path.to_string_lossy()))
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| {
            RemindMeError::Config(format!("Invalid config {}: {e}", path.to_string_lossy()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` when given. Without a path the platform default location
    /// is used if it exists, otherwise built-in defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let default_path = crate::runtime_paths::default_config_path();
        if default_path.exists() {
            tracing::debug!(path = %default_path.display(), "Loading default config");
            return Self::from_file(&default_path);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(RemindMeError::Config(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if let Some(relay) = self
            .relays
            .iter()
            .find(|relay| !(relay.starts_with("wss://") || relay.starts_with("ws://")))
        {
            return Err(RemindMeError::Config(format!(
                "relay url must use ws:// or wss://: {relay}"
            )));
        }
        Ok(())
    }

    pub fn db_path(&self) -> String {
        self.db_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .unwrap_or_else(crate::runtime_paths::default_db_path)
    }

    pub fn reaction(&self) -> Option<String> {
        self.reaction
            .as_deref()
            .map(str::trim)
            .filter(|reaction| !reaction.is_empty())
            .map(str::to_string)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            interval: crate::scheduler::seconds(self.poll_interval_secs.max(1)),
            pacing: Duration::from_millis(self.pacing_ms),
            batch_limit: self.dispatch_batch_limit,
            retry: self.retry,
        }
    }
}
