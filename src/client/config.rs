use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::commands::timeout::TimeoutStrategy;
use crate::error::RelayError;
use crate::security::ApiKey;
use crate::transport::dispatcher::Correlation;

pub const CHANNEL_URL_ENV: &str = "RELAY_CHANNEL_URL";
pub const API_URL_ENV: &str = "RELAY_API_URL";
pub const MODE_ENV: &str = "RELAY_MODE";

/// Which transport carries the exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Channel first, polling when the channel drops.
    #[default]
    Auto,
    Channel,
    Polling,
}

impl FromStr for TransportMode {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(TransportMode::Auto),
            "channel" | "ws" | "websocket" => Ok(TransportMode::Channel),
            "polling" | "poll" | "rest" => Ok(TransportMode::Polling),
            other => Err(RelayError::Precondition(format!("unknown transport mode '{other}'"))),
        }
    }
}

/// On-disk settings; the credential never lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_channel_url")]
    pub channel_url: String,
    #[serde(default = "default_api_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub mode: TransportMode,
    #[serde(default)]
    pub correlation: Correlation,
    #[serde(default)]
    pub timeouts: TimeoutStrategy,
    pub output_dir: Option<PathBuf>,
}

fn default_channel_url() -> String {
    "ws://localhost:8765".to_string()
}

fn default_api_url() -> String {
    "http://localhost:8765".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel_url: default_channel_url(),
            api_base_url: default_api_url(),
            mode: TransportMode::default(),
            correlation: Correlation::default(),
            timeouts: TimeoutStrategy::default(),
            output_dir: None,
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&raw).context("parsing config JSON")?;
        Ok(settings)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(CHANNEL_URL_ENV) {
            self.channel_url = url;
        }
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.api_base_url = url;
        }
        if let Ok(mode) = std::env::var(MODE_ENV) {
            self.mode = mode.parse::<TransportMode>().with_context(|| format!("reading {MODE_ENV}"))?;
        }
        Ok(())
    }
}

/// Everything one invocation needs, built once and passed down.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub api_key: ApiKey,
}

impl Config {
    pub fn new(settings: Settings, api_key: ApiKey) -> Self {
        Self { settings, api_key }
    }

    /// File (optional) + environment overrides + `API_KEY`.
    ///
    /// A missing credential fails here, before any network call.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let api_key = ApiKey::from_env()?;
        let mut settings = match path {
            Some(p) => Settings::from_file(p)?,
            None => Settings::default(),
        };
        settings.apply_env()?;
        Ok(Self::new(settings, api_key))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.settings
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
