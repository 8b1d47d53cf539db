use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::agents::{AgentProfile, AgentRegistry};
use crate::types::DEFAULT_AGENT_VERSION;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "AGORA_CONFIG";

/// Top-level configuration loaded from `~/.agora/config.toml`.
///
/// Every section has defaults, so an empty (or missing) file yields a
/// working local setup: post store on :8000, agent service on :9000,
/// status server on :9001.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub post_store: PostStoreConfig,
    #[serde(default)]
    pub agent_service: AgentServiceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub status: StatusConfig,
    /// Optional roster override. Empty means the built-in roster.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentProfile>,
}

impl Config {
    /// Load config from `$AGORA_CONFIG` or `~/.agora/config.toml`, falling
    /// back to defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.post_store.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "post_store.base_url must not be empty".into(),
            ));
        }
        if self.agent_service.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "agent_service.base_url must not be empty".into(),
            ));
        }
        if self.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "scheduler.tick_interval_secs must be at least 1".into(),
            ));
        }
        self.general.validate()?;
        self.registry()?;
        Ok(())
    }

    /// Build the agent registry: the configured roster, or the built-in one.
    pub fn registry(&self) -> Result<AgentRegistry, ConfigError> {
        if self.agents.is_empty() {
            return Ok(AgentRegistry::builtin());
        }
        AgentRegistry::new(self.agents.clone())
            .map_err(|e| ConfigError::Validation(format!("agents: {e}")))
    }

    /// Apply the environment overrides honoured by the deployment scripts
    /// (`API_URL`, `AGENT_URL`, `STATUS_PORT`, `MIN_POST_INTERVAL_SECS`).
    ///
    /// `lookup` is normally `std::env::var(..).ok()`; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("API_URL").filter(|s| !s.trim().is_empty()) {
            self.post_store.base_url = url;
        }
        if let Some(url) = lookup("AGENT_URL").filter(|s| !s.trim().is_empty()) {
            self.agent_service.base_url = url;
        }
        if let Some(port) = lookup("STATUS_PORT") {
            self.status.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Validation(format!("STATUS_PORT: invalid port {port:?}")))?;
        }
        if let Some(secs) = lookup("MIN_POST_INTERVAL_SECS") {
            self.scheduler.min_post_interval_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("MIN_POST_INTERVAL_SECS: invalid value {secs:?}"))
            })?;
        }
        self.validate()
    }

    fn default_path() -> PathBuf {
        if let Some(explicit) = std::env::var_os(CONFIG_PATH_ENV) {
            return PathBuf::from(explicit);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agora")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "general.log_level must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostStoreConfig {
    #[serde(default = "default_post_store_url")]
    pub base_url: String,
    #[serde(default = "default_agent_version")]
    pub agent_version: String,
}

impl Default for PostStoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_post_store_url(),
            agent_version: default_agent_version(),
        }
    }
}

fn default_post_store_url() -> String {
    "http://localhost:8000".into()
}
fn default_agent_version() -> String {
    DEFAULT_AGENT_VERSION.into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentServiceConfig {
    #[serde(default = "default_agent_service_url")]
    pub base_url: String,
}

impl Default for AgentServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_agent_service_url(),
        }
    }
}

fn default_agent_service_url() -> String {
    "http://localhost:9000".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Fixed pause between ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Minimum gap between two successful agent posts.
    #[serde(default = "default_min_post_interval")]
    pub min_post_interval_secs: u64,
    /// Bound on remembered post ids; 0 keeps every id for the process lifetime.
    #[serde(default)]
    pub processed_capacity: usize,
    /// Per-request timeout for downstream calls; 0 disables the timeout.
    #[serde(default)]
    pub request_timeout_secs: u64,
    /// Seed for agent/template/emoji selection. Unset draws from entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            min_post_interval_secs: default_min_post_interval(),
            processed_capacity: 0,
            request_timeout_secs: 0,
            rng_seed: None,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn min_post_interval(&self) -> Duration {
        Duration::from_secs(self.min_post_interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn processed_capacity(&self) -> Option<usize> {
        (self.processed_capacity > 0).then_some(self.processed_capacity)
    }
}

fn default_tick_interval() -> u64 {
    5
}
fn default_min_post_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_status_host")]
    pub host: String,
    #[serde(default = "default_status_port")]
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            host: default_status_host(),
            port: default_status_port(),
        }
    }
}

impl StatusConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_status_host() -> String {
    "0.0.0.0".into()
}
fn default_status_port() -> u16 {
    9001
}
