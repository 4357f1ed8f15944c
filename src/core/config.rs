//! Application configuration management
//!
//! Settings live in `config.json` under the platform config directory. At load
//! time the file is layered over the built-in defaults and `TUBEFORGE_*`
//! environment variables are layered over the file
//! (`TUBEFORGE_SWARM__REQUEST_TIMEOUT_SECONDS=20`).

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::instance_pool::DEFAULT_INSTANCES;
use crate::utils::network::get_user_agent;
use crate::utils::validation::is_http_url;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "TUBEFORGE";

/// Main application configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub swarm: SwarmConfig,
    pub bridge: BridgeConfig,
    pub direct_stream: DirectStreamConfig,
    pub metadata: MetadataConfig,
    pub cli: CliConfig,
    pub advanced: AdvancedConfig,
}

/// Swarm traversal settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub instances: Vec<String>,
    pub request_timeout_seconds: u64,
    pub audio_format: String,  // "mp3", "opus", ...
    pub filename_style: String, // "basic", "pretty", "nerdy", "classic"
    /// Offer alternate delivery modes on exhaustion instead of failing
    pub offer_fallback: bool,
}

/// Self-hosted bridge settings, shared by the client and `bridge serve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub output_dir: Option<String>,
    pub listen_port: u16,
    pub ytdlp_path: String,
}

/// Dedicated relay used by the direct stream mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectStreamConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub tool: String,
}

/// Advanced configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    pub log_level: String, // "error", "warn", "info", "debug", "trace"
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            swarm: SwarmConfig::default(),
            bridge: BridgeConfig::default(),
            direct_stream: DirectStreamConfig::default(),
            metadata: MetadataConfig::default(),
            cli: CliConfig::default(),
            advanced: AdvancedConfig::default(),
        }
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            instances: DEFAULT_INSTANCES.iter().map(|s| s.to_string()).collect(),
            request_timeout_seconds: 12,
            audio_format: "mp3".to_string(),
            filename_style: "basic".to_string(),
            offer_fallback: true,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/download".to_string(),
            timeout_seconds: 600,
            output_dir: None,
            listen_port: 3000,
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

impl Default for DirectStreamConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://noembed.com/embed".to_string(),
            timeout_seconds: 8,
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            tool: "yt-dlp".to_string(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            user_agent: get_user_agent(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the config file (if any), then `TUBEFORGE_*` variables
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        let config = Self::load_layered_from(&config_path, Self::env_source())?;
        config.validate()?;
        tracing::debug!("Loaded configuration layered over {:?}", config_path);
        Ok(config)
    }

    pub(crate) fn env_source() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("swarm.instances")
    }

    pub(crate) fn load_layered_from(path: &Path, env: config::Environment) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .with_context(|| "Failed to seed configuration defaults")?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to layer configuration from {:?}", path))?;

        settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize layered configuration")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = self.export()?;

        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved configuration to: {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "tubeforge", "tubeforge")
            .with_context(|| "Failed to get project directories")?;

        let config_dir = project_dirs.config_dir();
        Ok(config_dir.join("config.json"))
    }

    /// Reset configuration to defaults
    pub fn reset() -> Result<Self> {
        let config = Self::default();
        config.save()?;
        tracing::info!("Reset configuration to defaults");
        Ok(config)
    }

    /// Export configuration as JSON string
    pub fn export(&self) -> Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "Failed to export configuration")
    }

    /// Parse and validate a JSON document without touching disk
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(json).with_context(|| "Failed to parse imported configuration")?;

        config
            .validate()
            .with_context(|| "Imported configuration is invalid")?;
        Ok(config)
    }

    /// Import configuration from JSON string
    pub fn import(json: &str) -> Result<Self> {
        Self::import_to(json, &Self::get_config_path()?)
    }

    pub fn import_to(json: &str, config_path: &Path) -> Result<Self> {
        let config = Self::from_json(json)?;
        config.save_to(config_path)?;
        tracing::info!("Imported and validated configuration from JSON");
        Ok(config)
    }

    /// Merge with another configuration, keeping non-empty values from other
    pub fn merge(&mut self, other: &AppConfig) {
        if !other.swarm.instances.is_empty() {
            self.swarm.instances = other.swarm.instances.clone();
        }
        if other.swarm.request_timeout_seconds != 0 {
            self.swarm.request_timeout_seconds = other.swarm.request_timeout_seconds;
        }
        if !other.swarm.audio_format.is_empty() {
            self.swarm.audio_format = other.swarm.audio_format.clone();
        }
        if !other.swarm.filename_style.is_empty() {
            self.swarm.filename_style = other.swarm.filename_style.clone();
        }
        self.swarm.offer_fallback = other.swarm.offer_fallback;

        if !other.bridge.endpoint.is_empty() {
            self.bridge.endpoint = other.bridge.endpoint.clone();
        }
        if other.bridge.timeout_seconds != 0 {
            self.bridge.timeout_seconds = other.bridge.timeout_seconds;
        }
        if other.bridge.output_dir.is_some() {
            self.bridge.output_dir = other.bridge.output_dir.clone();
        }
        if other.bridge.listen_port != 0 {
            self.bridge.listen_port = other.bridge.listen_port;
        }
        if !other.bridge.ytdlp_path.is_empty() {
            self.bridge.ytdlp_path = other.bridge.ytdlp_path.clone();
        }

        if other.direct_stream.endpoint.is_some() {
            self.direct_stream.endpoint = other.direct_stream.endpoint.clone();
        }
        if other.direct_stream.timeout_seconds != 0 {
            self.direct_stream.timeout_seconds = other.direct_stream.timeout_seconds;
        }

        self.metadata.enabled = other.metadata.enabled;
        if !other.metadata.endpoint.is_empty() {
            self.metadata.endpoint = other.metadata.endpoint.clone();
        }
        if other.metadata.timeout_seconds != 0 {
            self.metadata.timeout_seconds = other.metadata.timeout_seconds;
        }

        if !other.cli.tool.is_empty() {
            self.cli.tool = other.cli.tool.clone();
        }

        if !other.advanced.log_level.is_empty() {
            self.advanced.log_level = other.advanced.log_level.clone();
        }
        if !other.advanced.user_agent.is_empty() {
            self.advanced.user_agent = other.advanced.user_agent.clone();
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Swarm
        if self.swarm.instances.is_empty() {
            anyhow::bail!("At least one swarm instance is required");
        }
        if let Some(bad) = self.swarm.instances.iter().find(|u| !is_http_url(u)) {
            anyhow::bail!("Swarm instance is not an http(s) URL: {}", bad);
        }
        if self.swarm.request_timeout_seconds == 0 || self.swarm.request_timeout_seconds > 120 {
            anyhow::bail!("Request timeout should be between 1 and 120 seconds");
        }
        if self.swarm.audio_format.trim().is_empty() {
            anyhow::bail!("Audio format must not be empty");
        }
        if self.swarm.filename_style.trim().is_empty() {
            anyhow::bail!("Filename style must not be empty");
        }

        // Bridge
        if !is_http_url(&self.bridge.endpoint) {
            anyhow::bail!("Bridge endpoint is not an http(s) URL: {}", self.bridge.endpoint);
        }
        if self.bridge.timeout_seconds < 10 || self.bridge.timeout_seconds > 3600 {
            anyhow::bail!("Bridge timeout should be between 10 and 3600 seconds");
        }
        if self.bridge.ytdlp_path.trim().is_empty() {
            anyhow::bail!("yt-dlp path must not be empty");
        }

        // Direct stream
        if let Some(ref endpoint) = self.direct_stream.endpoint {
            if !is_http_url(endpoint) {
                anyhow::bail!("Direct stream endpoint is not an http(s) URL: {}", endpoint);
            }
        }
        if self.direct_stream.timeout_seconds == 0 || self.direct_stream.timeout_seconds > 300 {
            anyhow::bail!("Direct stream timeout should be between 1 and 300 seconds");
        }

        // Metadata
        if self.metadata.enabled && !is_http_url(&self.metadata.endpoint) {
            anyhow::bail!("Metadata endpoint is not an http(s) URL: {}", self.metadata.endpoint);
        }
        if self.metadata.timeout_seconds == 0 || self.metadata.timeout_seconds > 60 {
            anyhow::bail!("Metadata timeout should be between 1 and 60 seconds");
        }

        if self.cli.tool.trim().is_empty() {
            anyhow::bail!("CLI tool must not be empty");
        }

        // Advanced
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.advanced.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level: must be one of {}",
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}
