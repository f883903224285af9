//! Configuration management for airspace-copilot.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::agent::AgentSettings;
use crate::error::{Error, Result};
use crate::flight::validate_region_id;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default application directory name.
const APP_DIR_NAME: &str = "airspace-copilot";

/// Subdirectory of the data directory holding snapshot files.
const SNAPSHOT_DIR_NAME: &str = "snapshots";

/// Environment variable prefix.
const ENV_PREFIX: &str = "AIRSPACE_";

/// Default chat completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default model.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `AIRSPACE_`, sections split on `__`)
/// 2. TOML config file at `~/.config/airspace-copilot/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Snapshot store configuration.
    pub store: StoreConfig,
    /// Text generation configuration.
    pub llm: LlmConfig,
    /// Agent configuration.
    pub agent: AgentConfig,
}

/// Snapshot store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one `<region>.json` file per region.
    /// Defaults to `~/.local/share/airspace-copilot/snapshots`
    pub data_dir: Option<PathBuf>,
    /// Bound on a single snapshot read in milliseconds.
    pub read_timeout_ms: u64,
    /// How often `monitor` rescans the data directory, in seconds.
    pub refresh_interval_secs: u64,
}

/// Text generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Whether to request narrative text at all.
    pub enabled: bool,
    /// Chat completions endpoint.
    pub endpoint: String,
    /// Model name.
    pub model: String,
    /// Bearer token. Without one, answers are facts only.
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Bound on a single generation call in seconds.
    pub timeout_secs: u64,
    /// Reply length for operations narratives.
    pub ops_max_tokens: u32,
    /// Reply length for traveler narratives.
    pub traveler_max_tokens: u32,
    /// Reply length for the short analysis a traveler question delegates.
    pub delegated_max_tokens: u32,
}

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Region used when a command does not name one.
    pub default_region: String,
    /// Flights of a region passed verbatim to the operations narrative.
    pub prompt_flight_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None, // Resolved at runtime
            read_timeout_ms: 2_000,
            refresh_interval_secs: 60,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: 0.3,
            timeout_secs: 30,
            ops_max_tokens: 500,
            traveler_max_tokens: 400,
            delegated_max_tokens: 150,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_region: "region1".to_string(),
            prompt_flight_limit: 10,
        }
    }
}

impl LlmConfig {
    /// The API key, if one is set and not blank.
    #[must_use]
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    /// Whether answers will carry generated narratives.
    #[must_use]
    pub fn narratives_enabled(&self) -> bool {
        self.enabled && self.usable_api_key().is_some()
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(APP_DIR_NAME)
            .join(SNAPSHOT_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.store.read_timeout_ms == 0 {
            return Err(invalid("store.read_timeout_ms must be greater than 0"));
        }
        if self.store.refresh_interval_secs == 0 {
            return Err(invalid("store.refresh_interval_secs must be greater than 0"));
        }

        if self.llm.timeout_secs == 0 {
            return Err(invalid("llm.timeout_secs must be greater than 0"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid(format!(
                "llm.temperature ({}) must be between 0 and 2",
                self.llm.temperature
            )));
        }
        if self.llm.enabled {
            if self.llm.endpoint.trim().is_empty() {
                return Err(invalid("llm.endpoint cannot be empty when llm is enabled"));
            }
            if self.llm.model.trim().is_empty() {
                return Err(invalid("llm.model cannot be empty when llm is enabled"));
            }
        }

        validate_region_id(&self.agent.default_region).map_err(|_| {
            invalid(format!(
                "agent.default_region '{}' is not a valid region id",
                self.agent.default_region
            ))
        })?;

        Ok(())
    }

    /// Get the snapshot directory, resolving defaults if not set.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.store
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the snapshot read timeout as a Duration.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.store.read_timeout_ms)
    }

    /// Get the refresh interval as a Duration.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.store.refresh_interval_secs)
    }

    /// Get the generation timeout as a Duration.
    #[must_use]
    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    /// Settings for agent sessions.
    #[must_use]
    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            generate_timeout: self.generate_timeout(),
            ops_max_tokens: self.llm.ops_max_tokens,
            traveler_max_tokens: self.llm.traveler_max_tokens,
            delegated_max_tokens: self.llm.delegated_max_tokens,
            prompt_flight_limit: self.agent.prompt_flight_limit,
        }
    }

    /// A copy with the API key masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.llm.api_key.is_some() {
            config.llm.api_key = Some("********".to_string());
        }
        config
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "airspace_copilot_config_{name}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.store.data_dir.is_none());
        assert_eq!(config.store.read_timeout_ms, 2_000);
        assert_eq!(config.store.refresh_interval_secs, 60);
        assert!(config.llm.enabled);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.agent.default_region, "region1");
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_read_timeout() {
        let mut config = Config::default();
        config.store.read_timeout_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("read_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_refresh_interval() {
        let mut config = Config::default();
        config.store.refresh_interval_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("refresh_interval_secs"));
    }

    #[test]
    fn test_validate_temperature_range() {
        let mut config = Config::default();
        config.llm.temperature = 2.5;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("temperature"));
    }

    #[test]
    fn test_validate_empty_model_only_when_enabled() {
        let mut config = Config::default();
        config.llm.model = String::new();
        assert!(config.validate().is_err());

        config.llm.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_default_region() {
        let mut config = Config::default();
        config.agent.default_region = "../region1".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("default_region"));
    }

    #[test]
    fn test_data_dir_default() {
        let path = Config::default().data_dir();
        assert!(path.to_string_lossy().contains("airspace-copilot"));
        assert!(path.ends_with("snapshots"));
    }

    #[test]
    fn test_data_dir_custom() {
        let mut config = Config::default();
        config.store.data_dir = Some(PathBuf::from("/custom/snapshots"));

        assert_eq!(config.data_dir(), PathBuf::from("/custom/snapshots"));
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.read_timeout(), Duration::from_millis(2_000));
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.generate_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_agent_settings() {
        let mut config = Config::default();
        config.agent.prompt_flight_limit = 3;
        config.llm.timeout_secs = 5;

        let settings = config.agent_settings();
        assert_eq!(settings.prompt_flight_limit, 3);
        assert_eq!(settings.generate_timeout, Duration::from_secs(5));
        assert_eq!(settings.ops_max_tokens, 500);
        assert_eq!(settings.delegated_max_tokens, 150);
    }

    #[test]
    fn test_redacted_masks_api_key() {
        let mut config = Config::default();
        config.llm.api_key = Some("gsk_secret".to_string());

        let redacted = config.redacted();
        assert_eq!(redacted.llm.api_key.as_deref(), Some("********"));
        assert!(Config::default().redacted().llm.api_key.is_none());
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("airspace-copilot"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.agent, AgentConfig::default());
    }

    #[test]
    fn test_load_toml_sections() {
        let path = temp_config(
            "sections",
            r#"
[store]
data_dir = "/srv/airspace"
read_timeout_ms = 500

[llm]
enabled = false
model = "llama-3.1-8b-instant"

[agent]
default_region = "region2"
"#,
        );

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.data_dir(), PathBuf::from("/srv/airspace"));
        assert_eq!(config.store.read_timeout_ms, 500);
        assert_eq!(config.store.refresh_interval_secs, 60);
        assert!(!config.llm.enabled);
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
        assert_eq!(config.agent.default_region, "region2");
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = temp_config("invalid", "[store]\nread_timeout_ms = 0\n");
        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_narratives_need_a_non_blank_key() {
        let mut llm = LlmConfig::default();
        assert!(!llm.narratives_enabled());

        llm.api_key = Some("   ".to_string());
        assert!(llm.usable_api_key().is_none());
        assert!(!llm.narratives_enabled());

        llm.api_key = Some("gsk_test".to_string());
        assert_eq!(llm.usable_api_key(), Some("gsk_test"));
        assert!(llm.narratives_enabled());

        llm.enabled = false;
        assert!(!llm.narratives_enabled());
    }

    #[test]
    fn test_llm_config_deserialize() {
        let json = r#"{"model": "mixtral", "temperature": 0.7}"#;
        let llm: LlmConfig = serde_json::from_str(json).unwrap();
        assert_eq!(llm.model, "mixtral");
        assert!((llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(llm.endpoint, DEFAULT_ENDPOINT);
    }
}
