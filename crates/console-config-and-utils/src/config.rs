//! Configuration management for the console.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default API base URL (can be overridden at compile time via ZO_API_BASE_URL env var).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("ZO_API_BASE_URL") {
    Some(url) => url,
    None => "https://api.zo.network/v1",
};

/// Default client key identifying this application to the backend
/// (can be overridden at compile time via ZO_CLIENT_KEY env var).
pub const DEFAULT_CLIENT_KEY: &str = match option_env!("ZO_CLIENT_KEY") {
    Some(key) => key,
    None => "zo-ops-console",
};

/// Default profile store REST URL (compile-time ZO_PROFILE_API_URL).
pub const DEFAULT_PROFILE_API_URL: &str = match option_env!("ZO_PROFILE_API_URL") {
    Some(url) => url,
    None => "https://profiles.zo.network",
};

/// Default profile store API key (compile-time ZO_PROFILE_API_KEY).
const DEFAULT_PROFILE_API_KEY: &str = match option_env!("ZO_PROFILE_API_KEY") {
    Some(key) => key,
    None => "public-anon-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main console configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Backend API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Static client key sent with every request.
    #[serde(default = "default_client_key")]
    pub client_key: String,
    /// Secondary profile store REST URL.
    #[serde(default = "default_profile_api_url")]
    pub profile_api_url: String,
    /// Secondary profile store API key (public, safe to expose).
    #[serde(default = "default_profile_api_key")]
    pub profile_api_key: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_client_key() -> String {
    DEFAULT_CLIENT_KEY.to_string()
}

fn default_profile_api_url() -> String {
    DEFAULT_PROFILE_API_URL.to_string()
}

fn default_profile_api_key() -> String {
    DEFAULT_PROFILE_API_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            client_key: DEFAULT_CLIENT_KEY.to_string(),
            profile_api_url: DEFAULT_PROFILE_API_URL.to_string(),
            profile_api_key: DEFAULT_PROFILE_API_KEY.to_string(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    /// The API endpoints and keys are compile-time only and always use the
    /// built-in defaults regardless of what's in the config file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        // Force compile-time values (never from config file)
        config.api_base_url = DEFAULT_API_BASE_URL.to_string();
        config.client_key = DEFAULT_CLIENT_KEY.to_string();
        config.profile_api_url = DEFAULT_PROFILE_API_URL.to_string();
        config.profile_api_key = DEFAULT_PROFILE_API_KEY.to_string();

        // Environment variables can only override log_level
        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    /// Only log_level can be overridden at runtime.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("ZO_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }
}
