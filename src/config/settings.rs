//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub admission: AdmissionConfig,
    pub generation: GenerationConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub backend: BackendConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Admission control configuration (one generation per identity per window)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_window_secs() -> u64 {
    10
}

/// Generation pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Hard timeout for a single backend call, in milliseconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,
    /// Maximum pending jobs before submissions are rejected
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Initial duration estimate before any job has completed
    #[serde(default = "default_initial_avg")]
    pub initial_avg_duration_ms: u64,
    /// Timeout for fetching a remote conditioning image, in milliseconds
    #[serde(default = "default_seed_fetch_timeout")]
    pub seed_fetch_timeout_ms: u64,
}

fn default_call_timeout() -> u64 {
    60_000
}

fn default_max_queue_size() -> usize {
    1000
}

fn default_initial_avg() -> u64 {
    12_000
}

fn default_seed_fetch_timeout() -> u64 {
    15_000
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub base_path: String,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

fn default_storage_path() -> String {
    "./data".to_string()
}

fn default_url_prefix() -> String {
    "http://localhost:8080/blobs".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Generation backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_edit_model")]
    pub edit_model: String,
    #[serde(default = "default_synthesize_model")]
    pub synthesize_model: String,
    #[serde(default = "default_suggest_model")]
    pub suggest_model: String,
    #[serde(default = "default_backend_timeout")]
    pub timeout_ms: u64,
}

fn default_edit_model() -> String {
    "dall-e-2".to_string()
}

fn default_synthesize_model() -> String {
    "dall-e-3".to_string()
}

fn default_suggest_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_backend_timeout() -> u64 {
    60_000
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("admission.enabled", true)?
            .set_default("admission.window_secs", 10)?
            .set_default("generation.call_timeout_ms", 60_000)?
            .set_default("generation.max_queue_size", 1000)?
            .set_default("generation.initial_avg_duration_ms", 12_000)?
            .set_default("generation.seed_fetch_timeout_ms", 15_000)?
            .set_default("storage.base_path", "./data")?
            .set_default("storage.url_prefix", "http://localhost:8080/blobs")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("backend.endpoint", "https://api.openai.com")?
            .set_default("backend.api_key", "")?
            // Load from configuration file
            .add_source(
                File::with_name(path.as_ref().to_str().unwrap_or("config/default"))
                    .required(false),
            )
            // Override with environment variables (prefixed with SEED_GATEWAY_)
            .add_source(
                Environment::with_prefix("SEED_GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.admission.window_secs == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Admission window cannot be 0".to_string(),
            )));
        }

        if self.backend.endpoint.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Backend endpoint cannot be empty".to_string(),
            )));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            admission: AdmissionConfig {
                enabled: true,
                window_secs: default_window_secs(),
            },
            generation: GenerationConfig {
                call_timeout_ms: default_call_timeout(),
                max_queue_size: default_max_queue_size(),
                initial_avg_duration_ms: default_initial_avg(),
                seed_fetch_timeout_ms: default_seed_fetch_timeout(),
            },
            storage: StorageConfig {
                base_path: default_storage_path(),
                url_prefix: default_url_prefix(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            backend: BackendConfig {
                endpoint: "https://api.openai.com".to_string(),
                api_key: String::new(),
                edit_model: default_edit_model(),
                synthesize_model: default_synthesize_model(),
                suggest_model: default_suggest_model(),
                timeout_ms: default_backend_timeout(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert!(settings.admission.enabled);
        assert_eq!(settings.admission.window_secs, 10);
        assert_eq!(settings.generation.initial_avg_duration_ms, 12_000);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut settings = Settings::default();
        settings.admission.window_secs = 0;
        assert!(settings.validate().is_err());
    }
}
