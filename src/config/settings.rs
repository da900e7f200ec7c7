//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::provider::traits::ProviderKind;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
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

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Default priority order; earlier entries are tried first
    #[serde(default = "default_provider_order")]
    pub provider_order: Vec<String>,
    /// Directory used for alternatives when the caller gives none
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Cost ceiling applied to alternatives requests that do not carry their own
    #[serde(default)]
    pub default_cost_limit: Option<f64>,
}

fn default_provider_order() -> Vec<String> {
    ProviderKind::ALL
        .iter()
        .map(|kind| kind.as_str().to_string())
        .collect()
}

fn default_output_dir() -> String {
    "./generated_images".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            provider_order: default_provider_order(),
            output_dir: default_output_dir(),
            default_cost_limit: None,
        }
    }
}

/// Per-provider configuration. Unset fields fall back to the provider's own defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Transport-level request timeout; no timeout when unset
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: None,
            base_url: None,
            model: None,
            timeout_ms: None,
        }
    }
}

impl ProviderConfig {
    /// Configuration pointing at a custom endpoint, mostly useful for tests
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }
}

/// Configuration for all provider clients
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub imagen: ProviderConfig,
    #[serde(default)]
    pub nano_banana_pro: ProviderConfig,
    #[serde(default)]
    pub dalle: ProviderConfig,
    #[serde(default)]
    pub gptimage: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::Imagen => &self.imagen,
            ProviderKind::NanoBananaPro => &self.nano_banana_pro,
            ProviderKind::Dalle => &self.dalle,
            ProviderKind::GptImage => &self.gptimage,
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .add_source(
                File::with_name(path.as_ref().to_str().unwrap_or("config/default"))
                    .required(false),
            )
            // Override with environment variables (IMAGE_GEN_SERVER__PORT, ...)
            .add_source(
                Environment::with_prefix("IMAGE_GEN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("orchestrator.provider_order"),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        let mut seen = HashSet::new();
        for name in &self.orchestrator.provider_order {
            if ProviderKind::from_str(name).is_err() {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "Unknown provider '{}' in orchestrator.provider_order. Must be one of: {}",
                    name,
                    default_provider_order().join(", ")
                ))));
            }
            if !seen.insert(name.as_str()) {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "Provider '{}' listed more than once in orchestrator.provider_order",
                    name
                ))));
            }
        }

        if let Some(limit) = self.orchestrator.default_cost_limit {
            if limit < 0.0 {
                return Err(AppError::Config(config::ConfigError::Message(
                    "orchestrator.default_cost_limit cannot be negative".to_string(),
                )));
            }
        }

        Ok(())
    }

    /// Providers to register, in priority order, skipping disabled ones
    pub fn enabled_providers(&self) -> Vec<ProviderKind> {
        self.orchestrator
            .provider_order
            .iter()
            .filter_map(|name| ProviderKind::from_str(name).ok())
            .filter(|kind| self.providers.get(*kind).enabled)
            .collect()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}
