//! Configuration module

pub mod settings;

pub use settings::{
    LoggingConfig, OrchestratorConfig, ProviderConfig, ProvidersConfig, ServerConfig, Settings,
};
