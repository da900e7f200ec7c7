//! Ordered registry of provider clients

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::Result;
use crate::provider::dalle::DalleProvider;
use crate::provider::gpt_image::GptImageProvider;
use crate::provider::imagen::ImagenProvider;
use crate::provider::nano_banana::NanoBananaProvider;
use crate::provider::traits::{ImageProvider, ProviderKind};

/// Name → client mapping that preserves registration order.
/// Registration order is the default priority order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ImageProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the static provider list from settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut registry = Self::new();

        for kind in settings.enabled_providers() {
            let config = settings.providers.get(kind);
            let provider: Arc<dyn ImageProvider> = match kind {
                ProviderKind::Imagen => Arc::new(ImagenProvider::new(config)?),
                ProviderKind::NanoBananaPro => Arc::new(NanoBananaProvider::new(config)?),
                ProviderKind::Dalle => Arc::new(DalleProvider::new(config)?),
                ProviderKind::GptImage => Arc::new(GptImageProvider::new(config)?),
            };
            registry.register(provider);
        }

        info!(providers = ?registry.names(), "Initialized provider registry");
        Ok(registry)
    }

    /// Register a provider. A provider with the same name is replaced in place.
    pub fn register(&mut self, provider: Arc<dyn ImageProvider>) {
        let name = provider.name().to_string();
        match self.providers.iter().position(|p| p.name() == name) {
            Some(index) => {
                debug!(provider = %name, "Replacing registered provider");
                self.providers[index] = provider;
            }
            None => {
                debug!(provider = %name, "Registered provider");
                self.providers.push(provider);
            }
        }
    }

    /// Builder-style registration
    pub fn with(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// All providers in registration order
    pub fn get_all(&self) -> &[Arc<dyn ImageProvider>] {
        &self.providers
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
