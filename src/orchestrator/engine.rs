//! Provider-fallback orchestration
//!
//! `generate` walks providers strictly one at a time in priority order and stops at
//! the first success. `generate_alternatives` fans out to every available provider
//! at once and keeps the successes in registration order, so the primary image
//! does not depend on which request finished first. Dropping that future aborts
//! the provider tasks still in flight.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::orchestrator::models::{AlternativesBundle, GeneratedImage, GenerationResult};
use crate::provider::registry::ProviderRegistry;
use crate::provider::traits::{
    ConversationHandle, ConversationOptions, GenerationParams, ImageProvider,
};
use crate::response::file;

/// Orchestrates image generation across the registered providers
pub struct Orchestrator {
    registry: ProviderRegistry,
    /// Running spend in USD; only grows
    total_cost: Arc<Mutex<f64>>,
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            total_cost: Arc::new(Mutex::new(0.0)),
        }
    }

    /// Build the orchestrator with the providers enabled in settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(ProviderRegistry::from_settings(settings)?))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Registered provider names in default priority order
    pub fn provider_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Cumulative cost of every successful generation so far
    pub fn total_cost(&self) -> f64 {
        *self.total_cost.lock()
    }

    fn add_cost(&self, cost: f64) {
        record_cost(&self.total_cost, cost);
    }

    /// Try order: the preferred provider first if known, then the rest in registration order
    fn provider_order(&self, preferred: Option<&str>) -> Vec<Arc<dyn ImageProvider>> {
        let all = self.registry.get_all();
        match preferred.and_then(|name| self.registry.get(name)) {
            Some(first) => {
                let mut order = Vec::with_capacity(all.len());
                order.push(first.clone());
                order.extend(
                    all.iter()
                        .filter(|p| p.name() != first.name())
                        .cloned(),
                );
                order
            }
            None => all.to_vec(),
        }
    }

    /// Generate an image, falling back through providers until one succeeds.
    ///
    /// Never fails: exhaustion is reported as an unsuccessful result carrying the
    /// last provider error.
    pub async fn generate(
        &self,
        prompt: &str,
        destination: impl AsRef<Path>,
        preferred_provider: Option<&str>,
        params: Option<GenerationParams>,
    ) -> GenerationResult {
        let destination = file::expand_home(destination.as_ref());
        let params = params.unwrap_or_default();

        if prompt.trim().is_empty() {
            let err = AppError::InvalidRequest("prompt must not be empty".to_string());
            warn!(error = %err, "Rejected generation request");
            return GenerationResult::failed(err.to_string(), destination);
        }

        if let Some(name) = preferred_provider {
            if !self.registry.contains(name) {
                debug!(provider = %name, "Preferred provider not registered, using default order");
            }
        }

        // A conversation turn goes to the provider holding the session
        let conversation_owner = params
            .conversation_id
            .as_deref()
            .and_then(|id| self.conversation_owner(id));
        let preferred = preferred_provider
            .filter(|name| self.registry.contains(name))
            .or(conversation_owner.as_deref());

        let mut last_error: Option<AppError> = None;

        for provider in self.provider_order(preferred) {
            let name = provider.name();

            if !provider.check_availability().await {
                warn!(provider = %name, "Provider not available, trying next provider");
                continue;
            }

            info!(provider = %name, "Attempting generation");
            match provider.generate(prompt, &destination, &params).await {
                Ok(output) => {
                    self.add_cost(output.cost);
                    info!(
                        provider = %name,
                        cost = output.cost,
                        locator = %output.locator,
                        "Generation succeeded"
                    );
                    return GenerationResult::succeeded(name, output.cost, destination);
                }
                Err(err) => {
                    warn!(
                        provider = %name,
                        error = %err,
                        configuration = err.is_configuration(),
                        "Generation failed, trying next provider"
                    );
                    last_error = Some(err);
                }
            }
        }

        let message = match last_error {
            Some(err) => format!("All providers failed. Last error: {}", err),
            None => "All providers failed. No provider was available".to_string(),
        };
        error!(error = %message, "Image generation exhausted all providers");

        GenerationResult::failed(message, destination)
    }

    /// Generate one image per available provider concurrently for comparison.
    ///
    /// Returns `None` when the running total already meets `cost_limit`, when no
    /// provider is available, or when every provider fails.
    pub async fn generate_alternatives(
        &self,
        prompt: &str,
        output_dir: impl AsRef<Path>,
        request_id: &str,
        cost_limit: Option<f64>,
    ) -> Option<AlternativesBundle> {
        if let Some(limit) = cost_limit {
            let spent = self.total_cost();
            if spent >= limit {
                warn!(total_cost = spent, cost_limit = limit, "Cost limit reached");
                return None;
            }
        }

        let output_dir = file::expand_home(output_dir.as_ref());
        if let Err(err) = tokio::fs::create_dir_all(&output_dir).await {
            error!(path = %output_dir.display(), error = %err, "Failed to create output directory");
            return None;
        }

        let mut available = Vec::new();
        for provider in self.registry.get_all() {
            if provider.check_availability().await {
                available.push(provider.clone());
            } else {
                warn!(provider = %provider.name(), "Provider not available, skipping");
            }
        }

        if available.is_empty() {
            error!(request_id = %request_id, "No providers available for generation");
            return None;
        }

        // One task per provider so a failure or panic stays in its slot. The set
        // aborts whatever is still running when it is dropped.
        let mut tasks = JoinSet::new();
        for (index, provider) in available.into_iter().enumerate() {
            let prompt = prompt.to_string();
            let request_id = request_id.to_string();
            let destination = output_dir.join(format!("{}-{}.png", request_id, provider.name()));
            let total_cost = self.total_cost.clone();
            tasks.spawn(async move {
                let image = generate_single(provider, prompt, request_id, destination).await?;
                record_cost(&total_cost, image.cost_estimate);
                Ok::<_, AppError>((index, image))
            });
        }

        let mut finished = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(slot)) => finished.push(slot),
                Ok(Err(err)) => error!(request_id = %request_id, error = %err, "Generation failed"),
                Err(err) => error!(request_id = %request_id, error = %err, "Generation task aborted"),
            }
        }

        finished.sort_by_key(|(index, _)| *index);
        let images = finished.into_iter().map(|(_, image)| image).collect();

        let bundle = AlternativesBundle::from_ordered(request_id, images)?;
        info!(
            request_id = %request_id,
            primary = %bundle.primary.provider,
            alternatives = bundle.alternatives.len(),
            "Generated alternatives"
        );
        Some(bundle)
    }

    /// Availability of a single registered provider
    pub async fn check_availability(&self, provider: &str) -> Result<bool> {
        let provider = self
            .registry
            .get(provider)
            .ok_or_else(|| AppError::ProviderNotFound(provider.to_string()))?;
        Ok(provider.check_availability().await)
    }

    /// Static cost estimate of a single registered provider
    pub fn cost_estimate(&self, provider: &str, params: &GenerationParams) -> Result<f64> {
        let provider = self
            .registry
            .get(provider)
            .ok_or_else(|| AppError::ProviderNotFound(provider.to_string()))?;
        Ok(provider.cost_estimate(params))
    }

    /// Open a conversation on the named provider, or the first one that supports it
    pub fn create_conversation(
        &self,
        provider: Option<&str>,
        options: ConversationOptions,
    ) -> Result<ConversationHandle> {
        let target = match provider {
            Some(name) => {
                let provider = self
                    .registry
                    .get(name)
                    .ok_or_else(|| AppError::ProviderNotFound(name.to_string()))?;
                if provider.conversational().is_none() {
                    return Err(AppError::InvalidRequest(format!(
                        "Provider '{}' does not support conversations",
                        name
                    )));
                }
                provider
            }
            None => self
                .registry
                .get_all()
                .iter()
                .find(|p| p.conversational().is_some())
                .cloned()
                .ok_or_else(|| {
                    AppError::InvalidRequest(
                        "No registered provider supports conversations".to_string(),
                    )
                })?,
        };

        match target.conversational() {
            Some(conversational) => conversational.create_conversation(options),
            None => Err(AppError::Internal(format!(
                "Provider '{}' lost its conversation support",
                target.name()
            ))),
        }
    }

    /// Name of the provider holding a conversation
    pub fn conversation_owner(&self, handle: &str) -> Option<String> {
        self.registry
            .get_all()
            .iter()
            .find(|p| {
                p.conversational()
                    .map(|c| c.has_conversation(handle))
                    .unwrap_or(false)
            })
            .map(|p| p.name().to_string())
    }

    /// Close a conversation wherever it lives. Unknown handles are ignored.
    /// Returns whether a session was released.
    pub fn close_conversation(&self, handle: &str) -> bool {
        let mut closed = false;
        for provider in self.registry.get_all() {
            if let Some(conversational) = provider.conversational() {
                if conversational.has_conversation(handle) {
                    conversational.close_conversation(handle);
                    closed = true;
                }
            }
        }

        if !closed {
            debug!(conversation_id = %handle, "Close requested for unknown conversation");
        }
        closed
    }
}

fn record_cost(total_cost: &Mutex<f64>, cost: f64) {
    let mut total = total_cost.lock();
    *total += cost;
    debug!(cost, total = *total, "Recorded generation cost");
}

async fn generate_single(
    provider: Arc<dyn ImageProvider>,
    prompt: String,
    request_id: String,
    destination: PathBuf,
) -> Result<GeneratedImage> {
    let preview: String = prompt.chars().take(50).collect();
    info!(provider = %provider.name(), prompt = %preview, "Generating image");

    let parameters = GenerationParams::default();
    let output = provider.generate(&prompt, &destination, &parameters).await?;

    Ok(GeneratedImage {
        request_id,
        provider: provider.kind(),
        remote_locator: output.locator,
        destination_path: destination,
        parameters,
        cost_estimate: output.cost,
    })
}
