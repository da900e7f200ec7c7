//! Google Imagen client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::provider::credentials::{ApiKey, GOOGLE_API_KEY_ENV};
use crate::provider::http;
use crate::provider::traits::{
    lookup_cost, GenerationParams, ImageProvider, ProviderKind, ProviderOutput,
};
use crate::response::{base64, file};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Cost per image by quality tier
pub const COST_PER_IMAGE: [(&str, f64); 3] = [("fast", 0.02), ("standard", 0.04), ("ultra", 0.06)];
pub const DEFAULT_TIER: &str = "standard";

/// Google Imagen (text-to-image) provider
pub struct ImagenProvider {
    client: Client,
    api_key: Option<ApiKey>,
    api_key_env: String,
    base_url: String,
    model: Option<String>,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    rai_filtered_reason: Option<String>,
}

impl ImagenProvider {
    /// Create a client, reading the API key from the configured environment variable
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let env = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| GOOGLE_API_KEY_ENV.to_string());
        let api_key = ApiKey::from_env(&env);
        Self::with_api_key(config, api_key)
    }

    /// Create a client with an explicit key
    pub fn with_api_key(config: &ProviderConfig, api_key: Option<ApiKey>) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            api_key,
            api_key_env: config
                .api_key_env
                .clone()
                .unwrap_or_else(|| GOOGLE_API_KEY_ENV.to_string()),
            base_url: http::base_url(config, DEFAULT_BASE_URL),
            model: config.model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn require_key(&self) -> Result<&ApiKey> {
        self.api_key.as_ref().ok_or_else(|| AppError::ProviderNotConfigured {
            provider: "Google".to_string(),
            env_var: self.api_key_env.clone(),
        })
    }

    /// Model for the requested tier, unless one is pinned in configuration
    fn model_for(&self, params: &GenerationParams) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }

        match params
            .quality
            .as_deref()
            .map(|q| q.to_ascii_lowercase())
            .as_deref()
        {
            Some("fast") => "imagen-4.0-fast-generate-001".to_string(),
            Some("ultra") => "imagen-4.0-ultra-generate-001".to_string(),
            _ => "imagen-4.0-generate-001".to_string(),
        }
    }
}

#[async_trait]
impl ImageProvider for ImagenProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Imagen
    }

    async fn generate(
        &self,
        prompt: &str,
        destination: &Path,
        params: &GenerationParams,
    ) -> Result<ProviderOutput> {
        let api_key = self.require_key()?;
        let model = self.model_for(params);
        let url = format!("{}/models/{}:predict", self.base_url, model);

        info!(provider = "imagen", model = %model, "Generating Imagen image");

        let request = PredictRequest {
            instances: vec![PredictInstance { prompt }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: params
                    .aspect_ratio
                    .clone()
                    .unwrap_or_else(|| "1:1".to_string()),
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error("Imagen", e))?;

        let body = http::read_json("Imagen", response).await?;
        let parsed: PredictResponse = serde_json::from_value(body)
            .map_err(|e| AppError::RemoteCall(format!("Unexpected Imagen response: {}", e)))?;

        let prediction = parsed
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EmptyResponse("Imagen".to_string()))?;

        let encoded = match prediction.bytes_base64_encoded {
            Some(encoded) => encoded,
            None => {
                if let Some(reason) = prediction.rai_filtered_reason {
                    warn!(provider = "imagen", reason = %reason, "Image filtered by provider");
                    return Err(AppError::RemoteCall(format!(
                        "Imagen filtered the image: {}",
                        reason
                    )));
                }
                return Err(AppError::EmptyResponse("Imagen".to_string()));
            }
        };

        let bytes = base64::decode(&encoded)?;
        file::write_image(destination, &bytes).await?;

        let cost = self.cost_estimate(params);
        debug!(provider = "imagen", path = %destination.display(), cost, "Imagen image saved");

        Ok(ProviderOutput {
            locator: file::file_uri(destination),
            cost,
        })
    }

    async fn check_availability(&self) -> bool {
        let Some(api_key) = &self.api_key else {
            warn!(provider = "imagen", env = %self.api_key_env, "Imagen not configured");
            return false;
        };

        let url = format!("{}/models", self.base_url);
        match self
            .client
            .get(&url)
            .query(&[("pageSize", "1")])
            .header("x-goog-api-key", api_key.expose())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(provider = "imagen", status = %response.status(), "Availability probe failed");
                false
            }
            Err(e) => {
                warn!(provider = "imagen", error = %e, "Availability probe failed");
                false
            }
        }
    }

    fn cost_estimate(&self, params: &GenerationParams) -> f64 {
        lookup_cost(&COST_PER_IMAGE, params.quality.as_deref(), DEFAULT_TIER)
    }
}
