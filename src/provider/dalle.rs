//! OpenAI DALL-E 3 client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::provider::credentials::{ApiKey, OPENAI_API_KEY_ENV};
use crate::provider::http;
use crate::provider::traits::{
    lookup_cost, GenerationParams, ImageProvider, ProviderKind, ProviderOutput,
};
use crate::response::file;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "dall-e-3";

/// Cost per image by quality
pub const COST_PER_IMAGE: [(&str, f64); 2] = [("standard", 0.040), ("hd", 0.080)];
pub const DEFAULT_QUALITY: &str = "standard";

/// OpenAI DALL-E provider. Returns a hosted URL which is downloaded to disk.
pub struct DalleProvider {
    client: Client,
    api_key: Option<ApiKey>,
    api_key_env: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'a str>,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

impl DalleProvider {
    /// Create a client, reading the API key from the configured environment variable
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let env = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| OPENAI_API_KEY_ENV.to_string());
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
                .unwrap_or_else(|| OPENAI_API_KEY_ENV.to_string()),
            base_url: http::base_url(config, DEFAULT_BASE_URL),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn require_key(&self) -> Result<&ApiKey> {
        self.api_key.as_ref().ok_or_else(|| AppError::ProviderNotConfigured {
            provider: "OpenAI".to_string(),
            env_var: self.api_key_env.clone(),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http::transport_error("DALL-E image host", e))?;
        let response = http::ensure_success("DALL-E image host", response).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageProvider for DalleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dalle
    }

    async fn generate(
        &self,
        prompt: &str,
        destination: &Path,
        params: &GenerationParams,
    ) -> Result<ProviderOutput> {
        let api_key = self.require_key()?;

        let quality = match params.quality.as_deref() {
            Some(q) if q.eq_ignore_ascii_case("hd") => "hd",
            _ => DEFAULT_QUALITY,
        };
        let size = params.size.as_deref().unwrap_or("1024x1024");

        info!(provider = "dalle", quality, size, "Generating DALL-E image");

        let request = ImagesRequest {
            model: &self.model,
            prompt,
            n: 1,
            size,
            quality,
            style: params.style.as_deref(),
            response_format: "url",
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error("DALL-E", e))?;

        let body = http::read_json("DALL-E", response).await?;
        let parsed: ImagesResponse = serde_json::from_value(body)
            .map_err(|e| AppError::RemoteCall(format!("Unexpected DALL-E response: {}", e)))?;

        let image = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EmptyResponse("DALL-E".to_string()))?;
        if let Some(revised) = &image.revised_prompt {
            debug!(provider = "dalle", revised_prompt = %revised, "Prompt revised by provider");
        }
        let url = image
            .url
            .ok_or_else(|| AppError::EmptyResponse("DALL-E".to_string()))?;

        let bytes = self.download(&url).await?;
        file::write_image(destination, &bytes).await?;

        let cost = self.cost_estimate(params);
        debug!(provider = "dalle", path = %destination.display(), cost, "DALL-E image saved");

        Ok(ProviderOutput { locator: url, cost })
    }

    async fn check_availability(&self) -> bool {
        let Some(api_key) = &self.api_key else {
            warn!(provider = "dalle", env = %self.api_key_env, "DALL-E not configured");
            return false;
        };

        match self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(api_key.expose())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(provider = "dalle", status = %response.status(), "Availability probe failed");
                false
            }
            Err(e) => {
                warn!(provider = "dalle", error = %e, "Availability probe failed");
                false
            }
        }
    }

    fn cost_estimate(&self, params: &GenerationParams) -> f64 {
        lookup_cost(&COST_PER_IMAGE, params.quality.as_deref(), DEFAULT_QUALITY)
    }
}
