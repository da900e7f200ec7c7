//! OpenAI GPT-Image client

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
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
use crate::response::{base64, file};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-image-1";

/// Cost per image by quality
pub const COST_PER_IMAGE: [(&str, f64); 4] = [
    ("low", 0.020),
    ("medium", 0.040),
    ("high", 0.080),
    ("auto", 0.040),
];
pub const DEFAULT_QUALITY: &str = "auto";

/// OpenAI gpt-image provider. Returns image bytes inline.
pub struct GptImageProvider {
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
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
}

/// Map DALL-E quality names onto gpt-image ones
pub fn normalize_quality(quality: Option<&str>) -> &'static str {
    match quality.map(|q| q.to_ascii_lowercase()).as_deref() {
        Some("standard") | Some("medium") => "medium",
        Some("hd") | Some("high") => "high",
        Some("low") => "low",
        _ => DEFAULT_QUALITY,
    }
}

impl GptImageProvider {
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

    async fn create(&self, api_key: &ApiKey, prompt: &str, size: &str, quality: &str) -> Result<reqwest::Response> {
        let request = ImagesRequest {
            model: &self.model,
            prompt,
            n: 1,
            size,
            quality,
        };

        self.client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error("GPT-Image", e))
    }

    async fn edit(
        &self,
        api_key: &ApiKey,
        prompt: &str,
        size: &str,
        quality: &str,
        reference: &Path,
        image: Vec<u8>,
    ) -> Result<reqwest::Response> {
        let file_name = reference
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("reference.png")
            .to_string();
        let part = Part::bytes(image)
            .file_name(file_name)
            .mime_str(base64::mime_for_path(reference))?;

        let form = Form::new()
            .text("model", self.model.clone())
            .text("prompt", prompt.to_string())
            .text("size", size.to_string())
            .text("quality", quality.to_string())
            .part("image", part);

        self.client
            .post(format!("{}/images/edits", self.base_url))
            .bearer_auth(api_key.expose())
            .multipart(form)
            .send()
            .await
            .map_err(|e| http::transport_error("GPT-Image", e))
    }
}

#[async_trait]
impl ImageProvider for GptImageProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GptImage
    }

    async fn generate(
        &self,
        prompt: &str,
        destination: &Path,
        params: &GenerationParams,
    ) -> Result<ProviderOutput> {
        let api_key = self.require_key()?;
        let quality = normalize_quality(params.quality.as_deref());
        let size = params.size.as_deref().unwrap_or("1024x1024");

        let reference = match &params.reference_image {
            Some(path) => file::read_if_exists(path).await?.map(|bytes| (path, bytes)),
            None => None,
        };

        info!(
            provider = "gptimage",
            quality,
            size,
            edit = reference.is_some(),
            "Generating GPT-Image image"
        );

        let response = match reference {
            Some((path, bytes)) => self.edit(api_key, prompt, size, quality, path, bytes).await?,
            None => self.create(api_key, prompt, size, quality).await?,
        };

        let body = http::read_json("GPT-Image", response).await?;
        let parsed: ImagesResponse = serde_json::from_value(body)
            .map_err(|e| AppError::RemoteCall(format!("Unexpected GPT-Image response: {}", e)))?;

        let encoded = parsed
            .data
            .into_iter()
            .find_map(|image| image.b64_json)
            .ok_or_else(|| AppError::EmptyResponse("GPT-Image".to_string()))?;

        let bytes = base64::decode(&encoded)?;
        file::write_image(destination, &bytes).await?;

        let cost = self.cost_estimate(params);
        debug!(provider = "gptimage", path = %destination.display(), cost, "GPT-Image image saved");

        Ok(ProviderOutput {
            locator: file::file_uri(destination),
            cost,
        })
    }

    async fn check_availability(&self) -> bool {
        let Some(api_key) = &self.api_key else {
            warn!(provider = "gptimage", env = %self.api_key_env, "GPT-Image not configured");
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
                warn!(provider = "gptimage", status = %response.status(), "Availability probe failed");
                false
            }
            Err(e) => {
                warn!(provider = "gptimage", error = %e, "Availability probe failed");
                false
            }
        }
    }

    fn cost_estimate(&self, params: &GenerationParams) -> f64 {
        let quality = normalize_quality(params.quality.as_deref());
        lookup_cost(&COST_PER_IMAGE, Some(quality), DEFAULT_QUALITY)
    }
}
