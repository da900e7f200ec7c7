//! Nano Banana Pro (Gemini 3 Pro Image) client with conversational editing
//!
//! Single-shot requests go straight to `generateContent`. Conversations keep the
//! turn history in memory and replay it on every turn, so the model sees the
//! previous images and instructions. Turns on one session run one at a time.
//! Sessions live until closed; nothing expires them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::provider::credentials::{ApiKey, GOOGLE_API_KEY_ENV};
use crate::provider::http;
use crate::provider::traits::{
    lookup_cost, ConversationHandle, ConversationOptions, ConversationalProvider,
    GenerationParams, ImageProvider, ProviderKind, ProviderOutput,
};
use crate::response::{base64, file};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";

/// Cost per image by resolution
pub const COST_PER_IMAGE: [(&str, f64); 3] = [("1K", 0.035), ("2K", 0.050), ("4K", 0.080)];
pub const DEFAULT_RESOLUTION: &str = "1K";

const CONVERSATION_PREFIX: &str = "nano-banana-";

/// Gemini content turn
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    role: String,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 2],
    image_config: ImageConfig,
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    include_thoughts: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// In-memory multi-turn session
#[derive(Debug)]
struct Conversation {
    options: ConversationOptions,
    /// Held for the whole turn
    history: Mutex<Vec<Content>>,
    created_at: DateTime<Utc>,
}

/// Google Nano Banana Pro provider
pub struct NanoBananaProvider {
    client: Client,
    api_key: Option<ApiKey>,
    api_key_env: String,
    base_url: String,
    model: String,
    conversations: DashMap<ConversationHandle, Arc<Conversation>>,
}

impl NanoBananaProvider {
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
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            conversations: DashMap::new(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Number of open sessions
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// Number of stored turns in a session
    pub async fn conversation_turns(&self, handle: &str) -> Option<usize> {
        let conversation = self.conversations.get(handle).map(|c| c.value().clone())?;
        let history = conversation.history.lock().await;
        Some(history.len())
    }

    fn require_key(&self) -> Result<&ApiKey> {
        self.api_key.as_ref().ok_or_else(|| AppError::ProviderNotConfigured {
            provider: "Google".to_string(),
            env_var: self.api_key_env.clone(),
        })
    }

    async fn user_turn(&self, prompt: &str, params: &GenerationParams) -> Result<Content> {
        let mut parts = vec![ContentPart {
            text: Some(prompt.to_string()),
            ..ContentPart::default()
        }];

        if let Some(reference) = &params.reference_image {
            match file::read_if_exists(reference).await? {
                Some(bytes) => parts.push(ContentPart {
                    inline_data: Some(InlineData {
                        mime_type: base64::mime_for_path(reference).to_string(),
                        data: base64::encode(&bytes),
                    }),
                    ..ContentPart::default()
                }),
                None => {
                    warn!(
                        provider = "nano-banana-pro",
                        path = %reference.display(),
                        "Reference image not found, ignoring"
                    );
                }
            }
        }

        Ok(Content {
            role: "user".to_string(),
            parts,
        })
    }

    async fn send(
        &self,
        api_key: &ApiKey,
        contents: &[Content],
        use_thinking: bool,
        use_search: bool,
        aspect_ratio: String,
        resolution: String,
    ) -> Result<Content> {
        let request = GenerateContentRequest {
            contents,
            generation_config: GenerationConfig {
                response_modalities: ["TEXT", "IMAGE"],
                image_config: ImageConfig {
                    aspect_ratio,
                    image_size: resolution,
                },
                thinking_config: ThinkingConfig {
                    include_thoughts: use_thinking,
                },
            },
            tools: if use_search {
                vec![json!({ "googleSearch": {} })]
            } else {
                Vec::new()
            },
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error("Nano Banana Pro", e))?;

        let body = http::read_json("Nano Banana Pro", response).await?;
        let parsed: GenerateContentResponse = serde_json::from_value(body).map_err(|e| {
            AppError::RemoteCall(format!("Unexpected Nano Banana Pro response: {}", e))
        })?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AppError::RemoteCall(format!(
                "Nano Banana Pro blocked the prompt: {}",
                reason
            )));
        }

        parsed
            .candidates
            .into_iter()
            .find_map(|c| c.content)
            .ok_or_else(|| AppError::EmptyResponse("Nano Banana Pro".to_string()))
    }
}

/// First non-thought inline image in a model turn
fn extract_image(content: &Content) -> Option<&InlineData> {
    content
        .parts
        .iter()
        .filter(|part| !part.thought)
        .find_map(|part| part.inline_data.as_ref())
}

#[async_trait]
impl ImageProvider for NanoBananaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::NanoBananaPro
    }

    async fn generate(
        &self,
        prompt: &str,
        destination: &Path,
        params: &GenerationParams,
    ) -> Result<ProviderOutput> {
        let api_key = self.require_key()?;

        let aspect_ratio = params
            .aspect_ratio
            .clone()
            .unwrap_or_else(|| "1:1".to_string());
        let resolution = params
            .resolution
            .clone()
            .unwrap_or_else(|| DEFAULT_RESOLUTION.to_string());

        // Clone the session out so no map guard is held across the request
        let session = params
            .conversation_id
            .as_ref()
            .and_then(|id| self.conversations.get(id).map(|c| (id, c.value().clone())));

        if session.is_none() {
            if let Some(id) = &params.conversation_id {
                warn!(
                    provider = "nano-banana-pro",
                    conversation_id = %id,
                    "Unknown conversation, sending a standalone request"
                );
            }
        }

        let (use_thinking, use_search) = match &session {
            Some((_, conversation)) => (
                conversation.options.use_thinking,
                conversation.options.use_search,
            ),
            None => (
                params.use_thinking.unwrap_or(true),
                params.use_search.unwrap_or(false),
            ),
        };

        info!(
            provider = "nano-banana-pro",
            aspect_ratio = %aspect_ratio,
            resolution = %resolution,
            thinking = use_thinking,
            search = use_search,
            conversation = session.is_some(),
            "Generating Nano Banana Pro image"
        );

        let user_turn = self.user_turn(prompt, params).await?;
        let mut history = match &session {
            Some((_, conversation)) => Some(conversation.history.lock().await),
            None => None,
        };
        let mut contents = history.as_deref().cloned().unwrap_or_default();
        contents.push(user_turn.clone());

        let model_turn = self
            .send(
                api_key,
                &contents,
                use_thinking,
                use_search,
                aspect_ratio,
                resolution,
            )
            .await?;

        let image = extract_image(&model_turn)
            .ok_or_else(|| AppError::EmptyResponse("Nano Banana Pro".to_string()))?;
        let bytes = base64::decode(&image.data)?;
        file::write_image(destination, &bytes).await?;

        if let (Some((id, _)), Some(history)) = (&session, history.as_mut()) {
            history.push(user_turn);
            history.push(model_turn);
            debug!(conversation_id = %id, turns = history.len(), "Conversation advanced");
        }

        let cost = self.cost_estimate(params);
        debug!(
            provider = "nano-banana-pro",
            path = %destination.display(),
            cost,
            "Nano Banana Pro image saved"
        );

        Ok(ProviderOutput {
            locator: file::file_uri(destination),
            cost,
        })
    }

    async fn check_availability(&self) -> bool {
        let Some(api_key) = &self.api_key else {
            warn!(
                provider = "nano-banana-pro",
                env = %self.api_key_env,
                "Nano Banana Pro not configured"
            );
            return false;
        };

        match self
            .client
            .get(format!("{}/models", self.base_url))
            .query(&[("pageSize", "1")])
            .header("x-goog-api-key", api_key.expose())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    provider = "nano-banana-pro",
                    status = %response.status(),
                    "Availability probe failed"
                );
                false
            }
            Err(e) => {
                warn!(provider = "nano-banana-pro", error = %e, "Availability probe failed");
                false
            }
        }
    }

    fn cost_estimate(&self, params: &GenerationParams) -> f64 {
        lookup_cost(&COST_PER_IMAGE, params.resolution.as_deref(), DEFAULT_RESOLUTION)
    }

    fn conversational(&self) -> Option<&dyn ConversationalProvider> {
        Some(self)
    }
}

impl ConversationalProvider for NanoBananaProvider {
    fn create_conversation(&self, options: ConversationOptions) -> Result<ConversationHandle> {
        self.require_key()?;

        let handle = format!("{}{}", CONVERSATION_PREFIX, Uuid::new_v4());
        self.conversations.insert(
            handle.clone(),
            Arc::new(Conversation {
                options,
                history: Mutex::new(Vec::new()),
                created_at: Utc::now(),
            }),
        );

        info!(conversation_id = %handle, "Created conversation");
        Ok(handle)
    }

    fn has_conversation(&self, handle: &str) -> bool {
        self.conversations.contains_key(handle)
    }

    fn close_conversation(&self, handle: &str) {
        if let Some((_, conversation)) = self.conversations.remove(handle) {
            let age = Utc::now() - conversation.created_at;
            // A turn still in flight keeps the lock; report what is known
            let turns = conversation.history.try_lock().map(|h| h.len()).ok();
            info!(
                conversation_id = %handle,
                turns = ?turns,
                age_secs = age.num_seconds(),
                "Closed conversation"
            );
        }
    }
}
