//! Common traits and types for image generation providers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, Result};

/// Identity of a supported provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "imagen")]
    Imagen,
    #[serde(rename = "nano-banana-pro")]
    NanoBananaPro,
    #[serde(rename = "dalle")]
    Dalle,
    #[serde(rename = "gptimage")]
    GptImage,
}

impl ProviderKind {
    /// Default registration order
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Imagen,
        ProviderKind::Dalle,
        ProviderKind::GptImage,
        ProviderKind::NanoBananaPro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Imagen => "imagen",
            ProviderKind::NanoBananaPro => "nano-banana-pro",
            ProviderKind::Dalle => "dalle",
            ProviderKind::GptImage => "gptimage",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "imagen" => Ok(ProviderKind::Imagen),
            "nano-banana-pro" => Ok(ProviderKind::NanoBananaPro),
            "dalle" => Ok(ProviderKind::Dalle),
            "gptimage" => Ok(ProviderKind::GptImage),
            other => Err(AppError::ProviderNotFound(other.to_string())),
        }
    }
}

/// Optional generation parameters. Providers read the fields they understand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Quality tier (e.g. "standard", "hd", "low", "high", "fast", "ultra")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,

    /// Resolution tier ("1K", "2K", "4K")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    /// Aspect ratio such as "1:1" or "16:9"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,

    /// Target pixel size such as "1024x1024"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    /// Extended reasoning (conversational provider only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_thinking: Option<bool>,

    /// Web grounding (conversational provider only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_search: Option<bool>,

    /// Reference image for edit-style requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<PathBuf>,

    /// Continue an existing conversation instead of starting a new request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// Provider-specific extras, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerationParams {
    pub fn with_quality(quality: impl Into<String>) -> Self {
        Self {
            quality: Some(quality.into()),
            ..Self::default()
        }
    }

    pub fn with_resolution(resolution: impl Into<String>) -> Self {
        Self {
            resolution: Some(resolution.into()),
            ..Self::default()
        }
    }
}

/// Options for opening a multi-turn session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationOptions {
    #[serde(default = "default_true")]
    pub use_thinking: bool,
    #[serde(default)]
    pub use_search: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ConversationOptions {
    fn default() -> Self {
        Self {
            use_thinking: true,
            use_search: false,
        }
    }
}

/// Opaque identifier of a provider-held conversation
pub type ConversationHandle = String;

/// Outcome of a single successful provider call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutput {
    /// Remote URL, or a `file://` locator when the provider returned bytes
    pub locator: String,
    /// Estimated cost in USD
    pub cost: f64,
}

/// Trait for image generation providers
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Which provider this is
    fn kind(&self) -> ProviderKind;

    /// Stable identifier used for registration and routing
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Generate one image and write it to `destination`
    async fn generate(
        &self,
        prompt: &str,
        destination: &Path,
        params: &GenerationParams,
    ) -> Result<ProviderOutput>;

    /// Check if the provider is configured and reachable. Never fails.
    async fn check_availability(&self) -> bool;

    /// Static cost lookup for the given parameters
    fn cost_estimate(&self, params: &GenerationParams) -> f64;

    /// Conversational extension, if this provider supports it
    fn conversational(&self) -> Option<&dyn ConversationalProvider> {
        None
    }
}

/// Multi-turn editing extension implemented by conversational providers
pub trait ConversationalProvider: Send + Sync {
    /// Open a new session and return its handle
    fn create_conversation(&self, options: ConversationOptions) -> Result<ConversationHandle>;

    /// Whether this provider holds the given session
    fn has_conversation(&self, handle: &str) -> bool;

    /// Release the session. Unknown handles are ignored.
    fn close_conversation(&self, handle: &str);
}

/// Cost table lookup with a default tier fallback
pub(crate) fn lookup_cost(table: &[(&str, f64)], key: Option<&str>, default_key: &str) -> f64 {
    let find = |k: &str| {
        table
            .iter()
            .find(|(tier, _)| tier.eq_ignore_ascii_case(k))
            .map(|(_, cost)| *cost)
    };

    key.and_then(find)
        .or_else(|| find(default_key))
        .unwrap_or(0.0)
}
