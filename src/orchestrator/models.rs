//! Result types produced by the orchestrator

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::provider::traits::{GenerationParams, ProviderKind};

/// Provider name reported when nothing succeeded
pub const NO_PROVIDER: &str = "none";

/// Reason recorded on every alternatives bundle
pub const FIRST_SUCCESS_REASON: &str = "First successfully generated image";

/// Round a USD amount to whole micro-dollars for display
pub fn round_usd(amount: f64) -> f64 {
    (amount * 1_000_000.0).round() / 1_000_000.0
}

/// Outcome of a single `generate` call.
///
/// On success `cost >= 0` and `provider_used` names a registered provider.
/// On failure `cost == 0` and `provider_used == "none"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    pub provider_used: String,
    pub cost: f64,
    pub destination_path: PathBuf,
    pub error: Option<String>,
}

impl GenerationResult {
    pub fn succeeded(provider: &str, cost: f64, destination_path: PathBuf) -> Self {
        Self {
            success: true,
            provider_used: provider.to_string(),
            cost,
            destination_path,
            error: None,
        }
    }

    pub fn failed(error: String, destination_path: PathBuf) -> Self {
        Self {
            success: false,
            provider_used: NO_PROVIDER.to_string(),
            cost: 0.0,
            destination_path,
            error: Some(error),
        }
    }
}

/// One image produced during a fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub request_id: String,
    pub provider: ProviderKind,
    /// Remote URL or `file://` locator
    pub remote_locator: String,
    pub destination_path: PathBuf,
    pub parameters: GenerationParams,
    pub cost_estimate: f64,
}

/// Primary image plus the other successful results of a fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativesBundle {
    pub request_id: String,
    pub primary: GeneratedImage,
    pub alternatives: Vec<GeneratedImage>,
    pub selection_reason: Option<String>,
}

impl AlternativesBundle {
    /// Bundle from successes in registration order; `None` if there are none
    pub fn from_ordered(request_id: &str, mut images: Vec<GeneratedImage>) -> Option<Self> {
        if images.is_empty() {
            return None;
        }
        let primary = images.remove(0);
        Some(Self {
            request_id: request_id.to_string(),
            primary,
            alternatives: images,
            selection_reason: Some(FIRST_SUCCESS_REASON.to_string()),
        })
    }

    /// Total cost of every image in the bundle
    pub fn total_cost(&self) -> f64 {
        self.primary.cost_estimate
            + self
                .alternatives
                .iter()
                .map(|image| image.cost_estimate)
                .sum::<f64>()
    }
}
