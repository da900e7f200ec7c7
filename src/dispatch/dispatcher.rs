//! Tool adapter mapping named operations onto the orchestrator

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info};

use crate::dispatch::operation::{Operation, OperationError, VALID_OPERATIONS};
use crate::error::Result;
use crate::orchestrator::Orchestrator;

pub const TOOL_NAME: &str = "image-generation";
pub const TOOL_DESCRIPTION: &str = "Generate images using multiple AI providers (Imagen, DALL-E, \
    GPT-Image, Nano Banana Pro). Supports automatic fallback, cost tracking, and provider \
    availability checking.";

/// Uniform success/error envelope returned for every operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ToolResult {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn err(error: Value) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error),
        }
    }

    /// Error message, if this is a failure envelope
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
    }
}

/// Operation dispatcher over a shared orchestrator
#[derive(Clone)]
pub struct Dispatcher {
    orchestrator: Arc<Orchestrator>,
}

impl Dispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn name(&self) -> &'static str {
        TOOL_NAME
    }

    pub fn description(&self) -> &'static str {
        TOOL_DESCRIPTION
    }

    /// Execute a request. Every outcome, including internal faults, is an envelope.
    pub async fn execute(&self, input: &Value) -> ToolResult {
        let operation = match Operation::parse(input) {
            Ok(operation) => operation,
            Err(err) => return Self::rejection(err),
        };
        let name = operation.name();

        match AssertUnwindSafe(self.run(operation)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                error!(operation = name, error = %err, "Tool execution failed");
                ToolResult::err(json!({
                    "message": err.to_string(),
                    "operation": name,
                    "type": err.kind().as_str(),
                }))
            }
            Err(_) => {
                error!(operation = name, "Tool execution panicked");
                ToolResult::err(json!({
                    "message": "Internal error while executing operation",
                    "operation": name,
                    "type": "internal_error",
                }))
            }
        }
    }

    fn rejection(err: OperationError) -> ToolResult {
        match err {
            OperationError::MissingOperation | OperationError::UnknownOperation(_) => {
                ToolResult::err(json!({
                    "message": err.to_string(),
                    "valid_operations": VALID_OPERATIONS,
                }))
            }
            OperationError::MissingField(_) | OperationError::InvalidField { .. } => {
                ToolResult::err(json!({ "message": err.to_string() }))
            }
        }
    }

    fn unknown_provider(&self, provider: &str) -> ToolResult {
        ToolResult::err(json!({
            "message": format!("Unknown provider: {}", provider),
            "available_providers": self.orchestrator.provider_names(),
        }))
    }

    async fn run(&self, operation: Operation) -> Result<ToolResult> {
        match operation {
            Operation::Generate {
                prompt,
                output_path,
                preferred_api,
                params,
            } => {
                let result = self
                    .orchestrator
                    .generate(&prompt, &output_path, preferred_api.as_deref(), params)
                    .await;

                if result.success {
                    info!(provider = %result.provider_used, cost = result.cost, "Tool generated image");
                    Ok(ToolResult::ok(json!({
                        "success": true,
                        "api_used": result.provider_used,
                        "cost": result.cost,
                        "local_path": result.destination_path.display().to_string(),
                        "message": format!(
                            "Image generated successfully with {} (${:.3})",
                            result.provider_used, result.cost
                        ),
                    })))
                } else {
                    Ok(ToolResult::err(json!({
                        "message": result
                            .error
                            .unwrap_or_else(|| "Image generation failed".to_string()),
                        "api_used": result.provider_used,
                        "cost": result.cost,
                    })))
                }
            }
            Operation::CheckAvailability { provider } => {
                if !self.orchestrator.registry().contains(&provider) {
                    return Ok(self.unknown_provider(&provider));
                }

                let available = self.orchestrator.check_availability(&provider).await?;
                Ok(ToolResult::ok(json!({
                    "provider": provider,
                    "available": available,
                    "message": format!(
                        "{} is {}",
                        provider,
                        if available { "available" } else { "not available" }
                    ),
                })))
            }
            Operation::GetCostEstimate {
                provider,
                params,
                raw_params,
            } => {
                if !self.orchestrator.registry().contains(&provider) {
                    return Ok(self.unknown_provider(&provider));
                }

                let cost = self.orchestrator.cost_estimate(&provider, &params)?;
                Ok(ToolResult::ok(json!({
                    "provider": provider,
                    "cost_per_image": cost,
                    "currency": "USD",
                    "params": raw_params,
                    "message": format!("{} estimated cost: ${:.3} per image", provider, cost),
                })))
            }
        }
    }
}
