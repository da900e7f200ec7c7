//! Parsing of named-operation requests

use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

use crate::provider::traits::GenerationParams;

/// Operations understood by the dispatcher
pub const VALID_OPERATIONS: [&str; 3] = ["generate", "check_availability", "get_cost_estimate"];

/// Caller errors found while reading a request
#[derive(Debug, Error, PartialEq)]
pub enum OperationError {
    #[error("Missing 'operation' field in input")]
    MissingOperation,

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Missing required field: '{0}'")]
    MissingField(&'static str),

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// A validated request
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Generate {
        prompt: String,
        output_path: PathBuf,
        preferred_api: Option<String>,
        params: Option<GenerationParams>,
    },
    CheckAvailability {
        provider: String,
    },
    GetCostEstimate {
        provider: String,
        params: GenerationParams,
        /// Parameters as given, echoed back to the caller
        raw_params: Value,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Generate { .. } => "generate",
            Operation::CheckAvailability { .. } => "check_availability",
            Operation::GetCostEstimate { .. } => "get_cost_estimate",
        }
    }

    /// Read an operation from a JSON request object
    pub fn parse(input: &Value) -> Result<Self, OperationError> {
        let operation = input
            .get("operation")
            .and_then(Value::as_str)
            .filter(|op| !op.is_empty())
            .ok_or(OperationError::MissingOperation)?;

        match operation {
            "generate" => {
                let prompt = required_str(input, "prompt")?;
                let output_path = required_str(input, "output_path")?;
                Ok(Operation::Generate {
                    prompt: prompt.to_string(),
                    output_path: PathBuf::from(output_path),
                    preferred_api: optional_str(input, "preferred_api")
                        .map(|name| resolve_alias(name).to_string()),
                    params: parse_params(input.get("params"))?,
                })
            }
            "check_availability" => Ok(Operation::CheckAvailability {
                provider: resolve_alias(required_str(input, "provider")?).to_string(),
            }),
            "get_cost_estimate" => {
                let raw_params = match input.get("params") {
                    Some(Value::Null) | None => Value::Object(Map::new()),
                    Some(value) => value.clone(),
                };
                Ok(Operation::GetCostEstimate {
                    provider: resolve_alias(required_str(input, "provider")?).to_string(),
                    params: parse_params(Some(&raw_params))?.unwrap_or_default(),
                    raw_params,
                })
            }
            other => Err(OperationError::UnknownOperation(other.to_string())),
        }
    }
}

/// Map vendor names onto their default provider
pub fn resolve_alias(name: &str) -> &str {
    match name {
        "openai" => "dalle",
        "google" => "imagen",
        other => other,
    }
}

fn required_str<'a>(input: &'a Value, field: &'static str) -> Result<&'a str, OperationError> {
    input
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or(OperationError::MissingField(field))
}

fn optional_str<'a>(input: &'a Value, field: &str) -> Option<&'a str> {
    input
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn parse_params(value: Option<&Value>) -> Result<Option<GenerationParams>, OperationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| OperationError::InvalidField {
                field: "params",
                reason: e.to_string(),
            }),
    }
}
