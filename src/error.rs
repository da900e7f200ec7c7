//! Common error types for the image generation orchestrator

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("{provider} API key not configured. Please set {env_var} environment variable.")]
    ProviderNotConfigured { provider: String, env_var: String },

    #[error("Remote call failed: {0}")]
    RemoteCall(String),

    #[error("No image data in {0} response")]
    EmptyResponse(String),

    #[error("No images generated: {0}")]
    NoImagesGenerated(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used for retry and envelope decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials absent or invalid; detected before any network call
    Configuration,
    /// Failure during the exchange with a remote provider
    RemoteCall,
    /// Malformed caller input
    Validation,
    /// Anything else
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration_error",
            ErrorKind::RemoteCall => "remote_call_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ProviderNotConfigured { .. } => ErrorKind::Configuration,
            AppError::RemoteCall(_)
            | AppError::EmptyResponse(_)
            | AppError::HttpClient(_)
            | AppError::NoImagesGenerated(_) => ErrorKind::RemoteCall,
            AppError::ProviderNotFound(_) | AppError::InvalidRequest(_) => ErrorKind::Validation,
            AppError::Config(_) | AppError::Io(_) | AppError::Json(_) | AppError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// True when the failure is a missing or unusable credential
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// Error response format (OpenAI compatible)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::ProviderNotConfigured { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, Some("provider_not_configured"))
            }
            AppError::RemoteCall(_) | AppError::EmptyResponse(_) | AppError::HttpClient(_) => {
                (StatusCode::BAD_GATEWAY, None)
            }
            AppError::NoImagesGenerated(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, Some("no_images_generated"))
            }
            AppError::ProviderNotFound(_) => (StatusCode::NOT_FOUND, Some("provider_not_found")),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, Some("invalid_json")),
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: self.kind().as_str().to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
