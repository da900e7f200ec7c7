//! Shared HTTP plumbing for provider clients

use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};

/// Build the HTTP client for a provider. A timeout is only set when configured.
pub fn build_client(config: &ProviderConfig) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout_ms) = config.timeout_ms {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }

    builder
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Configured base URL without a trailing slash, or the provider default
pub fn base_url(config: &ProviderConfig, default: &str) -> String {
    config
        .base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

/// Map a transport error onto the remote-call taxonomy
pub fn transport_error(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_connect() || err.is_timeout() {
        AppError::RemoteCall(format!("Connection to {} failed: {}", provider, err))
    } else {
        AppError::HttpClient(err)
    }
}

/// Turn a non-2xx response into an error carrying the body
pub async fn ensure_success(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::RemoteCall(format!(
        "{} returned {}: {}",
        provider, status, body
    )))
}

/// Check the status and parse the body as JSON
pub async fn read_json(provider: &str, response: Response) -> Result<Value> {
    let response = ensure_success(provider, response).await?;
    response
        .json::<Value>()
        .await
        .map_err(|e| AppError::RemoteCall(format!("Failed to parse {} response: {}", provider, e)))
}
