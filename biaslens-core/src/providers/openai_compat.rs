//! OpenAI-compatible chat completions backend.
//!
//! Supports OpenAI, Azure OpenAI, vLLM, LM Studio, and any endpoint that
//! follows the OpenAI chat completions API format.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::debug;

use super::{CompletionProvider, http_client, map_transport_error};
use crate::config::BackendConfig;
use crate::error::{AuditError, CompletionError};
use crate::types::CompletionRequest;

/// OpenAI-compatible completion backend.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider from configuration.
    ///
    /// Uses `config.api_key` if set, otherwise reads the environment variable
    /// named by `config.api_key_env`. Local endpoints (localhost / 127.0.0.1)
    /// get a placeholder bearer token when no key is configured.
    pub fn new(config: &BackendConfig) -> Result<Self, AuditError> {
        let base_url = config
            .resolved_base_url()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let is_local = base_url.contains("localhost") || base_url.contains("127.0.0.1");

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                if is_local {
                    debug!("No API key set for local endpoint; using placeholder bearer token");
                    Some("local".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| AuditError::BackendInitialization {
                backend: config.kind.to_string(),
                message: format!(
                    "OpenAI backend requires an API key via config or the {} environment variable",
                    config.api_key_env
                ),
            })?;

        Ok(Self {
            client: http_client(config)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.resolved_model(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Build the JSON body for a chat completions request.
    fn request_body(request: &CompletionRequest) -> Value {
        json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false,
        })
    }

    /// Extract the reply text from a response body.
    ///
    /// Uses `choices[0].message.content`, or the `refusal` text when the
    /// endpoint declined and left `content` null.
    fn parse_response(body: &Value) -> Result<String, CompletionError> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| CompletionError::ResponseParse {
                message: "No choices in response".to_string(),
            })?;

        ["content", "refusal"]
            .iter()
            .find_map(|field| message.get(*field).and_then(|v| v.as_str()))
            .map(str::to_string)
            .ok_or_else(|| CompletionError::ResponseParse {
                message: "Message has neither content nor refusal text".to_string(),
            })
    }

    fn map_http_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> CompletionError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::AuthFailed {
                provider: "openai".to_string(),
            },
            StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(5),
            },
            _ => CompletionError::ApiRequest {
                message: format!("HTTP {status}: {body}"),
            },
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(request);

        debug!(url = %url, model = %request.model, "Sending OpenAI completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let response_body = response
            .text()
            .await
            .map_err(|e| CompletionError::ApiRequest {
                message: format!("Failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, retry_after, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| CompletionError::ResponseParse {
                message: format!("Invalid JSON: {e}"),
            })?;

        Self::parse_response(&json)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn base_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }
}
