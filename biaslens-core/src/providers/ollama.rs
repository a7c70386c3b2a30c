//! Ollama backend using the native `/api/chat` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{CompletionProvider, http_client, map_transport_error};
use crate::config::BackendConfig;
use crate::error::{AuditError, CompletionError};
use crate::types::CompletionRequest;

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaProvider {
    pub fn new(config: &BackendConfig) -> Result<Self, AuditError> {
        let base_url = config
            .resolved_base_url()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self {
            client: http_client(config)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.resolved_model(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn request_body(request: &CompletionRequest) -> Value {
        json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        })
    }

    fn parse_response(body: &Value) -> Result<String, CompletionError> {
        if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
            return Err(CompletionError::ApiRequest {
                message: error.to_string(),
            });
        }
        body.get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| CompletionError::ResponseParse {
                message: "No message content in Ollama response".to_string(),
            })
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(url = %url, model = %request.model, "Sending Ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::ApiRequest {
                message: format!("Failed to read response body: {e}"),
            })?;

        // Ollama reports unknown models as 404 with a JSON error body.
        let json: Value = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                CompletionError::ResponseParse {
                    message: format!("Invalid JSON: {e}"),
                }
            } else {
                CompletionError::ApiRequest {
                    message: format!("HTTP {status}: {text}"),
                }
            }
        })?;

        Self::parse_response(&json)
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn base_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }
}
