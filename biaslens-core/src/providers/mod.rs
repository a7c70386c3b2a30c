//! Model backends.
//!
//! Every backend exposes one capability: complete a system + user prompt pair
//! and return the raw text. Concrete implementations:
//! - OpenAI-compatible chat completions (OpenAI, Azure, vLLM, LM Studio)
//! - Ollama native chat API
//! - A deterministic mock for offline runs
//!
//! The set is closed: [`Backend`] is chosen once from configuration via
//! [`Backend::from_config`] and dispatches to the selected variant.

pub mod mock;
pub mod ollama;
pub mod openai_compat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{BackendConfig, BackendKind};
use crate::error::{AuditError, CompletionError};
use crate::types::CompletionRequest;

pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatibleProvider;

/// The single capability the auditor needs from a model backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete one prompt pair and return the model's text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    /// Short backend identifier reported in audit reports (e.g. "ollama").
    fn name(&self) -> &str;

    /// Model used when a request does not name one.
    fn default_model(&self) -> &str;

    /// Endpoint this backend talks to, if it talks to one.
    fn base_url(&self) -> Option<&str> {
        None
    }
}

/// Introspection data about the configured backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub backend: String,
    pub model: String,
    pub base_url: Option<String>,
}

/// The closed set of supported backends.
pub enum Backend {
    OpenAi(OpenAiCompatibleProvider),
    Ollama(OllamaProvider),
    Mock(MockProvider),
}

impl Backend {
    /// Build the backend selected by `config`.
    ///
    /// Fails with [`AuditError::BackendInitialization`] when credentials are
    /// missing or the HTTP client cannot be constructed.
    pub fn from_config(config: &BackendConfig) -> Result<Self, AuditError> {
        let backend = match config.kind {
            BackendKind::OpenAi => Backend::OpenAi(OpenAiCompatibleProvider::new(config)?),
            BackendKind::Ollama => Backend::Ollama(OllamaProvider::new(config)?),
            BackendKind::Mock => Backend::Mock(MockProvider::with_model(config.resolved_model())),
        };
        tracing::debug!(
            backend = backend.name(),
            model = backend.default_model(),
            "Initialized completion backend"
        );
        Ok(backend)
    }

    pub fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: self.name().to_string(),
            model: self.default_model().to_string(),
            base_url: self.base_url().map(str::to_string),
        }
    }

    fn inner(&self) -> &dyn CompletionProvider {
        match self {
            Backend::OpenAi(p) => p,
            Backend::Ollama(p) => p,
            Backend::Mock(p) => p,
        }
    }
}

#[async_trait]
impl CompletionProvider for Backend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.inner().complete(request).await
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn default_model(&self) -> &str {
        self.inner().default_model()
    }

    fn base_url(&self) -> Option<&str> {
        self.inner().base_url()
    }
}

/// Build the shared HTTP client used by the network backends.
pub(crate) fn http_client(config: &BackendConfig) -> Result<reqwest::Client, AuditError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AuditError::BackendInitialization {
            backend: config.kind.to_string(),
            message: format!("HTTP client setup failed: {e}"),
        })
}

/// Map a transport-level reqwest error to a completion error.
pub(crate) fn map_transport_error(err: reqwest::Error, timeout_secs: u64) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout { timeout_secs }
    } else if err.is_connect() {
        CompletionError::Connection {
            message: err.to_string(),
        }
    } else {
        CompletionError::ApiRequest {
            message: format!("Request failed: {err}"),
        }
    }
}
