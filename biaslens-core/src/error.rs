//! Error types for the biaslens core library.
//!
//! Uses `thiserror` for public API error types. Run-level problems
//! (configuration, validation, backend setup) surface as [`AuditError`] and
//! abort the run before any backend call is made. Per-call failures surface as
//! [`CompletionError`] and are contained by the auditor as error-tagged text.

use std::path::PathBuf;

/// Top-level error type returned by audit runs.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Unknown scenario '{scenario}'. Available: {}", available.join(", "))]
    UnknownScenario {
        scenario: String,
        available: Vec<String>,
    },

    #[error("Unknown demographic group '{group}'. Available: {}", available.join(", "))]
    UnknownGroup { group: String, available: Vec<String> },

    #[error("Template error in scenario '{scenario}': {message}")]
    Template { scenario: String, message: String },

    #[error("Backend '{backend}' could not be initialized: {message}")]
    BackendInitialization { backend: String, message: String },

    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from a single backend completion call.
///
/// These never abort a run; the auditor renders them as `[ERROR: ...]` text.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from loading or validating configuration and catalogs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// A type alias for results using the top-level `AuditError`.
pub type Result<T> = std::result::Result<T, AuditError>;
