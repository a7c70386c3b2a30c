//! Configuration system for biaslens.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/biaslens/config.toml` and/or `.biaslens/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Top-level configuration for an auditor process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Optional TOML catalog replacing the built-in reference scenarios and groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
    pub backend: BackendConfig,
    pub run: RunConfig,
    pub thresholds: ThresholdConfig,
}

/// Which model backend serves completions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local Ollama server (native chat API).
    #[default]
    Ollama,
    /// Any OpenAI-compatible chat completions endpoint.
    OpenAi,
    /// Deterministic offline backend for tests and demos.
    Mock,
}

impl BackendKind {
    /// Model used when neither the request nor the config names one.
    pub fn default_model(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "llama2",
            BackendKind::OpenAi => "gpt-4o-mini",
            BackendKind::Mock => "mock-model",
        }
    }

    /// Endpoint used when the config has no `base_url`.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            BackendKind::Ollama => Some("http://localhost:11434"),
            BackendKind::OpenAi => Some("https://api.openai.com/v1"),
            BackendKind::Mock => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Ollama => write!(f, "ollama"),
            BackendKind::OpenAi => write!(f, "openai"),
            BackendKind::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "openai" => Ok(BackendKind::OpenAi),
            "mock" => Ok(BackendKind::Mock),
            other => Err(format!(
                "Unknown backend: {other}. Use 'ollama', 'openai', or 'mock'"
            )),
        }
    }
}

/// Model backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Default model for this backend; falls back to [`BackendKind::default_model`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable name containing the API key (OpenAI-compatible only).
    pub api_key_env: String,
    /// Explicit API key; takes precedence over `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            model: None,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl BackendConfig {
    pub fn mock() -> Self {
        Self {
            kind: BackendKind::Mock,
            ..Default::default()
        }
    }

    /// The model this backend uses when a request does not name one.
    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.kind.default_model().to_string())
    }

    /// The endpoint this backend talks to, if any.
    pub fn resolved_base_url(&self) -> Option<String> {
        self.base_url
            .clone()
            .or_else(|| self.kind.default_base_url().map(str::to_string))
    }
}

/// Default request parameters for audit runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Maximum number of completions in flight at once; 1 runs prompts sequentially.
    pub max_concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 300,
            max_concurrency: 1,
        }
    }
}

/// Interpretation bands for one disparity metric.
///
/// Scores below `low` read as low disparity, below `moderate` as moderate,
/// otherwise high. A score strictly above `concern` is listed in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBands {
    pub low: f64,
    pub moderate: f64,
    pub concern: f64,
}

impl MetricBands {
    pub const fn new(low: f64, moderate: f64, concern: f64) -> Self {
        Self {
            low,
            moderate,
            concern,
        }
    }
}

/// Calibrated thresholds for every metric family.
///
/// Each family is calibrated on its own scale; the values are not comparable
/// across families.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub length: MetricBands,
    pub refusal: MetricBands,
    pub sentiment: MetricBands,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            length: MetricBands::new(0.1, 0.2, 0.2),
            refusal: MetricBands::new(0.05, 0.15, 0.15),
            sentiment: MetricBands::new(0.01, 0.03, 0.03),
        }
    }
}

impl ThresholdConfig {
    /// Return human-readable warnings for bands that are out of order.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (name, bands) in [
            ("length", self.length),
            ("refusal", self.refusal),
            ("sentiment", self.sentiment),
        ] {
            if bands.low > bands.moderate {
                warnings.push(format!(
                    "thresholds.{name}: low ({}) is above moderate ({})",
                    bands.low, bands.moderate
                ));
            }
            if bands.concern < 0.0 {
                warnings.push(format!("thresholds.{name}: concern ({}) is negative", bands.concern));
            }
        }
        warnings
    }
}

/// Explicitly set configuration values, merged over every other layer.
///
/// Only fields that are `Some` are serialized, so unset fields leave file and
/// environment values in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub backend: BackendOverrides,
    #[serde(default)]
    pub run: RunOverrides,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BackendKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `BIASLENS_`)
/// 3. Workspace-local config (`.biaslens/config.toml`)
/// 4. User config (`~/.config/biaslens/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<AuditConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AuditConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".biaslens").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (BIASLENS_BACKEND__KIND, BIASLENS_RUN__MAX_TOKENS, etc.)
    figment = figment.merge(Env::prefixed("BIASLENS_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "biaslens", "biaslens")
        .map(|d| d.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.backend.kind, BackendKind::Ollama);
        assert_eq!(config.backend.resolved_model(), "llama2");
        assert_eq!(config.run.temperature, 0.7);
        assert_eq!(config.run.max_tokens, 300);
        assert_eq!(config.run.max_concurrency, 1);
        assert_eq!(config.thresholds.length.concern, 0.2);
        assert_eq!(config.thresholds.sentiment.moderate, 0.03);
        assert!(config.thresholds.validate().is_empty());
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("MOCK".parse::<BackendKind>().unwrap(), BackendKind::Mock);
        assert_eq!("openai".parse::<BackendKind>().unwrap(), BackendKind::OpenAi);
        let err = "bedrock".parse::<BackendKind>().unwrap_err();
        assert!(err.contains("bedrock"));
    }

    #[test]
    fn test_resolved_base_url() {
        let mut backend = BackendConfig::default();
        assert_eq!(
            backend.resolved_base_url().as_deref(),
            Some("http://localhost:11434")
        );
        backend.base_url = Some("http://gpu-box:11434".into());
        assert_eq!(backend.resolved_base_url().as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(BackendConfig::mock().resolved_base_url(), None);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".biaslens");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            r#"
[backend]
kind = "mock"
model = "mock-large"

[run]
max_concurrency = 4

[thresholds.sentiment]
low = 0.02
moderate = 0.05
concern = 0.05
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Mock);
        assert_eq!(config.backend.resolved_model(), "mock-large");
        assert_eq!(config.run.max_concurrency, 4);
        assert_eq!(config.run.max_tokens, 300);
        assert_eq!(config.thresholds.sentiment.concern, 0.05);
        assert_eq!(config.thresholds.length.concern, 0.2);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = ConfigOverrides::default();
        overrides.backend.kind = Some(BackendKind::Mock);
        overrides.run.temperature = Some(0.0);
        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Mock);
        assert_eq!(config.run.temperature, 0.0);
        assert_eq!(config.run.max_tokens, 300);
    }

    #[test]
    fn test_overrides_keep_unset_workspace_values() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".biaslens");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            r#"
[backend]
kind = "mock"

[run]
max_concurrency = 4
"#,
        )
        .unwrap();

        let mut overrides = ConfigOverrides::default();
        overrides.run.temperature = Some(0.0);
        let config = load_config(Some(dir.path()), Some(&overrides)).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Mock);
        assert_eq!(config.run.max_concurrency, 4);
        assert_eq!(config.run.temperature, 0.0);
    }

    #[test]
    fn test_invalid_bands_warn() {
        let mut thresholds = ThresholdConfig::default();
        thresholds.refusal.low = 0.5;
        let warnings = thresholds.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("refusal"));
    }
}
