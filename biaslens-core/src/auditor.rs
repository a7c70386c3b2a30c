//! Audit orchestration.
//!
//! One run: validate the request, expand the prompt matrix, query the backend
//! for every prompt, compute the three metric families, and assemble the
//! report. Run-level problems abort before any backend call; per-call
//! failures are contained as error-tagged response text.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::{AuditConfig, RunConfig, ThresholdConfig};
use crate::error::{AuditError, ConfigError, Result};
use crate::matrix;
use crate::metrics;
use crate::providers::{Backend, BackendInfo, CompletionProvider};
use crate::report::{AuditMetrics, AuditParameters, AuditReport, AuditSummary};
use crate::types::{CompletionRequest, PromptInstance, ResponseRecord};

/// Accepted sampling temperature range.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;
/// Accepted completion length range, in tokens.
pub const MAX_TOKENS_RANGE: std::ops::RangeInclusive<u32> = 50..=2000;

/// Parameters for a single audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub scenario: String,
    /// Model override; the backend's default when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Group labels to include; all groups when absent or empty.
    #[serde(default)]
    pub attributes: Option<Vec<String>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl AuditRequest {
    /// A request for `scenario` using the default run parameters.
    pub fn new(scenario: impl Into<String>) -> Self {
        Self::with_run_defaults(scenario, &RunConfig::default())
    }

    pub fn with_run_defaults(scenario: impl Into<String>, run: &RunConfig) -> Self {
        Self {
            scenario: scenario.into(),
            model: None,
            attributes: None,
            temperature: run.temperature,
            max_tokens: run.max_tokens,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn attributes<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Check sampling parameters against the accepted ranges.
    pub fn validate(&self) -> Result<()> {
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(AuditError::InvalidParameter {
                name: "temperature".into(),
                message: format!(
                    "{} is outside {}..={}",
                    self.temperature,
                    TEMPERATURE_RANGE.start(),
                    TEMPERATURE_RANGE.end()
                ),
            });
        }
        if !MAX_TOKENS_RANGE.contains(&self.max_tokens) {
            return Err(AuditError::InvalidParameter {
                name: "max_tokens".into(),
                message: format!(
                    "{} is outside {}..={}",
                    self.max_tokens,
                    MAX_TOKENS_RANGE.start(),
                    MAX_TOKENS_RANGE.end()
                ),
            });
        }
        Ok(())
    }
}

/// Runs audits against one backend and one catalog.
///
/// An `Auditor` holds no per-run state, so a single instance can serve any
/// number of concurrent runs.
pub struct Auditor {
    backend: Backend,
    catalog: Arc<Catalog>,
    thresholds: ThresholdConfig,
    max_concurrency: usize,
}

impl Auditor {
    /// Create an auditor, rejecting catalogs that break the balance or
    /// placeholder invariants.
    pub fn new(
        backend: Backend,
        catalog: Arc<Catalog>,
        thresholds: ThresholdConfig,
    ) -> Result<Self> {
        catalog.validate()?;
        Ok(Self {
            backend,
            catalog,
            thresholds,
            max_concurrency: 1,
        })
    }

    /// Set how many completions may be in flight at once (minimum 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Build an auditor from loaded configuration.
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        if config.run.max_concurrency == 0 {
            return Err(ConfigError::invalid("run.max_concurrency must be at least 1").into());
        }
        for warning in config.thresholds.validate() {
            warn!("{warning}");
        }

        let catalog = match &config.catalog_path {
            Some(path) => {
                debug!(path = %path.display(), "Loading scenario catalog");
                Catalog::from_file(path)?
            }
            None => Catalog::reference(),
        };

        let backend = Backend::from_config(&config.backend)?;
        Ok(Self::new(backend, Arc::new(catalog), config.thresholds)?
            .with_max_concurrency(config.run.max_concurrency))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Scenario keys in declared order.
    pub fn available_scenarios(&self) -> Vec<String> {
        self.catalog.scenario_keys()
    }

    pub fn backend_info(&self) -> BackendInfo {
        self.backend.info()
    }

    /// Execute one audit run.
    ///
    /// Returns `Err` only for run-level problems, all of which are detected
    /// before the first backend call. Failed completions appear in the report
    /// as `[ERROR: ...]` responses and still count toward the metrics.
    pub async fn run(&self, request: &AuditRequest) -> Result<AuditReport> {
        request.validate()?;

        let model = request
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.backend.default_model().to_string());

        let prompts = matrix::generate(
            &self.catalog,
            &request.scenario,
            request.attributes.as_deref(),
        )?;

        let audit_id = Uuid::new_v4().to_string();
        info!(
            audit_id = %audit_id,
            scenario = %request.scenario,
            backend = self.backend.name(),
            model = %model,
            prompts = prompts.len(),
            "Starting audit"
        );

        let responses: Vec<ResponseRecord> = stream::iter(&prompts)
            .map(|prompt| self.query(prompt, &model, request))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let num_failed = responses.iter().filter(|r| r.is_error()).count();

        let metrics = AuditMetrics {
            length_disparity: metrics::length_disparity(&responses, &self.thresholds.length),
            refusal_disparity: metrics::refusal_disparity(&responses, &self.thresholds.refusal),
            sentiment_disparity: metrics::sentiment_disparity(
                &responses,
                &self.thresholds.sentiment,
            ),
        };
        let summary = AuditSummary::from_metrics(&metrics, &self.thresholds);

        info!(
            audit_id = %audit_id,
            failed = num_failed,
            assessment = %summary.overall_assessment,
            "Audit complete"
        );

        Ok(AuditReport {
            audit_id,
            timestamp: Utc::now(),
            backend: self.backend.name().to_string(),
            model,
            scenario: request.scenario.clone(),
            num_prompts: prompts.len(),
            num_failed,
            parameters: AuditParameters {
                temperature: request.temperature,
                max_tokens: request.max_tokens,
            },
            metrics,
            responses,
            summary,
        })
    }

    /// Complete one prompt, converting any failure into an error-tagged record.
    async fn query(
        &self,
        prompt: &PromptInstance,
        model: &str,
        request: &AuditRequest,
    ) -> ResponseRecord {
        let completion =
            CompletionRequest::for_prompt(prompt, model, request.temperature, request.max_tokens);
        match self.backend.complete(&completion).await {
            Ok(text) => ResponseRecord::new(&prompt.group, &prompt.name, text),
            Err(e) => {
                warn!(group = %prompt.group, name = %prompt.name, error = %e, "Completion failed");
                ResponseRecord::failed(prompt, e)
            }
        }
    }
}
