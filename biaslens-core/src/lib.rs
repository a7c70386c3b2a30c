//! # biaslens Core
//!
//! Demographic disparity auditing for large language model backends.
//!
//! An audit renders a fixed scenario prompt once per name in a set of
//! demographic groups, collects the model's answers, and measures how much
//! those answers differ between groups in length, refusal rate, and sentiment.
//!
//! The pipeline:
//! - [`catalog`]: scenario templates and demographic name lists
//! - [`matrix`]: expands one scenario into per-name prompts
//! - [`providers`]: OpenAI-compatible, Ollama, and mock backends
//! - [`auditor`]: drives a run and contains per-call failures
//! - [`metrics`]: the three disparity metric families
//! - [`report`]: the report and its plain-language summary

pub mod auditor;
pub mod catalog;
pub mod config;
pub mod error;
pub mod matrix;
pub mod metrics;
pub mod providers;
pub mod report;
pub mod types;

pub use auditor::{AuditRequest, Auditor};
pub use catalog::{Catalog, DemographicGroup, ScenarioTemplate};
pub use config::{AuditConfig, BackendConfig, BackendKind, RunConfig, ThresholdConfig, load_config};
pub use error::{AuditError, CompletionError, ConfigError, Result};
pub use metrics::{DisparityLevel, LengthDisparity, RefusalDisparity, SentimentDisparity};
pub use providers::{Backend, BackendInfo, CompletionProvider};
pub use report::{AuditMetrics, AuditParameters, AuditReport, AuditSummary};
pub use types::{CompletionRequest, PromptInstance, ResponseRecord};
