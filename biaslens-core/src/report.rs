//! Audit report assembly and the plain-language summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ThresholdConfig;
use crate::metrics::{LengthDisparity, RefusalDisparity, SentimentDisparity};
use crate::types::ResponseRecord;

pub const CONCERNS_IDENTIFIED: &str = "Concerns identified";
pub const LOW_DISPARITY: &str = "Low disparity observed";

const REVIEW_RECOMMENDATION: &str = "Review detailed metrics and example responses before deployment";
const ACCEPTABLE_RECOMMENDATION: &str =
    "Disparity metrics are within acceptable ranges for tested scenarios";

/// Sampling parameters the run was executed with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuditParameters {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The three disparity metric families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditMetrics {
    pub length_disparity: LengthDisparity,
    pub refusal_disparity: RefusalDisparity,
    pub sentiment_disparity: SentimentDisparity,
}

/// Plain-language outcome of an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub overall_assessment: String,
    pub concerns: Vec<String>,
    pub recommendation: String,
}

impl AuditSummary {
    /// Derive the summary from computed metrics.
    ///
    /// A metric raises a concern when its (rounded) score is strictly above
    /// that metric's concern threshold. Concerns are listed in
    /// length, refusal, sentiment order.
    pub fn from_metrics(metrics: &AuditMetrics, thresholds: &ThresholdConfig) -> Self {
        let checks = [
            (
                metrics.length_disparity.disparity_score,
                thresholds.length.concern,
                "High length disparity detected",
            ),
            (
                metrics.refusal_disparity.disparity_score,
                thresholds.refusal.concern,
                "High refusal rate disparity detected",
            ),
            (
                metrics.sentiment_disparity.disparity_score,
                thresholds.sentiment.concern,
                "High sentiment disparity detected",
            ),
        ];

        let concerns: Vec<String> = checks
            .iter()
            .filter(|(score, concern, _)| score > concern)
            .map(|(_, _, message)| message.to_string())
            .collect();

        let (overall_assessment, recommendation) = if concerns.is_empty() {
            (LOW_DISPARITY, ACCEPTABLE_RECOMMENDATION)
        } else {
            (CONCERNS_IDENTIFIED, REVIEW_RECOMMENDATION)
        };

        Self {
            overall_assessment: overall_assessment.to_string(),
            concerns,
            recommendation: recommendation.to_string(),
        }
    }

    pub fn has_concerns(&self) -> bool {
        !self.concerns.is_empty()
    }
}

/// The complete, self-describing result of one audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub audit_id: String,
    pub timestamp: DateTime<Utc>,
    pub backend: String,
    pub model: String,
    pub scenario: String,
    pub num_prompts: usize,
    /// Responses whose backend call failed and carry an error tag.
    pub num_failed: usize,
    pub parameters: AuditParameters,
    pub metrics: AuditMetrics,
    /// Responses in prompt-matrix order.
    pub responses: Vec<ResponseRecord>,
    pub summary: AuditSummary,
}
