//! score.rs — result model: the composite score record, its explainability
//! breakdown, and the run lifecycle types the store keeps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dimension::{Dimension, ScoreBand};

/// Version tag written into every run record and score. Bump when the
/// pipeline math changes in a way that makes scores incomparable.
pub const MODEL_VERSION: &str = "v2.1";

/// One row of the per-dimension explainability breakdown emitted by the
/// weighted aggregation stage. Scores here are post-adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionBreakdownRow {
    pub dimension: Dimension,
    pub score: f64,
    pub weight: f64,
    /// Confidence as assessed, before flooring.
    pub confidence: f64,
    /// Confidence actually used by the aggregation (floored).
    pub effective_confidence: f64,
    pub evidence_count: u32,
    /// `weight * score * effective_confidence / sum(weight * effective_confidence)`.
    pub contribution: f64,
}

/// How the confidence interval was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemMethod {
    OneFactor,
    ConfidenceFallback,
}

impl SemMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemMethod::OneFactor => "one_factor",
            SemMethod::ConfidenceFallback => "confidence_fallback",
        }
    }
}

/// The final per-company record. Exactly one per (company, run); never
/// updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgAirScore {
    pub company_id: String,
    pub assessment_id: Uuid,
    pub scoring_run_id: Uuid,
    pub vr_score: f64,
    pub synergy_bonus: f64,
    /// Multiplicative talent-concentration factor, 1.0 when no penalty.
    pub talent_penalty: f64,
    pub composite_score: f64,
    pub score_band: ScoreBand,
    pub sem_lower: f64,
    pub sem_upper: f64,
    pub sem_method: SemMethod,
    pub dimension_breakdown: Vec<DimensionBreakdownRow>,
    pub model_version: String,
    pub scored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// One batch invocation of the pipeline over a set of companies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub model_version: String,
    /// Company list, config digest and versions, concurrency cap.
    pub parameters: Value,
    pub status: RunStatus,
}

impl ScoringRun {
    pub fn begin(parameters: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            model_version: MODEL_VERSION.to_string(),
            parameters,
            status: RunStatus::Running,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Scored,
    Failed,
    Skipped,
}

/// Per-company outcome reported by a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyOutcome {
    pub company_id: String,
    pub status: CompanyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompanyOutcome {
    pub fn scored(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            status: CompanyStatus::Scored,
            error: None,
        }
    }

    pub fn failed(company_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            status: CompanyStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn skipped(company_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            status: CompanyStatus::Skipped,
            error: Some(reason.into()),
        }
    }
}
