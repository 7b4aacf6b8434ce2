//! error.rs — typed failure taxonomy for config loading and the pipeline.
//!
//! Fatality rules:
//! - `ConfigError` at snapshot load aborts the run before any company starts;
//!   raised during one company's resolution (unknown sector) it fails only
//!   that company.
//! - `InsufficientEvidence` never fails anything; it selects the documented
//!   degradation paths (confidence floor, SEM fallback).
//! - `NumericBoundViolation` fails the company, keeps its audit trail, and
//!   leaves sibling companies untouched.

use crate::audit::AuditStep;
use crate::dimension::Dimension;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("sector `{sector}`: weights sum to {sum:.6}, expected 1.0 within {tolerance}")]
    WeightSum {
        sector: String,
        sum: f64,
        tolerance: f64,
    },

    #[error("sector `{sector}`: missing weight for dimension `{dimension}`")]
    MissingDimensionWeight { sector: String, dimension: Dimension },

    #[error("sector `{sector}`: negative weight {weight} for dimension `{dimension}`")]
    NegativeWeight {
        sector: String,
        dimension: Dimension,
        weight: f64,
    },

    #[error("unknown sector profile `{sector}`")]
    UnknownSector { sector: String },

    #[error("talent penalty thresholds out of order: mild {mild} > severe {severe}")]
    PenaltyThresholdOrder { mild: f64, severe: f64 },

    #[error(
        "talent penalty factors out of order: require 0 < severe {severe} <= mild {mild} <= 1.0"
    )]
    PenaltyFactorOrder { mild: f64, severe: f64 },

    #[error("synergy rule `{rule}`: {field} must be non-negative, got {value}")]
    NegativeRuleValue {
        rule: String,
        field: &'static str,
        value: f64,
    },

    #[error("synergy rule `{rule}` pairs dimension `{dimension}` with itself")]
    SelfPairedRule { rule: String, dimension: Dimension },

    #[error("sem.min_reference_observations must be at least 2, got {got}")]
    SemMinObservations { got: usize },

    #[error("sem.fallback_base_se must be positive, got {got}")]
    SemFallbackBaseSe { got: f64 },

    #[error("sem.reliability_floor must be in (0, 1], got {got}")]
    SemReliabilityFloor { got: f64 },

    #[error("rubric.confidence_half_saturation must be positive, got {got}")]
    RubricHalfSaturation { got: f64 },
}

/// Not enough data for the strict path. Callers fall back, they do not abort.
#[derive(Debug, Clone, thiserror::Error)]
#[error("insufficient evidence for {what}: have {have}, need {need}")]
pub struct InsufficientEvidence {
    pub what: &'static str,
    pub have: usize,
    pub need: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("scoring run {run_id} not found")]
    RunNotFound { run_id: Uuid },

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Per-company pipeline failure. One of these fails exactly one company.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("stage {stage}: value {value} outside <{lo}, {hi}>")]
    NumericBoundViolation {
        stage: AuditStep,
        value: f64,
        lo: f64,
        hi: f64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScoringError {
    /// Bound check used after every numeric stage. NaN never passes.
    pub fn ensure_bound(
        stage: AuditStep,
        value: f64,
        lo: f64,
        hi: f64,
    ) -> Result<f64, ScoringError> {
        if value.is_finite() && value >= lo && value <= hi {
            Ok(value)
        } else {
            Err(ScoringError::NumericBoundViolation {
                stage,
                value,
                lo,
                hi,
            })
        }
    }
}
