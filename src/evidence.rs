//! evidence.rs — inputs handed to the pipeline by an `EvidenceProvider`.
//!
//! Keyword extraction and document handling happen upstream; by the time a
//! signal reaches this crate it is already reduced to kind, age, and the
//! rubric keywords it matched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::dimension::{Dimension, JobFunctionCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Filing,
    JobPosting,
    News,
    Patent,
    TechSignal,
}

/// One pre-extracted evidence item attributed to a single dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSignal {
    pub kind: EvidenceKind,
    /// Age at assessment time. Signals older than the rubric recency window
    /// are ignored by the scorer.
    pub age_days: u32,
    /// Lowercased rubric keywords found in the source document.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Everything the pipeline needs to score one company once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentInput {
    pub company_id: String,
    pub assessment_id: Uuid,
    /// Must name a `[sectors.*]` profile in the config snapshot.
    pub sector: String,
    /// Hiring-posture multiplier for the talent baseline delta, typically
    /// around 1.0. Supplied by the provider, not derived here.
    pub position_factor: f64,
    #[serde(default)]
    pub signals: BTreeMap<Dimension, Vec<EvidenceSignal>>,
    #[serde(default)]
    pub job_function_counts: JobFunctionCounts,
}

impl AssessmentInput {
    pub fn signals_for(&self, dimension: Dimension) -> &[EvidenceSignal] {
        self.signals
            .get(&dimension)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Historical assessments used to fit the confidence model: one row of seven
/// dimension scores (in `Dimension::ALL` order) plus the composite observed
/// for that assessment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferencePopulation {
    pub dimension_rows: Vec<[f64; 7]>,
    pub composites: Vec<f64>,
}

impl ReferencePopulation {
    pub fn len(&self) -> usize {
        self.dimension_rows.len().min(self.composites.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_row(&mut self, row: [f64; 7], composite: f64) {
        self.dimension_rows.push(row);
        self.composites.push(composite);
    }
}
