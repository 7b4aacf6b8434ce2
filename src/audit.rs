//! audit.rs — append-only stage records for one company within one run.
//!
//! Every pipeline stage writes exactly one entry with full input/output
//! snapshots, so a composite score can be re-derived from its trail plus the
//! pinned config versions. Failed companies keep the entries written before
//! the failure plus one terminal failure entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStep {
    Rubric,
    HrAdjustment,
    VrModel,
    Synergy,
    TalentConcentration,
    Sem,
    Final,
}

impl AuditStep {
    pub const PIPELINE: [AuditStep; 7] = [
        AuditStep::Rubric,
        AuditStep::HrAdjustment,
        AuditStep::VrModel,
        AuditStep::Synergy,
        AuditStep::TalentConcentration,
        AuditStep::Sem,
        AuditStep::Final,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStep::Rubric => "rubric",
            AuditStep::HrAdjustment => "hr_adjustment",
            AuditStep::VrModel => "vr_model",
            AuditStep::Synergy => "synergy",
            AuditStep::TalentConcentration => "talent_concentration",
            AuditStep::Sem => "sem",
            AuditStep::Final => "final",
        }
    }
}

impl std::fmt::Display for AuditStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub scoring_run_id: Uuid,
    pub company_id: String,
    pub step: AuditStep,
    pub input: Value,
    pub output: Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn failed(&self) -> bool {
        self.output
            .get("failed")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Collects entries for one company while its pipeline runs.
#[derive(Debug)]
pub struct AuditTrail {
    scoring_run_id: Uuid,
    company_id: String,
    entries: Vec<AuditLogEntry>,
}

impl AuditTrail {
    pub fn new(scoring_run_id: Uuid, company_id: impl Into<String>) -> Self {
        Self {
            scoring_run_id,
            company_id: company_id.into(),
            entries: Vec::with_capacity(AuditStep::PIPELINE.len()),
        }
    }

    pub fn record(&mut self, step: AuditStep, input: Value, output: Value) {
        self.entries.push(AuditLogEntry {
            scoring_run_id: self.scoring_run_id,
            company_id: self.company_id.clone(),
            step,
            input,
            output,
            recorded_at: Utc::now(),
        });
    }

    /// Terminal entry for a failed company. Prior entries stay in place.
    pub fn record_failure(&mut self, step: AuditStep, error: &str) {
        self.record(
            step,
            Value::Null,
            json!({ "failed": true, "error": error }),
        );
    }

    pub fn entries(&self) -> &[AuditLogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<AuditLogEntry> {
        self.entries
    }
}

/// True when `entries` carries the full seven-stage pipeline in order.
pub fn is_complete_trail(entries: &[AuditLogEntry]) -> bool {
    entries.len() == AuditStep::PIPELINE.len()
        && entries
            .iter()
            .zip(AuditStep::PIPELINE.iter())
            .all(|(e, s)| e.step == *s && !e.failed())
}
