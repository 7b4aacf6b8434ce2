//! Single-company pipeline: rubric scores in, audited composite out.
//!
//! Seven stages run in a fixed order and each one appends exactly one audit
//! entry with full input/output snapshots. A stage failure stops the
//! pipeline, keeps everything recorded so far and adds one terminal failure
//! entry at the stage that broke; the caller decides what to persist.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::{AuditLogEntry, AuditStep, AuditTrail};
use crate::config::ScoringConfig;
use crate::dimension::DimensionScore;
use crate::engine::{
    aggregate_vr, apply_hr_adjustment, assemble_composite, concentration_penalty,
    evaluate_synergy, score_dimensions, SemEstimator, CONFIDENCE_FLOOR, SYNERGY_CAP_ABS,
};
use crate::error::ScoringError;
use crate::evidence::AssessmentInput;
use crate::score::{OrgAirScore, MODEL_VERSION};

/// Successful pipeline result: the score plus its complete seven-entry trail.
#[derive(Debug)]
pub struct PipelineOutput {
    pub score: OrgAirScore,
    pub entries: Vec<AuditLogEntry>,
}

/// Failed pipeline result. `entries` holds everything recorded before the
/// failure plus the terminal failure entry; nothing is discarded.
#[derive(Debug)]
pub struct PipelineFailure {
    pub error: ScoringError,
    pub entries: Vec<AuditLogEntry>,
}

/// Run all seven stages for one company against one config snapshot.
///
/// Pure apart from timestamps: same input, same config and same fitted
/// estimator produce the same score and the same trail content.
pub fn score_company(
    scoring_run_id: Uuid,
    input: &AssessmentInput,
    config: &ScoringConfig,
    estimator: &SemEstimator,
) -> Result<PipelineOutput, PipelineFailure> {
    let mut trail = AuditTrail::new(scoring_run_id, &input.company_id);

    // Sector resolution happens before the first stage; an unknown sector
    // fails this company only.
    let profile = match config.sector(&input.sector) {
        Ok(p) => p,
        Err(e) => return Err(fail(trail, AuditStep::Rubric, e.into())),
    };

    // 1) Rubric: evidence signals -> seven dimension scores with confidence.
    let outcomes = score_dimensions(input, &config.rubric);
    let scores: Vec<DimensionScore> = outcomes
        .iter()
        .map(|o| {
            DimensionScore::new(o.dimension, o.score, profile.weight(o.dimension), o.confidence)
                .with_evidence_count(o.evidence_count)
        })
        .collect();
    trail.record(
        AuditStep::Rubric,
        json!({
            "sector": input.sector,
            "signal_counts": signal_counts(input),
            "recency_window_days": config.rubric.recency_window_days,
            "rubric_version": config.rubric.version,
        }),
        json!({ "outcomes": snapshot(&outcomes) }),
    );

    // 2) HR adjustment: sector hiring baseline onto talent_skills only.
    let (adjusted, adjustment) = apply_hr_adjustment(&scores, profile, input.position_factor);
    if let Err(e) = ScoringError::ensure_bound(
        AuditStep::HrAdjustment,
        adjustment.adjusted_score,
        0.0,
        100.0,
    ) {
        return Err(fail(trail, AuditStep::HrAdjustment, e));
    }
    trail.record(
        AuditStep::HrAdjustment,
        json!({
            "position_factor": input.position_factor,
            "hr_baseline_delta": profile.hr_baseline_delta,
            "sector_version": profile.version,
        }),
        snapshot(&adjustment),
    );

    // 3) Weighted aggregation with the confidence floor.
    let vr = match aggregate_vr(&adjusted, profile) {
        Ok(v) => v,
        Err(e) => return Err(fail(trail, AuditStep::VrModel, e.into())),
    };
    let vr_score = match ScoringError::ensure_bound(AuditStep::VrModel, vr.vr_score, 0.0, 100.0) {
        Ok(v) => v,
        Err(e) => return Err(fail(trail, AuditStep::VrModel, e)),
    };
    trail.record(
        AuditStep::VrModel,
        json!({
            "sector": profile.sector,
            "sector_version": profile.version,
            "confidence_floor": CONFIDENCE_FLOOR,
        }),
        snapshot(&vr),
    );

    // 4) Synergy rules over the adjusted scores, one aggregate clamp.
    let synergy = evaluate_synergy(&adjusted, &config.synergy_rules);
    let synergy_bonus = match ScoringError::ensure_bound(
        AuditStep::Synergy,
        synergy.bonus,
        -SYNERGY_CAP_ABS,
        SYNERGY_CAP_ABS,
    ) {
        Ok(v) => v,
        Err(e) => return Err(fail(trail, AuditStep::Synergy, e)),
    };
    trail.record(
        AuditStep::Synergy,
        json!({
            "rules": config.synergy_rules.len(),
            "rules_version": config.synergy_version,
            "cap_abs": SYNERGY_CAP_ABS,
        }),
        snapshot(&synergy),
    );

    // 5) Talent concentration penalty from the job-function mix.
    let concentration = concentration_penalty(&input.job_function_counts, &config.talent_penalty);
    let penalty_factor = match ScoringError::ensure_bound(
        AuditStep::TalentConcentration,
        concentration.factor,
        0.0,
        1.0,
    ) {
        Ok(v) => v,
        Err(e) => return Err(fail(trail, AuditStep::TalentConcentration, e)),
    };
    trail.record(
        AuditStep::TalentConcentration,
        json!({
            "job_function_counts": input.job_function_counts,
            "min_sample_size": config.talent_penalty.min_sample_size,
            "penalty_version": config.talent_penalty.version,
        }),
        snapshot(&concentration),
    );

    // 6) Confidence interval around the assembled composite.
    let assembled = assemble_composite(vr_score, synergy_bonus, penalty_factor);
    let interval = estimator.interval(assembled.composite, &adjusted);
    trail.record(
        AuditStep::Sem,
        json!({
            "composite": assembled.composite,
            "fitted": estimator.is_fitted(),
            "sem_version": config.sem.version,
            "diagnostics": snapshot(&estimator.diagnostics()),
        }),
        snapshot(&interval),
    );

    // 7) Final assembly and the score record itself.
    let composite_score =
        match ScoringError::ensure_bound(AuditStep::Final, assembled.composite, 0.0, 100.0) {
            Ok(v) => v,
            Err(e) => return Err(fail(trail, AuditStep::Final, e)),
        };
    let score = OrgAirScore {
        company_id: input.company_id.clone(),
        assessment_id: input.assessment_id,
        scoring_run_id,
        vr_score,
        synergy_bonus,
        talent_penalty: penalty_factor,
        composite_score,
        score_band: assembled.band,
        sem_lower: interval.lower,
        sem_upper: interval.upper,
        sem_method: interval.method,
        dimension_breakdown: vr.breakdown,
        model_version: MODEL_VERSION.to_string(),
        scored_at: chrono::Utc::now(),
    };
    trail.record(
        AuditStep::Final,
        json!({
            "vr_score": vr_score,
            "synergy_bonus": synergy_bonus,
            "talent_penalty": penalty_factor,
            "model_version": MODEL_VERSION,
            "pins": config.version_pins(),
        }),
        json!({
            "composite_score": composite_score,
            "score_band": score.score_band,
            "sem_lower": interval.lower,
            "sem_upper": interval.upper,
            "sem_method": interval.method,
            "clamped": assembled.clamped,
        }),
    );

    tracing::debug!(
        company = %input.company_id,
        vr = vr_score,
        synergy = synergy_bonus,
        penalty = penalty_factor,
        composite = composite_score,
        "pipeline complete"
    );

    Ok(PipelineOutput {
        score,
        entries: trail.into_entries(),
    })
}

fn fail(mut trail: AuditTrail, step: AuditStep, error: ScoringError) -> PipelineFailure {
    trail.record_failure(step, &error.to_string());
    PipelineFailure {
        error,
        entries: trail.into_entries(),
    }
}

/// Serialize a snapshot value; `Null` stands in if serialization is refused.
fn snapshot<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn signal_counts(input: &AssessmentInput) -> Value {
    let counts: serde_json::Map<String, Value> = input
        .signals
        .iter()
        .map(|(d, s)| (d.as_str().to_string(), json!(s.len())))
        .collect();
    Value::Object(counts)
}
