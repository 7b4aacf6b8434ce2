//! Weighted readiness aggregation (the VR model): sector-weighted,
//! confidence-weighted mean over the seven adjusted dimension scores.
//!
//! Confidences are floored at 0.20 so a zero-confidence dimension still
//! participates at reduced weight instead of vanishing from the average.
//! The result is a convex combination of the input scores.

use serde::Serialize;

use crate::config::SectorWeightProfile;
use crate::dimension::DimensionScore;
use crate::error::ConfigError;
use crate::score::DimensionBreakdownRow;

pub const CONFIDENCE_FLOOR: f64 = 0.20;

#[derive(Debug, Clone, Serialize)]
pub struct VrResult {
    pub vr_score: f64,
    /// One row per dimension; the contributions sum to `vr_score`.
    pub breakdown: Vec<DimensionBreakdownRow>,
}

/// `VR = sum(w * s * c_eff) / sum(w * c_eff)` with `c_eff = max(c, 0.20)`.
///
/// The profile is re-validated here so a hand-assembled profile fails with
/// the same `ConfigError` a bad file would.
pub fn aggregate_vr(
    scores: &[DimensionScore],
    profile: &SectorWeightProfile,
) -> Result<VrResult, ConfigError> {
    profile.validate()?;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for ds in scores {
        let w = profile.weight(ds.dimension);
        let c_eff = ds.confidence.max(CONFIDENCE_FLOOR);
        numerator += w * ds.score * c_eff;
        denominator += w * c_eff;
    }

    // Weights sum to 1 and every effective confidence is >= 0.20, so the
    // denominator is bounded away from zero for any non-empty score set.
    let vr_score = if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    };

    let breakdown = scores
        .iter()
        .map(|ds| {
            let w = profile.weight(ds.dimension);
            let c_eff = ds.confidence.max(CONFIDENCE_FLOOR);
            DimensionBreakdownRow {
                dimension: ds.dimension,
                score: ds.score,
                weight: w,
                confidence: ds.confidence,
                effective_confidence: c_eff,
                evidence_count: ds.evidence_count,
                contribution: if denominator > 0.0 {
                    w * ds.score * c_eff / denominator
                } else {
                    0.0
                },
            }
        })
        .collect();

    Ok(VrResult { vr_score, breakdown })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::Dimension;
    use std::collections::BTreeMap;

    fn equal_profile() -> SectorWeightProfile {
        let weights: BTreeMap<_, _> = Dimension::ALL
            .iter()
            .map(|d| (*d, 1.0 / Dimension::COUNT as f64))
            .collect();
        SectorWeightProfile {
            sector: "test".into(),
            weights,
            hr_baseline_delta: 0.0,
            version: 1,
        }
    }

    fn scores(values: [f64; 7], confidence: f64) -> Vec<DimensionScore> {
        Dimension::ALL
            .iter()
            .zip(values.iter())
            .map(|(d, v)| DimensionScore::new(*d, *v, 1.0 / 7.0, confidence))
            .collect()
    }

    #[test]
    fn uniform_confidence_reduces_to_weighted_mean() {
        // [70, 60, 55, 80, 65, 50, 60] at equal weights: 440 / 7 = 62.857...
        let input = scores([70.0, 60.0, 55.0, 80.0, 65.0, 50.0, 60.0], 0.9);
        let out = aggregate_vr(&input, &equal_profile()).unwrap();
        assert!((out.vr_score - 440.0 / 7.0).abs() < 1e-9, "got {}", out.vr_score);
    }

    #[test]
    fn result_stays_within_score_hull() {
        let input = scores([10.0, 95.0, 40.0, 73.0, 22.0, 61.0, 58.0], 0.4);
        let out = aggregate_vr(&input, &equal_profile()).unwrap();
        assert!(out.vr_score >= 10.0 && out.vr_score <= 95.0);
    }

    #[test]
    fn zero_confidence_dimension_still_contributes() {
        let mut input = scores([80.0; 7], 0.9);
        input[3].confidence = 0.0;
        input[3].score = 0.0;
        let out = aggregate_vr(&input, &equal_profile()).unwrap();
        // The floored dimension drags the mean below 80 but cannot erase itself.
        assert!(out.vr_score < 80.0);
        let row = &out.breakdown[3];
        assert_eq!(row.effective_confidence, CONFIDENCE_FLOOR);
        assert_eq!(row.confidence, 0.0);
    }

    #[test]
    fn raising_one_score_never_lowers_the_aggregate() {
        let base = scores([50.0, 60.0, 40.0, 70.0, 55.0, 45.0, 65.0], 0.7);
        let out_base = aggregate_vr(&base, &equal_profile()).unwrap();

        let mut bumped = base.clone();
        bumped[2].score += 15.0;
        let out_bumped = aggregate_vr(&bumped, &equal_profile()).unwrap();
        assert!(out_bumped.vr_score > out_base.vr_score);
    }

    #[test]
    fn contributions_sum_to_the_score() {
        let input = scores([70.0, 60.0, 55.0, 80.0, 65.0, 50.0, 60.0], 0.35);
        let out = aggregate_vr(&input, &equal_profile()).unwrap();
        let sum: f64 = out.breakdown.iter().map(|r| r.contribution).sum();
        assert!((sum - out.vr_score).abs() < 1e-9);
    }

    #[test]
    fn invalid_profile_is_rejected_at_the_operation() {
        let mut profile = equal_profile();
        profile.weights.insert(Dimension::TalentSkills, 0.5);
        let input = scores([50.0; 7], 0.8);
        let err = aggregate_vr(&input, &profile).unwrap_err();
        assert!(matches!(err, ConfigError::WeightSum { .. }));
    }
}
