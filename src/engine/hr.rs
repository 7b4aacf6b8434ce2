//! HR / position adjustment. The sector hiring baseline, scaled by the
//! company's position factor, is added to `talent_skills` before weighted
//! aggregation. Every other dimension passes through bit-identical.

use serde::Serialize;

use crate::config::SectorWeightProfile;
use crate::dimension::{Dimension, DimensionScore};

/// What happened to the talent score, recorded verbatim in the audit trail.
/// `capped`/`floored` flag the clamp explicitly so no clipping is silent.
#[derive(Debug, Clone, Serialize)]
pub struct HrAdjustment {
    pub base_score: f64,
    pub hr_baseline_delta: f64,
    pub position_factor: f64,
    pub adjusted_score: f64,
    pub capped: bool,
    pub floored: bool,
}

/// Returns the adjusted score vector plus the adjustment record. The input
/// slice is not modified; the talent entry in the output is a fresh copy.
pub fn apply_hr_adjustment(
    scores: &[DimensionScore],
    profile: &SectorWeightProfile,
    position_factor: f64,
) -> (Vec<DimensionScore>, HrAdjustment) {
    let mut adjustment = HrAdjustment {
        base_score: 0.0,
        hr_baseline_delta: profile.hr_baseline_delta,
        position_factor,
        adjusted_score: 0.0,
        capped: false,
        floored: false,
    };

    let adjusted = scores
        .iter()
        .map(|ds| {
            if ds.dimension != Dimension::TalentSkills {
                return ds.clone();
            }
            let raw = ds.score + profile.hr_baseline_delta * position_factor;
            let clamped = raw.clamp(0.0, 100.0);

            adjustment.base_score = ds.score;
            adjustment.adjusted_score = clamped;
            adjustment.capped = raw > 100.0;
            adjustment.floored = raw < 0.0;

            let mut talent = ds.clone();
            talent.score = clamped;
            talent
        })
        .collect();

    (adjusted, adjustment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn profile(delta: f64) -> SectorWeightProfile {
        let weights: BTreeMap<_, _> = Dimension::ALL
            .iter()
            .map(|d| (*d, 1.0 / Dimension::COUNT as f64))
            .collect();
        SectorWeightProfile {
            sector: "default".into(),
            weights,
            hr_baseline_delta: delta,
            version: 1,
        }
    }

    fn scores_with_talent(talent: f64) -> Vec<DimensionScore> {
        Dimension::ALL
            .iter()
            .map(|d| {
                let score = if *d == Dimension::TalentSkills { talent } else { 50.0 };
                DimensionScore::new(*d, score, 1.0 / 7.0, 0.8).with_evidence_count(4)
            })
            .collect()
    }

    #[test]
    fn only_talent_changes_and_delta_is_scaled() {
        let (out, adj) = apply_hr_adjustment(&scores_with_talent(60.0), &profile(6.0), 1.5);

        for ds in &out {
            if ds.dimension == Dimension::TalentSkills {
                assert!((ds.score - 69.0).abs() < 1e-12);
            } else {
                assert_eq!(ds.score, 50.0);
            }
        }
        assert_eq!(adj.base_score, 60.0);
        assert!((adj.adjusted_score - 69.0).abs() < 1e-12);
        assert!(!adj.capped);
        assert!(!adj.floored);
    }

    #[test]
    fn cap_applies_after_the_addition_and_is_flagged() {
        let (out, adj) = apply_hr_adjustment(&scores_with_talent(98.0), &profile(8.0), 1.0);
        let talent = out
            .iter()
            .find(|d| d.dimension == Dimension::TalentSkills)
            .unwrap();
        assert_eq!(talent.score, 100.0);
        assert!(adj.capped);
    }

    #[test]
    fn negative_delta_cannot_push_below_zero() {
        let (out, adj) = apply_hr_adjustment(&scores_with_talent(2.0), &profile(-5.0), 1.0);
        let talent = out
            .iter()
            .find(|d| d.dimension == Dimension::TalentSkills)
            .unwrap();
        assert_eq!(talent.score, 0.0);
        assert!(adj.floored);
    }

    #[test]
    fn siblings_are_bit_identical() {
        let input = scores_with_talent(55.0);
        let (out, _) = apply_hr_adjustment(&input, &profile(4.0), 1.0);
        for (a, b) in input.iter().zip(out.iter()) {
            if a.dimension != Dimension::TalentSkills {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn zero_position_factor_is_identity_on_talent() {
        let input = scores_with_talent(47.0);
        let (out, adj) = apply_hr_adjustment(&input, &profile(9.0), 0.0);
        let talent = out
            .iter()
            .find(|d| d.dimension == Dimension::TalentSkills)
            .unwrap();
        assert_eq!(talent.score, 47.0);
        assert_eq!(adj.adjusted_score, 47.0);
    }
}
