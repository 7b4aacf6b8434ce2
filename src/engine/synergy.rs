//! Synergy engine: pairwise cross-dimension rules on the adjusted scores.
//!
//! A positive rule fires when both dimensions are strong (min > threshold);
//! a negative rule fires on imbalance (gap > threshold). Contributions sum
//! over the whole rule list and the aggregate is clamped to ±15 once, so
//! rule order cannot change the outcome.

use serde::Serialize;

use crate::config::{SynergyKind, SynergyRule};
use crate::dimension::{Dimension, DimensionScore};

pub const SYNERGY_CAP_ABS: f64 = 15.0;

/// Per-rule evaluation record for the audit snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SynergyHit {
    pub rule: String,
    pub kind: SynergyKind,
    pub activated: bool,
    /// Signed contribution; 0.0 when the rule did not fire.
    pub contribution: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynergyResult {
    /// Aggregate bonus after the single clamp to [-15, +15].
    pub bonus: f64,
    pub raw_sum: f64,
    pub clamped: bool,
    pub hits: Vec<SynergyHit>,
}

pub fn evaluate_synergy(scores: &[DimensionScore], rules: &[SynergyRule]) -> SynergyResult {
    let lookup = score_lookup(scores);

    let mut raw_sum = 0.0;
    let mut hits = Vec::with_capacity(rules.len());

    for rule in rules {
        let a = lookup[rule.dimension_a.index()];
        let b = lookup[rule.dimension_b.index()];

        let (activated, contribution, reason) = match rule.kind {
            SynergyKind::Positive => {
                let floor = a.min(b);
                let fired = floor > rule.threshold;
                let verb = if fired { "exceeds" } else { "does not exceed" };
                (
                    fired,
                    if fired { rule.magnitude } else { 0.0 },
                    format!(
                        "min({}, {}) = {:.1} {} {:.1}",
                        rule.dimension_a, rule.dimension_b, floor, verb, rule.threshold
                    ),
                )
            }
            SynergyKind::Negative => {
                let gap = (a - b).abs();
                let fired = gap > rule.threshold;
                let verb = if fired { "exceeds" } else { "does not exceed" };
                (
                    fired,
                    if fired { -rule.magnitude } else { 0.0 },
                    format!(
                        "|{} - {}| = {:.1} {} {:.1}",
                        rule.dimension_a, rule.dimension_b, gap, verb, rule.threshold
                    ),
                )
            }
        };

        raw_sum += contribution;
        hits.push(SynergyHit {
            rule: rule.name.clone(),
            kind: rule.kind,
            activated,
            contribution,
            reason,
        });
    }

    let bonus = raw_sum.clamp(-SYNERGY_CAP_ABS, SYNERGY_CAP_ABS);
    SynergyResult {
        bonus,
        raw_sum,
        clamped: bonus != raw_sum,
        hits,
    }
}

fn score_lookup(scores: &[DimensionScore]) -> [f64; Dimension::COUNT] {
    let mut lookup = [0.0; Dimension::COUNT];
    for ds in scores {
        lookup[ds.dimension.index()] = ds.score;
    }
    lookup
}
