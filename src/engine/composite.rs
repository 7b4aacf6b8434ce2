//! Final assembly: synergy-adjusted score, concentration penalty, clamp,
//! band.

use serde::Serialize;

use crate::dimension::{clamp, ScoreBand};

#[derive(Debug, Clone, Serialize)]
pub struct CompositeResult {
    pub composite: f64,
    pub band: ScoreBand,
    /// True when the 0..100 clamp actually changed the value.
    pub clamped: bool,
}

/// `(vr + synergy) * penalty`, clamped to the score range and banded.
/// The penalty multiplies the synergy-adjusted score, so a drag from synergy
/// is also scaled down by a concentration penalty.
pub fn assemble_composite(vr_score: f64, synergy_bonus: f64, penalty_factor: f64) -> CompositeResult {
    let raw = (vr_score + synergy_bonus) * penalty_factor;
    let composite = clamp(raw, 0.0, 100.0);
    CompositeResult {
        composite,
        band: ScoreBand::for_score(composite),
        clamped: composite != raw,
    }
}
