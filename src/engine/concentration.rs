//! Talent concentration: Herfindahl-Hirschman index over the job-function
//! mix, mapped to a multiplicative penalty factor. Small samples are gated
//! to factor 1.0 so a company with three postings is not branded
//! concentrated.

use serde::Serialize;

use crate::config::TalentPenaltyConfig;
use crate::dimension::{JobFunction, JobFunctionCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationSeverity {
    Balanced,
    Mild,
    Severe,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConcentrationResult {
    /// `None` when there are no categorized postings at all.
    pub hhi: Option<f64>,
    pub total_sample: u32,
    /// Applied penalty factor in (0, 1]; 1.0 when balanced or gated.
    pub factor: f64,
    /// True when the sample was below `min_sample_size` and the penalty was
    /// skipped regardless of the index.
    pub gated: bool,
    pub severity: ConcentrationSeverity,
}

pub fn concentration_penalty(
    counts: &JobFunctionCounts,
    cfg: &TalentPenaltyConfig,
) -> ConcentrationResult {
    let total = counts.total();
    let hhi = herfindahl(counts);

    if total < cfg.min_sample_size {
        return ConcentrationResult {
            hhi,
            total_sample: total,
            factor: 1.0,
            gated: true,
            severity: ConcentrationSeverity::Balanced,
        };
    }

    // Gate guarantees total > 0 here (min_sample_size >= 1 in practice, and
    // total == 0 < min always gates), so hhi is present.
    let index = hhi.unwrap_or(0.0);
    let (factor, severity) = if index < cfg.hhi_threshold_mild {
        (1.0, ConcentrationSeverity::Balanced)
    } else if index < cfg.hhi_threshold_severe {
        (cfg.penalty_factor_mild, ConcentrationSeverity::Mild)
    } else {
        (cfg.penalty_factor_severe, ConcentrationSeverity::Severe)
    };

    ConcentrationResult {
        hhi,
        total_sample: total,
        factor,
        gated: false,
        severity,
    }
}

/// `HHI = sum((n_i / total)^2)` over the six fixed categories. 1/6 when the
/// mix is perfectly even, 1.0 when everything sits in one category.
fn herfindahl(counts: &JobFunctionCounts) -> Option<f64> {
    let total = counts.total();
    if total == 0 {
        return None;
    }
    let total = total as f64;
    let hhi = JobFunction::ALL
        .iter()
        .map(|f| {
            let share = counts.count(*f) as f64 / total;
            share * share
        })
        .sum();
    Some(hhi)
}
