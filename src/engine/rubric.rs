//! Rubric scorer: pre-extracted evidence signals → one score per dimension.
//!
//! Each dimension carries a five-level keyword rubric (embedded table). A
//! level qualifies when enough distinct keywords from its set were matched;
//! the highest qualifying level wins and the score interpolates inside that
//! level's band by match ratio. Signals older than the recency window are
//! discarded before anything else.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::RubricSettings;
use crate::dimension::Dimension;
use crate::evidence::{AssessmentInput, EvidenceSignal};

static RUBRICS: Lazy<BTreeMap<Dimension, Vec<RubricLevel>>> = Lazy::new(|| {
    let raw = include_str!("../../rubric_levels.json");
    serde_json::from_str(raw).expect("valid rubric level table")
});

#[derive(Debug, Clone, Deserialize)]
pub struct RubricLevel {
    pub level: u8,
    pub floor: f64,
    pub ceiling: f64,
    pub min_matches: usize,
    pub keywords: Vec<String>,
}

/// One dimension's rubric evaluation, with enough detail for the audit
/// snapshot to explain the score.
#[derive(Debug, Clone, Serialize)]
pub struct RubricOutcome {
    pub dimension: Dimension,
    pub score: f64,
    pub confidence: f64,
    pub evidence_count: u32,
    /// Qualifying rubric level, `None` when no level was reached.
    pub level: Option<u8>,
    pub matched_keywords: Vec<String>,
    pub stale_discarded: u32,
}

impl RubricOutcome {
    fn absent(dimension: Dimension, stale_discarded: u32) -> Self {
        Self {
            dimension,
            score: 0.0,
            confidence: 0.0,
            evidence_count: 0,
            level: None,
            matched_keywords: Vec::new(),
            stale_discarded,
        }
    }
}

/// Score every dimension. Always returns exactly seven outcomes in
/// `Dimension::ALL` order; dimensions without evidence come back with score
/// 0, confidence 0, count 0.
pub fn score_dimensions(input: &AssessmentInput, settings: &RubricSettings) -> Vec<RubricOutcome> {
    Dimension::ALL
        .iter()
        .map(|d| score_dimension(*d, input.signals_for(*d), settings))
        .collect()
}

pub fn score_dimension(
    dimension: Dimension,
    signals: &[EvidenceSignal],
    settings: &RubricSettings,
) -> RubricOutcome {
    let fresh: Vec<&EvidenceSignal> = signals
        .iter()
        .filter(|s| s.age_days <= settings.recency_window_days)
        .collect();
    let stale = (signals.len() - fresh.len()) as u32;

    if fresh.is_empty() {
        return RubricOutcome::absent(dimension, stale);
    }

    // Distinct keywords across all fresh signals, normalized once.
    let matched: BTreeSet<String> = fresh
        .iter()
        .flat_map(|s| s.keywords.iter())
        .map(|k| k.trim().to_ascii_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let evidence_count = fresh.len() as u32;
    let confidence = saturating_confidence(evidence_count, settings.confidence_half_saturation);

    let levels = match RUBRICS.get(&dimension) {
        Some(levels) => levels,
        None => return RubricOutcome::absent(dimension, stale),
    };

    // Highest level first; a level qualifies on matches within its own
    // keyword set only.
    let mut chosen: Option<(&RubricLevel, usize)> = None;
    for level in levels.iter().rev() {
        let hits = level
            .keywords
            .iter()
            .filter(|k| matched.contains(&k.to_ascii_lowercase()))
            .count();
        if hits >= level.min_matches && hits > 0 {
            chosen = Some((level, hits));
            break;
        }
    }

    let (score, level_no) = match chosen {
        Some((level, hits)) => {
            let span = (level.ceiling - level.floor).max(0.0);
            let position = (hits as f64 / level.keywords.len().max(1) as f64).min(1.0);
            (level.floor + position * span, Some(level.level))
        }
        // Evidence seen, nothing rubric-relevant matched.
        None => (0.0, None),
    };

    RubricOutcome {
        dimension,
        score: score.clamp(0.0, 100.0),
        confidence,
        evidence_count,
        level: level_no,
        matched_keywords: matched.into_iter().collect(),
        stale_discarded: stale,
    }
}

/// Confidence saturates with evidence volume: n / (n + half_saturation).
/// Zero at no evidence, 0.5 at `half_saturation` signals, asymptotic to 1.
fn saturating_confidence(evidence_count: u32, half_saturation: f64) -> f64 {
    let n = evidence_count as f64;
    (n / (n + half_saturation)).clamp(0.0, 1.0)
}
