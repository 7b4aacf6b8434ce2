//! dimension.rs — core model: the seven readiness dimensions, job functions,
//! per-dimension scores, and the composite score band.
//!
//! Everything here is plain data. The engine modules consume and produce these
//! types; nothing in this file performs I/O.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The seven assessment dimensions. The order of `ALL` is the canonical
/// pipeline order and the column order of SEM reference matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    DataInfrastructure,
    AiGovernance,
    TechnologyStack,
    TalentSkills,
    LeadershipVision,
    UseCasePortfolio,
    CultureChange,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::DataInfrastructure,
        Dimension::AiGovernance,
        Dimension::TechnologyStack,
        Dimension::TalentSkills,
        Dimension::LeadershipVision,
        Dimension::UseCasePortfolio,
        Dimension::CultureChange,
    ];

    pub const COUNT: usize = 7;

    /// Stable snake_case name, matching serde and the config file keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::DataInfrastructure => "data_infrastructure",
            Dimension::AiGovernance => "ai_governance",
            Dimension::TechnologyStack => "technology_stack",
            Dimension::TalentSkills => "talent_skills",
            Dimension::LeadershipVision => "leadership_vision",
            Dimension::UseCasePortfolio => "use_case_portfolio",
            Dimension::CultureChange => "culture_change",
        }
    }

    /// Position in `ALL`; used for matrix column indexing.
    pub fn index(&self) -> usize {
        Dimension::ALL
            .iter()
            .position(|d| d == self)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six job-function categories used for talent concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFunction {
    DataEngineering,
    MlEngineering,
    DataScience,
    Analytics,
    AiResearch,
    SoftwareEngineering,
}

impl JobFunction {
    pub const ALL: [JobFunction; 6] = [
        JobFunction::DataEngineering,
        JobFunction::MlEngineering,
        JobFunction::DataScience,
        JobFunction::Analytics,
        JobFunction::AiResearch,
        JobFunction::SoftwareEngineering,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobFunction::DataEngineering => "data_engineering",
            JobFunction::MlEngineering => "ml_engineering",
            JobFunction::DataScience => "data_science",
            JobFunction::Analytics => "analytics",
            JobFunction::AiResearch => "ai_research",
            JobFunction::SoftwareEngineering => "software_engineering",
        }
    }
}

/// Headcount (or posting count) per job function. Missing categories count
/// as zero; unknown categories cannot be represented at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobFunctionCounts(pub BTreeMap<JobFunction, u32>);

impl JobFunctionCounts {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, function: JobFunction, count: u32) -> Self {
        self.0.insert(function, count);
        self
    }

    pub fn count(&self, function: JobFunction) -> u32 {
        self.0.get(&function).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }
}

/// One dimension's assessed score. Exactly one per dimension per assessment;
/// treated as immutable once produced (adjustment stages emit fresh copies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    /// Rubric score in <0, 100>.
    pub score: f64,
    /// Sector weight in <0, 1>; the per-sector weights sum to 1.0.
    pub weight: f64,
    /// Evidence confidence in <0, 1>. Zero when no evidence was seen.
    pub confidence: f64,
    pub evidence_count: u32,
}

impl DimensionScore {
    pub fn new(dimension: Dimension, score: f64, weight: f64, confidence: f64) -> Self {
        Self {
            dimension,
            score: clamp(score, 0.0, 100.0),
            weight: clamp(weight, 0.0, 1.0),
            confidence: clamp(confidence, 0.0, 1.0),
            evidence_count: 0,
        }
    }

    pub fn with_evidence_count(mut self, n: u32) -> Self {
        self.evidence_count = n;
        self
    }
}

/// Qualitative band for a composite score. Upper edges are inclusive:
/// 60.0 is still Progressing, 60.01 is Advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Nascent,
    Developing,
    Progressing,
    Advanced,
    Leading,
}

impl ScoreBand {
    /// Band for a composite already clamped to <0, 100>.
    pub fn for_score(composite: f64) -> ScoreBand {
        if composite <= 20.0 {
            ScoreBand::Nascent
        } else if composite <= 40.0 {
            ScoreBand::Developing
        } else if composite <= 60.0 {
            ScoreBand::Progressing
        } else if composite <= 80.0 {
            ScoreBand::Advanced
        } else {
            ScoreBand::Leading
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreBand::Nascent => "nascent",
            ScoreBand::Developing => "developing",
            ScoreBand::Progressing => "progressing",
            ScoreBand::Advanced => "advanced",
            ScoreBand::Leading => "leading",
        }
    }
}

impl std::fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_names_round_trip_through_serde() {
        for d in Dimension::ALL {
            let json = serde_json::to_string(&d).unwrap();
            assert_eq!(json, format!("\"{}\"", d.as_str()));
            let back: Dimension = serde_json::from_str(&json).unwrap();
            assert_eq!(back, d);
        }
    }

    #[test]
    fn dimension_index_matches_all_order() {
        for (i, d) in Dimension::ALL.iter().enumerate() {
            assert_eq!(d.index(), i);
        }
    }

    #[test]
    fn band_edges_are_inclusive_on_the_upper_side() {
        assert_eq!(ScoreBand::for_score(0.0), ScoreBand::Nascent);
        assert_eq!(ScoreBand::for_score(20.0), ScoreBand::Nascent);
        assert_eq!(ScoreBand::for_score(20.01), ScoreBand::Developing);
        assert_eq!(ScoreBand::for_score(40.0), ScoreBand::Developing);
        assert_eq!(ScoreBand::for_score(60.0), ScoreBand::Progressing);
        assert_eq!(ScoreBand::for_score(60.01), ScoreBand::Advanced);
        assert_eq!(ScoreBand::for_score(80.0), ScoreBand::Advanced);
        assert_eq!(ScoreBand::for_score(100.0), ScoreBand::Leading);
    }

    #[test]
    fn every_score_maps_to_exactly_one_band() {
        let mut x = 0.0f64;
        while x <= 100.0 {
            // for_score is a total chain of if/else, so one arm always wins;
            // sanity-check continuity at the step points anyway
            let _ = ScoreBand::for_score(x);
            x += 0.25;
        }
    }

    #[test]
    fn job_function_counts_total_and_missing_default() {
        let counts = JobFunctionCounts::new()
            .with(JobFunction::DataScience, 4)
            .with(JobFunction::Analytics, 6);
        assert_eq!(counts.total(), 10);
        assert_eq!(counts.count(JobFunction::AiResearch), 0);
    }

    #[test]
    fn dimension_score_constructor_clamps_bounds() {
        let ds = DimensionScore::new(Dimension::TalentSkills, 140.0, 1.3, -0.2);
        assert_eq!(ds.score, 100.0);
        assert_eq!(ds.weight, 1.0);
        assert_eq!(ds.confidence, 0.0);
    }
}
