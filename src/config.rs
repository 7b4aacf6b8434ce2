//! config.rs — versioned scoring configuration: sector weight profiles,
//! synergy rules, talent penalty thresholds, SEM settings, rubric knobs.
//!
//! A run holds one immutable snapshot for its whole lifetime. The handle at
//! the bottom supports swapping snapshots between runs (admin reload); an
//! in-flight run keeps the snapshot it started with.

use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::dimension::Dimension;
use crate::error::ConfigError;

// --- env defaults & names ---
pub const DEFAULT_SCORING_CONFIG_PATH: &str = "config/scoring.toml";
pub const ENV_SCORING_CONFIG_PATH: &str = "ORG_AIR_CONFIG_PATH";

/// Absolute tolerance for per-sector weight sums.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

static DEFAULT_SCORING_TOML: &str = include_str!("../config/scoring.toml");

/* ----------------------------
Raw schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(default)]
    scoring: RawScoring,
    #[serde(default)]
    rubric: RawRubric,
    sectors: BTreeMap<String, RawSector>,
    #[serde(default)]
    synergy: RawSynergy,
    #[serde(default)]
    talent_penalty: RawTalentPenalty,
    #[serde(default)]
    sem: RawSem,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawScoring {
    version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRubric {
    #[serde(default = "default_recency_window_days")]
    recency_window_days: u32,
    #[serde(default = "default_confidence_half_saturation")]
    confidence_half_saturation: f64,
    #[serde(default = "default_version")]
    version: u32,
}

impl Default for RawRubric {
    fn default() -> Self {
        Self {
            recency_window_days: default_recency_window_days(),
            confidence_half_saturation: default_confidence_half_saturation(),
            version: default_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawSector {
    weights: BTreeMap<Dimension, f64>,
    #[serde(default)]
    hr_baseline_delta: f64,
    #[serde(default = "default_version")]
    version: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawSynergy {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    rules: Vec<RawSynergyRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSynergyRule {
    name: String,
    dimension_a: Dimension,
    dimension_b: Dimension,
    kind: SynergyKind,
    threshold: f64,
    magnitude: f64,
    #[serde(default = "default_version")]
    version: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTalentPenalty {
    #[serde(default = "default_hhi_threshold_mild")]
    hhi_threshold_mild: f64,
    #[serde(default = "default_hhi_threshold_severe")]
    hhi_threshold_severe: f64,
    #[serde(default = "default_penalty_factor_mild")]
    penalty_factor_mild: f64,
    #[serde(default = "default_penalty_factor_severe")]
    penalty_factor_severe: f64,
    #[serde(default = "default_min_sample_size")]
    min_sample_size: u32,
    #[serde(default = "default_version")]
    version: u32,
}

impl Default for RawTalentPenalty {
    fn default() -> Self {
        Self {
            hhi_threshold_mild: default_hhi_threshold_mild(),
            hhi_threshold_severe: default_hhi_threshold_severe(),
            penalty_factor_mild: default_penalty_factor_mild(),
            penalty_factor_severe: default_penalty_factor_severe(),
            min_sample_size: default_min_sample_size(),
            version: default_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawSem {
    #[serde(default = "default_min_reference_observations")]
    min_reference_observations: usize,
    #[serde(default = "default_fallback_base_se")]
    fallback_base_se: f64,
    #[serde(default = "default_reliability_floor")]
    reliability_floor: f64,
    #[serde(default = "default_version")]
    version: u32,
}

impl Default for RawSem {
    fn default() -> Self {
        Self {
            min_reference_observations: default_min_reference_observations(),
            fallback_base_se: default_fallback_base_se(),
            reliability_floor: default_reliability_floor(),
            version: default_version(),
        }
    }
}

fn default_version() -> u32 {
    1
}
fn default_recency_window_days() -> u32 {
    365
}
fn default_confidence_half_saturation() -> f64 {
    5.0
}
fn default_hhi_threshold_mild() -> f64 {
    0.40
}
fn default_hhi_threshold_severe() -> f64 {
    0.70
}
fn default_penalty_factor_mild() -> f64 {
    0.95
}
fn default_penalty_factor_severe() -> f64 {
    0.85
}
fn default_min_sample_size() -> u32 {
    15
}
fn default_min_reference_observations() -> usize {
    5
}
fn default_fallback_base_se() -> f64 {
    8.0
}
fn default_reliability_floor() -> f64 {
    0.10
}

/* ----------------------------
Validated runtime types
---------------------------- */

#[derive(Debug, Clone)]
pub struct RubricSettings {
    pub recency_window_days: u32,
    pub confidence_half_saturation: f64,
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct SectorWeightProfile {
    pub sector: String,
    pub weights: BTreeMap<Dimension, f64>,
    pub hr_baseline_delta: f64,
    pub version: u32,
}

impl SectorWeightProfile {
    /// Weight for one dimension. Validation guarantees all seven are present.
    pub fn weight(&self, dimension: Dimension) -> f64 {
        self.weights.get(&dimension).copied().unwrap_or(0.0)
    }

    /// Weight invariants: all seven dimensions, none negative, sum within
    /// tolerance of 1.0. Enforced at load; the aggregation stage re-checks
    /// its input so hand-built profiles fail the same way.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for dimension in Dimension::ALL {
            match self.weights.get(&dimension) {
                None => {
                    return Err(ConfigError::MissingDimensionWeight {
                        sector: self.sector.clone(),
                        dimension,
                    })
                }
                Some(w) if *w < 0.0 => {
                    return Err(ConfigError::NegativeWeight {
                        sector: self.sector.clone(),
                        dimension,
                        weight: *w,
                    })
                }
                Some(_) => {}
            }
        }
        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum {
                sector: self.sector.clone(),
                sum,
                tolerance: WEIGHT_SUM_TOLERANCE,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynergyKind {
    Positive,
    Negative,
}

#[derive(Debug, Clone)]
pub struct SynergyRule {
    pub name: String,
    pub dimension_a: Dimension,
    pub dimension_b: Dimension,
    pub kind: SynergyKind,
    /// Positive rules fire when min(a, b) exceeds this; negative rules when
    /// the a/b gap exceeds it.
    pub threshold: f64,
    /// Unsigned contribution; the sign comes from `kind`.
    pub magnitude: f64,
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct TalentPenaltyConfig {
    pub hhi_threshold_mild: f64,
    pub hhi_threshold_severe: f64,
    pub penalty_factor_mild: f64,
    pub penalty_factor_severe: f64,
    pub min_sample_size: u32,
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct SemSettings {
    pub min_reference_observations: usize,
    pub fallback_base_se: f64,
    pub reliability_floor: f64,
    pub version: u32,
}

/// One validated, immutable snapshot of the whole scoring configuration.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub version: String,
    /// Short SHA-256 of the raw TOML, pinned into run parameters.
    pub digest: String,
    pub rubric: RubricSettings,
    pub sectors: BTreeMap<String, SectorWeightProfile>,
    pub synergy_rules: Vec<SynergyRule>,
    pub synergy_version: u32,
    pub talent_penalty: TalentPenaltyConfig,
    pub sem: SemSettings,
}

impl ScoringConfig {
    /// Load from a TOML file. Uses ORG_AIR_CONFIG_PATH or defaults to
    /// "config/scoring.toml". Falls back to the embedded default when neither
    /// exists, so a fresh checkout runs without setup.
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = config_path();
        match fs::read_to_string(&path) {
            Ok(content) => {
                let cfg = Self::from_toml_str(&content).map_err(|e| {
                    anyhow::anyhow!("invalid scoring config at {}: {}", path.display(), e)
                })?;
                Ok(cfg)
            }
            Err(_) if std::env::var(ENV_SCORING_CONFIG_PATH).is_err() => {
                tracing::info!(path = %path.display(), "config file absent, using embedded default");
                Ok(Self::builtin())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read scoring config at {}: {}",
                path.display(),
                e
            )),
        }
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(toml_str)?;

        if raw.rubric.confidence_half_saturation <= 0.0 {
            return Err(ConfigError::RubricHalfSaturation {
                got: raw.rubric.confidence_half_saturation,
            });
        }

        let mut sectors = BTreeMap::new();
        for (name, sector) in raw.sectors {
            sectors.insert(
                name.clone(),
                validate_sector(name, sector)?,
            );
        }

        let mut synergy_rules = Vec::with_capacity(raw.synergy.rules.len());
        for rule in raw.synergy.rules {
            synergy_rules.push(validate_rule(rule)?);
        }

        let talent_penalty = validate_penalty(raw.talent_penalty)?;
        let sem = validate_sem(raw.sem)?;

        Ok(Self {
            version: raw.scoring.version.unwrap_or_else(|| "dev".to_string()),
            digest: digest_hex(toml_str),
            rubric: RubricSettings {
                recency_window_days: raw.rubric.recency_window_days,
                confidence_half_saturation: raw.rubric.confidence_half_saturation,
                version: raw.rubric.version,
            },
            sectors,
            synergy_rules,
            synergy_version: raw.synergy.version,
            talent_penalty,
            sem,
        })
    }

    /// The embedded default configuration (always valid; covered by tests).
    pub fn builtin() -> Self {
        Self::from_toml_str(DEFAULT_SCORING_TOML).expect("embedded scoring config is valid")
    }

    /// Profile lookup; unknown sectors fail the requesting company only.
    pub fn sector(&self, name: &str) -> Result<&SectorWeightProfile, ConfigError> {
        self.sectors.get(name).ok_or_else(|| ConfigError::UnknownSector {
            sector: name.to_string(),
        })
    }

    /// Version pins written into `ScoringRun.parameters`.
    pub fn version_pins(&self) -> serde_json::Value {
        json!({
            "config": self.version,
            "digest": self.digest,
            "rubric": self.rubric.version,
            "sectors": self
                .sectors
                .iter()
                .map(|(k, v)| (k.clone(), v.version))
                .collect::<BTreeMap<String, u32>>(),
            "synergy": self.synergy_version,
            "talent_penalty": self.talent_penalty.version,
            "sem": self.sem.version,
        })
    }
}

fn config_path() -> PathBuf {
    std::env::var(ENV_SCORING_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SCORING_CONFIG_PATH))
}

fn validate_sector(name: String, raw: RawSector) -> Result<SectorWeightProfile, ConfigError> {
    let profile = SectorWeightProfile {
        sector: name,
        weights: raw.weights,
        hr_baseline_delta: raw.hr_baseline_delta,
        version: raw.version,
    };
    profile.validate()?;
    Ok(profile)
}

fn validate_rule(raw: RawSynergyRule) -> Result<SynergyRule, ConfigError> {
    if raw.dimension_a == raw.dimension_b {
        return Err(ConfigError::SelfPairedRule {
            rule: raw.name,
            dimension: raw.dimension_a,
        });
    }
    if raw.threshold < 0.0 {
        return Err(ConfigError::NegativeRuleValue {
            rule: raw.name,
            field: "threshold",
            value: raw.threshold,
        });
    }
    if raw.magnitude < 0.0 {
        return Err(ConfigError::NegativeRuleValue {
            rule: raw.name,
            field: "magnitude",
            value: raw.magnitude,
        });
    }
    Ok(SynergyRule {
        name: raw.name,
        dimension_a: raw.dimension_a,
        dimension_b: raw.dimension_b,
        kind: raw.kind,
        threshold: raw.threshold,
        magnitude: raw.magnitude,
        version: raw.version,
    })
}

fn validate_penalty(raw: RawTalentPenalty) -> Result<TalentPenaltyConfig, ConfigError> {
    if raw.hhi_threshold_mild > raw.hhi_threshold_severe {
        return Err(ConfigError::PenaltyThresholdOrder {
            mild: raw.hhi_threshold_mild,
            severe: raw.hhi_threshold_severe,
        });
    }
    let ordered = raw.penalty_factor_severe > 0.0
        && raw.penalty_factor_severe <= raw.penalty_factor_mild
        && raw.penalty_factor_mild <= 1.0;
    if !ordered {
        return Err(ConfigError::PenaltyFactorOrder {
            mild: raw.penalty_factor_mild,
            severe: raw.penalty_factor_severe,
        });
    }
    Ok(TalentPenaltyConfig {
        hhi_threshold_mild: raw.hhi_threshold_mild,
        hhi_threshold_severe: raw.hhi_threshold_severe,
        penalty_factor_mild: raw.penalty_factor_mild,
        penalty_factor_severe: raw.penalty_factor_severe,
        min_sample_size: raw.min_sample_size,
        version: raw.version,
    })
}

fn validate_sem(raw: RawSem) -> Result<SemSettings, ConfigError> {
    if raw.min_reference_observations < 2 {
        return Err(ConfigError::SemMinObservations {
            got: raw.min_reference_observations,
        });
    }
    if raw.fallback_base_se <= 0.0 {
        return Err(ConfigError::SemFallbackBaseSe {
            got: raw.fallback_base_se,
        });
    }
    if raw.reliability_floor <= 0.0 || raw.reliability_floor > 1.0 {
        return Err(ConfigError::SemReliabilityFloor {
            got: raw.reliability_floor,
        });
    }
    Ok(SemSettings {
        min_reference_observations: raw.min_reference_observations,
        fallback_base_se: raw.fallback_base_se,
        reliability_floor: raw.reliability_floor,
        version: raw.version,
    })
}

/// Short hex of a SHA-256 over the raw config text.
fn digest_hex(raw: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/* ----------------------------
Thread-safe handle (swap between runs)
---------------------------- */

/// Shared handle over the active snapshot. `snapshot()` is what a run pins;
/// `reload_from_disk()` backs the admin endpoint.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<ScoringConfig>>>,
}

impl ConfigHandle {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn snapshot(&self) -> Arc<ScoringConfig> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            // Poisoned lock: the last written snapshot is still coherent.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, config: ScoringConfig) {
        let fresh = Arc::new(config);
        match self.inner.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }

    pub fn reload_from_disk(&self) -> anyhow::Result<String> {
        let cfg = ScoringConfig::from_toml()?;
        let digest = cfg.digest.clone();
        self.replace(cfg);
        Ok(digest)
    }
}
