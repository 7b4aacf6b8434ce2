// src/engine/mod.rs
//! Numeric scoring core. Every stage is a pure, deterministic function over
//! plain inputs; the pipeline wires them together and records each one in the
//! audit trail. No I/O in this tree.

pub mod composite;
pub mod concentration;
pub mod hr;
pub mod rubric;
pub mod sem;
pub mod synergy;
pub mod vr;

// Re-export convenient types.
pub use composite::{assemble_composite, CompositeResult};
pub use concentration::{concentration_penalty, ConcentrationResult, ConcentrationSeverity};
pub use hr::{apply_hr_adjustment, HrAdjustment};
pub use rubric::{score_dimensions, RubricOutcome};
pub use sem::{SemEstimator, SemInterval};
pub use synergy::{evaluate_synergy, SynergyHit, SynergyResult, SYNERGY_CAP_ABS};
pub use vr::{aggregate_vr, VrResult, CONFIDENCE_FLOOR};
