// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod audit;
pub mod config;
pub mod dimension;
pub mod error;
pub mod evidence;
pub mod metrics;
pub mod pipeline;
pub mod provider;
pub mod runner;
pub mod score;
pub mod store;

// Numeric scoring core (rubric, HR, VR, synergy, concentration, SEM, final)
pub mod engine;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::{ConfigHandle, ScoringConfig};
pub use crate::dimension::{Dimension, DimensionScore, JobFunction, JobFunctionCounts, ScoreBand};
pub use crate::evidence::{AssessmentInput, EvidenceKind, EvidenceSignal, ReferencePopulation};
pub use crate::provider::{EvidenceProvider, FixtureEvidenceProvider};
pub use crate::runner::{BatchReport, ScoringRunner};
pub use crate::score::{CompanyOutcome, CompanyStatus, OrgAirScore, RunStatus, ScoringRun};
pub use crate::store::{InMemoryScoreStore, ScoreStore, WriteOutcome};
