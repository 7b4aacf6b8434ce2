//! Persistence boundary for scoring runs, scores and audit trails.
//!
//! The engine only ever talks to [`ScoreStore`]; the in-memory backend here is
//! the default for the demo binary and for tests. A SQL-backed implementation
//! can slot in behind the same trait without touching the pipeline.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::audit::AuditLogEntry;
use crate::error::StoreError;
use crate::score::{OrgAirScore, RunStatus, ScoringRun};

/// Result of an idempotent score write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A fresh row was written.
    Inserted,
    /// A row for this `(company_id, scoring_run_id)` pair already exists;
    /// the first write wins and this one was dropped.
    DuplicateIgnored,
}

/// Storage operations the scoring runner and the API depend on.
///
/// `insert_score` must be idempotent on `(company_id, scoring_run_id)`:
/// re-running a batch with the same run id never produces duplicate rows.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Register a run in `Running` state before any company is scored.
    async fn insert_run(&self, run: &ScoringRun) -> Result<(), StoreError>;

    /// Mark a run finished with the given terminal status.
    async fn finish_run(&self, run_id: Uuid, status: RunStatus) -> Result<(), StoreError>;

    /// Write a company score; duplicates on `(company_id, scoring_run_id)`
    /// are ignored, first write wins.
    async fn insert_score(&self, score: &OrgAirScore) -> Result<WriteOutcome, StoreError>;

    /// Append audit entries. The trail is append-only; entries are never
    /// rewritten, including those recorded for failed pipelines.
    async fn append_audit(&self, entries: &[AuditLogEntry]) -> Result<(), StoreError>;

    /// Look up a run by id.
    async fn run(&self, run_id: Uuid) -> Result<Option<ScoringRun>, StoreError>;

    /// Most recent score for one company, across all runs.
    async fn latest_score_for(&self, company_id: &str) -> Result<Option<OrgAirScore>, StoreError>;

    /// Latest score per company, ordered by composite descending.
    async fn latest_scores(&self, limit: usize) -> Result<Vec<OrgAirScore>, StoreError>;

    /// All scores written by one run.
    async fn scores_for_run(&self, run_id: Uuid) -> Result<Vec<OrgAirScore>, StoreError>;

    /// Audit trail for one company in one run, in recording order.
    async fn audit_trail(
        &self,
        run_id: Uuid,
        company_id: &str,
    ) -> Result<Vec<AuditLogEntry>, StoreError>;
}

#[derive(Default)]
struct StoreInner {
    runs: Vec<ScoringRun>,
    scores: Vec<OrgAirScore>,
    audit: Vec<AuditLogEntry>,
    score_keys: HashSet<(String, Uuid)>,
}

/// Process-local store backed by a mutex-guarded vector per table.
///
/// Lock scopes are short and never held across an await point.
#[derive(Default)]
pub struct InMemoryScoreStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Number of score rows currently held (test helper).
    pub fn score_count(&self) -> usize {
        self.lock().scores.len()
    }
}

#[async_trait]
impl ScoreStore for InMemoryScoreStore {
    async fn insert_run(&self, run: &ScoringRun) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.runs.iter().any(|r| r.id == run.id) {
            return Ok(());
        }
        inner.runs.push(run.clone());
        Ok(())
    }

    async fn finish_run(&self, run_id: Uuid, status: RunStatus) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let run = inner
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(StoreError::RunNotFound { run_id })?;
        run.status = status;
        run.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn insert_score(&self, score: &OrgAirScore) -> Result<WriteOutcome, StoreError> {
        let key = (score.company_id.clone(), score.scoring_run_id);
        let mut inner = self.lock();
        if inner.score_keys.contains(&key) {
            return Ok(WriteOutcome::DuplicateIgnored);
        }
        inner.score_keys.insert(key);
        inner.scores.push(score.clone());
        Ok(WriteOutcome::Inserted)
    }

    async fn append_audit(&self, entries: &[AuditLogEntry]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.audit.extend_from_slice(entries);
        Ok(())
    }

    async fn run(&self, run_id: Uuid) -> Result<Option<ScoringRun>, StoreError> {
        Ok(self.lock().runs.iter().find(|r| r.id == run_id).cloned())
    }

    async fn latest_score_for(&self, company_id: &str) -> Result<Option<OrgAirScore>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .scores
            .iter()
            .filter(|s| s.company_id == company_id)
            .max_by_key(|s| s.scored_at)
            .cloned())
    }

    async fn latest_scores(&self, limit: usize) -> Result<Vec<OrgAirScore>, StoreError> {
        let inner = self.lock();
        let mut per_company: Vec<OrgAirScore> = Vec::new();
        for score in &inner.scores {
            match per_company
                .iter_mut()
                .find(|s| s.company_id == score.company_id)
            {
                Some(existing) if existing.scored_at < score.scored_at => {
                    *existing = score.clone();
                }
                Some(_) => {}
                None => per_company.push(score.clone()),
            }
        }
        per_company.sort_by(|a, b| {
            b.composite_score
                .partial_cmp(&a.composite_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        per_company.truncate(limit);
        Ok(per_company)
    }

    async fn scores_for_run(&self, run_id: Uuid) -> Result<Vec<OrgAirScore>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .scores
            .iter()
            .filter(|s| s.scoring_run_id == run_id)
            .cloned()
            .collect())
    }

    async fn audit_trail(
        &self,
        run_id: Uuid,
        company_id: &str,
    ) -> Result<Vec<AuditLogEntry>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .audit
            .iter()
            .filter(|e| e.scoring_run_id == run_id && e.company_id == company_id)
            .cloned()
            .collect())
    }
}
