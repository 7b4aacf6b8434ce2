//! Batch runner: one scoring run over a set of companies.
//!
//! The runner owns the run lifecycle (insert as Running, finish as
//! Completed), fits the confidence model once per run, then fans companies
//! out over a bounded task pool. Companies are isolated: a failure or panic
//! in one never aborts its siblings, and every company reports an outcome.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use once_cell::sync::OnceCell;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::audit::{AuditStep, AuditTrail};
use crate::config::ScoringConfig;
use crate::engine::SemEstimator;
use crate::error::StoreError;
use crate::evidence::ReferencePopulation;
use crate::pipeline;
use crate::provider::EvidenceProvider;
use crate::score::{CompanyOutcome, CompanyStatus, RunStatus, ScoringRun};
use crate::store::{ScoreStore, WriteOutcome};

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_scoring_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scoring_runs_total", "Scoring runs started.");
        describe_counter!(
            "scoring_companies_total",
            "Per-company outcomes, labeled scored/failed/skipped."
        );
        describe_counter!(
            "scoring_stage_failures_total",
            "Pipeline stage failures across all companies."
        );
        describe_counter!(
            "sem_fallback_total",
            "Runs where the confidence model used the labeled fallback."
        );
        describe_histogram!("scoring_run_duration_ms", "Batch run wall time in milliseconds.");
        describe_gauge!("scoring_last_run_ts", "Unix ts when a scoring run last finished.");
    });
}

/// What one batch run did, company by company.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub outcomes: Vec<CompanyOutcome>,
}

impl BatchReport {
    pub fn count(&self, status: CompanyStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn scored_count(&self) -> usize {
        self.count(CompanyStatus::Scored)
    }

    pub fn failed_count(&self) -> usize {
        self.count(CompanyStatus::Failed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(CompanyStatus::Skipped)
    }
}

pub struct ScoringRunner {
    store: Arc<dyn ScoreStore>,
    provider: Arc<dyn EvidenceProvider>,
    max_concurrency: usize,
}

impl ScoringRunner {
    pub fn new(store: Arc<dyn ScoreStore>, provider: Arc<dyn EvidenceProvider>) -> Self {
        Self {
            store,
            provider,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn store(&self) -> Arc<dyn ScoreStore> {
        Arc::clone(&self.store)
    }

    pub fn provider(&self) -> Arc<dyn EvidenceProvider> {
        Arc::clone(&self.provider)
    }

    /// Score a batch against one config snapshot, without cancellation.
    pub async fn run_batch(
        &self,
        companies: &[String],
        config: Arc<ScoringConfig>,
    ) -> Result<BatchReport, StoreError> {
        self.run_batch_with_cancel(companies, config, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Score a batch; setting `cancel` stops dispatching further companies.
    /// In-flight companies finish and persist normally, the rest report
    /// `Skipped`.
    pub async fn run_batch_with_cancel(
        &self,
        companies: &[String],
        config: Arc<ScoringConfig>,
        cancel: Arc<AtomicBool>,
    ) -> Result<BatchReport, StoreError> {
        ensure_scoring_metrics_described();
        let started = Instant::now();

        // Duplicates in the request collapse to one scoring; the store-level
        // idempotence would catch them anyway, this avoids the wasted work.
        let mut seen = BTreeSet::new();
        let unique: Vec<String> = companies
            .iter()
            .filter(|c| seen.insert((*c).clone()))
            .cloned()
            .collect();

        let run = ScoringRun::begin(json!({
            "companies": unique,
            "pins": config.version_pins(),
            "max_concurrency": self.max_concurrency,
            "provider": self.provider.name(),
        }));
        let run_id = run.id;
        self.store.insert_run(&run).await?;
        counter!("scoring_runs_total").increment(1);
        tracing::info!(
            run_id = %run_id,
            companies = unique.len(),
            config_digest = %config.digest,
            "scoring run started"
        );

        // Reference fetched and the confidence model fitted once per run;
        // every company in the run sees the same estimator.
        let reference = match self.provider.reference_population().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    provider = self.provider.name(),
                    "reference population unavailable, confidence model will fall back"
                );
                ReferencePopulation::default()
            }
        };
        let estimator = Arc::new(SemEstimator::fit(&reference, &config.sem));
        if !estimator.is_fitted() {
            counter!("sem_fallback_total").increment(1);
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut set: JoinSet<CompanyOutcome> = JoinSet::new();
        let mut outcomes: Vec<CompanyOutcome> = Vec::with_capacity(unique.len());
        let mut in_flight: BTreeSet<String> = BTreeSet::new();

        for company_id in unique {
            if cancel.load(Ordering::SeqCst) {
                outcomes.push(CompanyOutcome::skipped(company_id, "batch cancelled"));
                continue;
            }
            // Dispatch blocks at the concurrency cap, so a cancel set while
            // we wait here still short-circuits the remaining companies.
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(p) => p,
                Err(_) => {
                    // Semaphore is never closed; treat like cancellation.
                    outcomes.push(CompanyOutcome::skipped(company_id, "batch cancelled"));
                    continue;
                }
            };

            in_flight.insert(company_id.clone());
            let store = Arc::clone(&self.store);
            let provider = Arc::clone(&self.provider);
            let config = Arc::clone(&config);
            let estimator = Arc::clone(&estimator);
            set.spawn(async move {
                let _permit = permit;
                score_one(store, provider, config, estimator, run_id, company_id).await
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    in_flight.remove(&outcome.company_id);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    tracing::warn!(error = ?e, run_id = %run_id, "scoring task aborted");
                }
            }
        }
        // Tasks that never reported back (panicked or aborted) still get a
        // terminal outcome so the report covers the whole request.
        for company_id in in_flight {
            outcomes.push(CompanyOutcome::failed(company_id, "scoring task aborted"));
        }

        self.store.finish_run(run_id, RunStatus::Completed).await?;

        for outcome in &outcomes {
            let label = match outcome.status {
                CompanyStatus::Scored => "scored",
                CompanyStatus::Failed => "failed",
                CompanyStatus::Skipped => "skipped",
            };
            counter!("scoring_companies_total", "outcome" => label).increment(1);
        }
        let elapsed_ms = started.elapsed().as_millis() as f64;
        histogram!("scoring_run_duration_ms").record(elapsed_ms);
        gauge!("scoring_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

        let report = BatchReport {
            run_id,
            status: RunStatus::Completed,
            outcomes,
        };
        tracing::info!(
            run_id = %run_id,
            scored = report.scored_count(),
            failed = report.failed_count(),
            skipped = report.skipped_count(),
            elapsed_ms = elapsed_ms as u64,
            "scoring run finished"
        );
        Ok(report)
    }
}

/// Score and persist one company. Never propagates: every path collapses to
/// a `CompanyOutcome` so the batch loop stays failure-agnostic.
async fn score_one(
    store: Arc<dyn ScoreStore>,
    provider: Arc<dyn EvidenceProvider>,
    config: Arc<ScoringConfig>,
    estimator: Arc<SemEstimator>,
    run_id: Uuid,
    company_id: String,
) -> CompanyOutcome {
    let input = match provider.assessment_for(&company_id).await {
        Ok(input) => input,
        Err(e) => {
            tracing::warn!(
                error = ?e,
                company = %company_id,
                provider = provider.name(),
                "evidence fetch failed"
            );
            counter!("scoring_stage_failures_total").increment(1);
            let mut trail = AuditTrail::new(run_id, &company_id);
            trail.record_failure(AuditStep::Rubric, &format!("evidence fetch failed: {e}"));
            if let Err(se) = store.append_audit(trail.entries()).await {
                tracing::warn!(error = %se, company = %company_id, "audit write failed");
            }
            return CompanyOutcome::failed(company_id, e.to_string());
        }
    };

    match pipeline::score_company(run_id, &input, &config, &estimator) {
        Ok(output) => {
            // Audit entries land before the score row, so a trail always
            // exists for any score that can be read back.
            if let Err(e) = store.append_audit(&output.entries).await {
                tracing::warn!(error = %e, company = %company_id, "audit write failed");
                return CompanyOutcome::failed(company_id, e.to_string());
            }
            match store.insert_score(&output.score).await {
                Ok(WriteOutcome::Inserted) => {
                    tracing::info!(
                        company = %company_id,
                        composite = output.score.composite_score,
                        band = %output.score.score_band.as_str(),
                        "company scored"
                    );
                    CompanyOutcome::scored(company_id)
                }
                Ok(WriteOutcome::DuplicateIgnored) => {
                    tracing::info!(
                        company = %company_id,
                        run_id = %run_id,
                        "score already present for this run, first write kept"
                    );
                    CompanyOutcome::scored(company_id)
                }
                Err(e) => {
                    tracing::warn!(error = %e, company = %company_id, "score write failed");
                    CompanyOutcome::failed(company_id, e.to_string())
                }
            }
        }
        Err(failure) => {
            counter!("scoring_stage_failures_total").increment(1);
            tracing::warn!(
                error = %failure.error,
                company = %company_id,
                "pipeline failed"
            );
            // The partial trail (with its terminal failure entry) is kept.
            if let Err(se) = store.append_audit(&failure.entries).await {
                tracing::warn!(error = %se, company = %company_id, "audit write failed");
            }
            CompanyOutcome::failed(company_id, failure.error.to_string())
        }
    }
}
