use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::audit::AuditLogEntry;
use crate::config::ConfigHandle;
use crate::dimension::ScoreBand;
use crate::provider::EvidenceProvider;
use crate::runner::{BatchReport, ScoringRunner};
use crate::score::{CompanyOutcome, OrgAirScore, RunStatus, ScoringRun};
use crate::store::ScoreStore;

#[derive(Clone)]
pub struct AppState {
    config: ConfigHandle,
    store: Arc<dyn ScoreStore>,
    provider: Arc<dyn EvidenceProvider>,
    runner: Arc<ScoringRunner>,
}

impl AppState {
    pub fn new(
        config: ConfigHandle,
        store: Arc<dyn ScoreStore>,
        provider: Arc<dyn EvidenceProvider>,
        runner: Arc<ScoringRunner>,
    ) -> Self {
        Self {
            config,
            store,
            provider,
            runner,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/scoring/companies/{company_id}", post(score_company_now))
        .route("/api/v1/scoring/batch", post(score_batch))
        .route("/api/v1/scoring/tickers", post(score_tickers))
        .route("/api/v1/scoring/results", get(latest_results))
        .route("/api/v1/scoring/results/{company_id}", get(company_result))
        .route("/api/v1/scoring/runs/{run_id}", get(run_detail))
        .route("/api/v1/scoring/audit/{run_id}/{company_id}", get(audit_trail))
        .route("/admin/reload-config", get(admin_reload_config))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct BatchReq {
    company_ids: Vec<String>,
}

#[derive(serde::Deserialize)]
struct TickersReq {
    tickers: Vec<String>,
}

#[derive(serde::Deserialize)]
struct LimitQuery {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(serde::Serialize)]
struct RunResponse {
    run_id: Uuid,
    status: RunStatus,
    outcomes: Vec<CompanyOutcome>,
}

impl RunResponse {
    fn from_report(report: BatchReport) -> Self {
        Self {
            run_id: report.run_id,
            status: report.status,
            outcomes: report.outcomes,
        }
    }

    fn with_preresolved(mut self, mut pre: Vec<CompanyOutcome>) -> Self {
        self.outcomes.append(&mut pre);
        self
    }
}

#[derive(serde::Serialize)]
struct ScoreSummary {
    company_id: String,
    composite_score: f64,
    score_band: ScoreBand,
}

#[derive(serde::Serialize)]
struct RunDetail {
    run: ScoringRun,
    scores: Vec<ScoreSummary>,
}

async fn score_company_now(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<Json<RunResponse>, (StatusCode, String)> {
    let report = state
        .runner
        .run_batch(&[company_id], state.config.snapshot())
        .await
        .map_err(internal)?;
    Ok(Json(RunResponse::from_report(report)))
}

async fn score_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchReq>,
) -> Result<Json<RunResponse>, (StatusCode, String)> {
    let report = state
        .runner
        .run_batch(&req.company_ids, state.config.snapshot())
        .await
        .map_err(internal)?;
    Ok(Json(RunResponse::from_report(report)))
}

async fn score_tickers(
    State(state): State<AppState>,
    Json(req): Json<TickersReq>,
) -> Result<Json<RunResponse>, (StatusCode, String)> {
    let mut company_ids = Vec::with_capacity(req.tickers.len());
    let mut preresolved = Vec::new();

    for raw in req.tickers {
        let ticker = raw.trim().to_ascii_uppercase();
        if !ticker_shape_ok(&ticker) {
            preresolved.push(CompanyOutcome::skipped(raw, "invalid ticker"));
            continue;
        }
        match state.provider.resolve_ticker(&ticker).await {
            Ok(Some(company_id)) => company_ids.push(company_id),
            Ok(None) => preresolved.push(CompanyOutcome::skipped(ticker, "unknown ticker")),
            Err(e) => preresolved.push(CompanyOutcome::failed(ticker, e.to_string())),
        }
    }

    let report = state
        .runner
        .run_batch(&company_ids, state.config.snapshot())
        .await
        .map_err(internal)?;
    Ok(Json(RunResponse::from_report(report).with_preresolved(preresolved)))
}

/// 1-10 chars, uppercase alphanumeric with optional `.`/`-` separators.
fn ticker_shape_ok(ticker: &str) -> bool {
    static RE: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"^[A-Z][A-Z0-9.\-]{0,9}$").expect("valid ticker regex")
    });
    re.is_match(ticker)
}

async fn latest_results(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<OrgAirScore>>, (StatusCode, String)> {
    let limit = q.limit.unwrap_or(50).min(500);
    let scores = state.store.latest_scores(limit).await.map_err(internal)?;
    Ok(Json(scores))
}

async fn company_result(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<Json<OrgAirScore>, (StatusCode, String)> {
    match state.store.latest_score_for(&company_id).await {
        Ok(Some(score)) => Ok(Json(score)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            format!("no score for company '{company_id}'"),
        )),
        Err(e) => Err(internal(e)),
    }
}

async fn run_detail(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<RunDetail>, (StatusCode, String)> {
    let run = match state.store.run(run_id).await {
        Ok(Some(run)) => run,
        Ok(None) => return Err((StatusCode::NOT_FOUND, format!("no run {run_id}"))),
        Err(e) => return Err(internal(e)),
    };
    let scores = state
        .store
        .scores_for_run(run_id)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|s| ScoreSummary {
            company_id: s.company_id,
            composite_score: s.composite_score,
            score_band: s.score_band,
        })
        .collect();
    Ok(Json(RunDetail { run, scores }))
}

async fn audit_trail(
    State(state): State<AppState>,
    Path((run_id, company_id)): Path<(Uuid, String)>,
) -> Result<Json<Vec<AuditLogEntry>>, (StatusCode, String)> {
    let entries = state
        .store
        .audit_trail(run_id, &company_id)
        .await
        .map_err(internal)?;
    if entries.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("no audit trail for run {run_id}, company '{company_id}'"),
        ));
    }
    Ok(Json(entries))
}

async fn admin_reload_config(State(state): State<AppState>) -> (StatusCode, String) {
    match state.config.reload_from_disk() {
        Ok(digest) => (StatusCode::OK, format!("reloaded, digest={digest}")),
        Err(e) => {
            tracing::warn!(error = %e, "config reload rejected, active snapshot kept");
            (StatusCode::UNPROCESSABLE_ENTITY, format!("rejected: {e}"))
        }
    }
}

fn internal(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
