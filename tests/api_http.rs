// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET  /health
// - POST /api/v1/scoring/companies/{company_id}
// - POST /api/v1/scoring/batch
// - POST /api/v1/scoring/tickers (resolution + invalid/unknown skips)
// - GET  /api/v1/scoring/results/{company_id} (+ 404)
// - GET  /api/v1/scoring/runs/{run_id}
// - GET  /api/v1/scoring/audit/{run_id}/{company_id}

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use org_air_scorer::api::{create_router, AppState};
use org_air_scorer::config::{ConfigHandle, ScoringConfig};
use org_air_scorer::provider::FixtureEvidenceProvider;
use org_air_scorer::runner::ScoringRunner;
use org_air_scorer::store::InMemoryScoreStore;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

const PORTFOLIO: &str = r#"{
    "reference": { "dimension_rows": [], "composites": [] },
    "companies": [
        {
            "ticker": "ACME",
            "assessment": {
                "company_id": "acme-corp",
                "assessment_id": "7b6d6f54-9c1e-4a0e-bb1d-6a2f1c9e4daa",
                "sector": "default",
                "position_factor": 1.0,
                "signals": {
                    "talent_skills": [
                        { "kind": "job_posting", "age_days": 20,
                          "keywords": ["machine learning engineer", "ml team"] }
                    ],
                    "data_infrastructure": [
                        { "kind": "filing", "age_days": 45,
                          "keywords": ["data lake", "data pipeline"] }
                    ]
                },
                "job_function_counts": {
                    "data_engineering": 8, "ml_engineering": 5,
                    "data_science": 6, "analytics": 4, "software_engineering": 7
                }
            }
        },
        {
            "ticker": "ORBT",
            "assessment": {
                "company_id": "orbit-retail",
                "assessment_id": "7b6d6f54-9c1e-4a0e-bb1d-6a2f1c9e4dbb",
                "sector": "retail",
                "position_factor": 0.9,
                "signals": {},
                "job_function_counts": {}
            }
        }
    ]
}"#;

/// Build the same Router the binary uses, on stub state.
fn test_router() -> (Router, Arc<InMemoryScoreStore>) {
    let provider = Arc::new(
        FixtureEvidenceProvider::from_json_str(PORTFOLIO).expect("portfolio json"),
    );
    let store = Arc::new(InMemoryScoreStore::new());
    let runner = Arc::new(
        ScoringRunner::new(store.clone(), provider.clone()).with_max_concurrency(2),
    );
    let config = ConfigHandle::new(ScoringConfig::builtin());
    let state = AppState::new(config, store.clone(), provider, runner);
    (create_router(state), store)
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json body")
}

fn post(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET request")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let (app, _) = test_router();

    let resp = app.oneshot(get("/health")).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let body = String::from_utf8(bytes).expect("utf8");
    assert_eq!(body.trim(), "ok", "health body should be 'ok'");
}

#[tokio::test]
async fn api_score_single_company_reports_run_and_outcome() {
    let (app, store) = test_router();

    let resp = app
        .oneshot(post("/api/v1/scoring/companies/acme-corp", &json!({})))
        .await
        .expect("oneshot score company");
    assert!(
        resp.status().is_success(),
        "POST companies/{{id}} should be 2xx, got {}",
        resp.status()
    );

    let v = read_json(resp).await;
    assert!(v.get("run_id").is_some(), "missing 'run_id'");
    assert_eq!(v["status"], json!("completed"));
    let outcomes = v["outcomes"].as_array().expect("outcomes array");
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0]["company_id"], json!("acme-corp"));
    assert_eq!(outcomes[0]["status"], json!("scored"));

    assert_eq!(store.score_count(), 1, "exactly one score row written");
}

#[tokio::test]
async fn api_batch_scores_all_listed_companies() {
    let (app, _) = test_router();

    let payload = json!({ "company_ids": ["acme-corp", "orbit-retail", "ghost-co"] });
    let resp = app
        .oneshot(post("/api/v1/scoring/batch", &payload))
        .await
        .expect("oneshot batch");
    assert!(resp.status().is_success());

    let v = read_json(resp).await;
    let outcomes = v["outcomes"].as_array().expect("outcomes array");
    assert_eq!(outcomes.len(), 3, "every requested company reports an outcome");

    let status_of = |company: &str| {
        outcomes
            .iter()
            .find(|o| o["company_id"] == json!(company))
            .map(|o| o["status"].clone())
            .unwrap_or(Json::Null)
    };
    assert_eq!(status_of("acme-corp"), json!("scored"));
    assert_eq!(status_of("orbit-retail"), json!("scored"));
    // Unknown to the provider: failed, not dropped.
    assert_eq!(status_of("ghost-co"), json!("failed"));
}

#[tokio::test]
async fn api_tickers_resolves_and_skips_garbage() {
    let (app, _) = test_router();

    let payload = json!({ "tickers": ["acme", "ZZZZ", "not a ticker!"] });
    let resp = app
        .oneshot(post("/api/v1/scoring/tickers", &payload))
        .await
        .expect("oneshot tickers");
    assert!(resp.status().is_success());

    let v = read_json(resp).await;
    let outcomes = v["outcomes"].as_array().expect("outcomes array");
    assert_eq!(outcomes.len(), 3);

    // Lowercase ticker resolves case-insensitively to the company id.
    let scored: Vec<&Json> = outcomes
        .iter()
        .filter(|o| o["status"] == json!("scored"))
        .collect();
    assert_eq!(scored.len(), 1);
    assert_eq!(scored[0]["company_id"], json!("acme-corp"));

    let skipped: Vec<&Json> = outcomes
        .iter()
        .filter(|o| o["status"] == json!("skipped"))
        .collect();
    assert_eq!(skipped.len(), 2, "unknown and malformed tickers are skipped");
}

#[tokio::test]
async fn api_results_serves_latest_score_and_404s_unknown() {
    let (app, _) = test_router();

    let resp = app
        .clone()
        .oneshot(post("/api/v1/scoring/companies/acme-corp", &json!({})))
        .await
        .expect("oneshot score");
    assert!(resp.status().is_success());

    let resp = app
        .clone()
        .oneshot(get("/api/v1/scoring/results/acme-corp"))
        .await
        .expect("oneshot result");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["company_id"], json!("acme-corp"));
    assert!(v["composite_score"].as_f64().is_some());
    assert!(v["score_band"].as_str().is_some());
    assert!(v["dimension_breakdown"].as_array().is_some());

    let resp = app
        .oneshot(get("/api/v1/scoring/results/nobody"))
        .await
        .expect("oneshot missing result");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_run_detail_and_audit_trail_are_readable() {
    let (app, _) = test_router();

    let resp = app
        .clone()
        .oneshot(post("/api/v1/scoring/companies/acme-corp", &json!({})))
        .await
        .expect("oneshot score");
    let v = read_json(resp).await;
    let run_id = v["run_id"].as_str().expect("run id").to_string();

    let resp = app
        .clone()
        .oneshot(get(&format!("/api/v1/scoring/runs/{run_id}")))
        .await
        .expect("oneshot run detail");
    assert_eq!(resp.status(), StatusCode::OK);
    let detail = read_json(resp).await;
    assert_eq!(detail["run"]["status"], json!("completed"));
    assert_eq!(detail["scores"].as_array().map(Vec::len), Some(1));

    let resp = app
        .oneshot(get(&format!("/api/v1/scoring/audit/{run_id}/acme-corp")))
        .await
        .expect("oneshot audit trail");
    assert_eq!(resp.status(), StatusCode::OK);
    let trail = read_json(resp).await;
    let entries = trail.as_array().expect("audit array");
    assert_eq!(entries.len(), 7, "full trail has all seven stages");
    assert_eq!(entries[0]["step"], json!("rubric"));
    assert_eq!(entries[6]["step"], json!("final"));
}

#[tokio::test]
async fn api_audit_trail_404s_for_unknown_pair() {
    let (app, _) = test_router();
    let bogus_run = uuid::Uuid::new_v4();

    let resp = app
        .oneshot(get(&format!("/api/v1/scoring/audit/{bogus_run}/acme-corp")))
        .await
        .expect("oneshot audit 404");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
