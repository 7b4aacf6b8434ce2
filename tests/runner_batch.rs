// tests/runner_batch.rs
//
// Batch runner behavior over a real store and fixture provider:
// - one bad company (unknown sector, missing evidence) never sinks siblings
// - failed companies leave their partial audit trail behind
// - a pre-set cancel flag skips every company and writes no scores
// - duplicate ids in the request collapse to a single outcome
// - the run record pins the company list and config versions

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use org_air_scorer::config::{ConfigHandle, ScoringConfig};
use org_air_scorer::provider::FixtureEvidenceProvider;
use org_air_scorer::runner::ScoringRunner;
use org_air_scorer::score::{CompanyStatus, RunStatus};
use org_air_scorer::store::{InMemoryScoreStore, ScoreStore};

// aurora-data scores cleanly; drift-marine names a sector no config profile
// covers, so its pipeline fails after the rubric resolution step.
const PORTFOLIO: &str = r#"{
    "reference": { "dimension_rows": [], "composites": [] },
    "companies": [
        {
            "ticker": "AURD",
            "assessment": {
                "company_id": "aurora-data",
                "assessment_id": "7b6d6f54-9c1e-4a0e-bb1d-6a2f1c9e4d11",
                "sector": "technology",
                "position_factor": 1.1,
                "signals": {
                    "data_infrastructure": [
                        { "kind": "filing", "age_days": 30,
                          "keywords": ["data lake", "data pipeline"] }
                    ],
                    "talent_skills": [
                        { "kind": "job_posting", "age_days": 15,
                          "keywords": ["machine learning engineer", "ml team"] }
                    ],
                    "technology_stack": [
                        { "kind": "tech_signal", "age_days": 40,
                          "keywords": ["kubernetes", "ci/cd"] }
                    ]
                },
                "job_function_counts": {
                    "data_engineering": 10, "ml_engineering": 8, "data_science": 7,
                    "analytics": 6, "ai_research": 2, "software_engineering": 12
                }
            }
        },
        {
            "ticker": "DRFM",
            "assessment": {
                "company_id": "drift-marine",
                "assessment_id": "7b6d6f54-9c1e-4a0e-bb1d-6a2f1c9e4d22",
                "sector": "maritime",
                "position_factor": 1.0,
                "signals": {},
                "job_function_counts": {}
            }
        }
    ]
}"#;

fn setup() -> (Arc<InMemoryScoreStore>, ScoringRunner, ConfigHandle) {
    let store = Arc::new(InMemoryScoreStore::new());
    let provider = Arc::new(
        FixtureEvidenceProvider::from_json_str(PORTFOLIO).expect("portfolio json"),
    );
    let runner = ScoringRunner::new(store.clone(), provider).with_max_concurrency(4);
    let config = ConfigHandle::new(ScoringConfig::builtin());
    (store, runner, config)
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn bad_companies_never_sink_their_siblings() {
    let (store, runner, config) = setup();

    let report = runner
        .run_batch(
            &ids(&["aurora-data", "drift-marine", "no-such-co"]),
            config.snapshot(),
        )
        .await
        .expect("batch runs");

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.scored_count(), 1);
    assert_eq!(report.failed_count(), 2);

    let status_of = |company: &str| {
        report
            .outcomes
            .iter()
            .find(|o| o.company_id == company)
            .map(|o| o.status)
    };
    assert_eq!(status_of("aurora-data"), Some(CompanyStatus::Scored));
    assert_eq!(status_of("drift-marine"), Some(CompanyStatus::Failed));
    assert_eq!(status_of("no-such-co"), Some(CompanyStatus::Failed));

    // Only the healthy company produced a score row.
    assert_eq!(store.score_count(), 1);
    let score = store
        .latest_score_for("aurora-data")
        .await
        .expect("store read")
        .expect("aurora scored");
    assert_eq!(score.scoring_run_id, report.run_id);
}

#[tokio::test]
async fn failed_companies_keep_their_partial_trail() {
    let (store, runner, config) = setup();

    let report = runner
        .run_batch(&ids(&["drift-marine", "no-such-co"]), config.snapshot())
        .await
        .expect("batch runs");
    assert_eq!(report.failed_count(), 2);

    // Unknown sector: resolution fails before stage one, a single terminal
    // failure entry is all there is.
    let trail = store
        .audit_trail(report.run_id, "drift-marine")
        .await
        .expect("store read");
    assert_eq!(trail.len(), 1);
    assert!(trail[0].failed());
    assert!(trail[0].output["error"]
        .as_str()
        .expect("error string")
        .contains("maritime"));

    // Missing evidence: same shape, recorded by the runner itself.
    let trail = store
        .audit_trail(report.run_id, "no-such-co")
        .await
        .expect("store read");
    assert_eq!(trail.len(), 1);
    assert!(trail[0].failed());
}

#[tokio::test]
async fn healthy_company_gets_a_complete_trail() {
    let (store, runner, config) = setup();

    let report = runner
        .run_batch(&ids(&["aurora-data"]), config.snapshot())
        .await
        .expect("batch runs");

    let trail = store
        .audit_trail(report.run_id, "aurora-data")
        .await
        .expect("store read");
    assert!(
        org_air_scorer::audit::is_complete_trail(&trail),
        "scored company leaves all seven stages"
    );
}

#[tokio::test]
async fn preset_cancel_skips_every_company() {
    let (store, runner, config) = setup();
    let cancel = Arc::new(AtomicBool::new(true));

    let report = runner
        .run_batch_with_cancel(
            &ids(&["aurora-data", "drift-marine"]),
            config.snapshot(),
            cancel,
        )
        .await
        .expect("cancelled batch still reports");

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.skipped_count(), 2);
    assert_eq!(report.scored_count(), 0);
    assert_eq!(store.score_count(), 0, "no scores written under cancel");
    for outcome in &report.outcomes {
        assert_eq!(outcome.error.as_deref(), Some("batch cancelled"));
    }

    // The run record itself still completes.
    let run = store
        .run(report.run_id)
        .await
        .expect("store read")
        .expect("run exists");
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn duplicate_ids_collapse_to_one_outcome() {
    let (store, runner, config) = setup();

    let report = runner
        .run_batch(
            &ids(&["aurora-data", "aurora-data", "aurora-data"]),
            config.snapshot(),
        )
        .await
        .expect("batch runs");

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.scored_count(), 1);
    assert_eq!(store.score_count(), 1);
}

#[tokio::test]
async fn run_record_pins_companies_and_config_versions() {
    let (store, runner, config) = setup();
    let snapshot = config.snapshot();

    let report = runner
        .run_batch(&ids(&["aurora-data"]), snapshot.clone())
        .await
        .expect("batch runs");

    let run = store
        .run(report.run_id)
        .await
        .expect("store read")
        .expect("run exists");
    assert_eq!(run.parameters["companies"], serde_json::json!(["aurora-data"]));
    assert_eq!(
        run.parameters["pins"]["digest"],
        serde_json::json!(snapshot.digest)
    );
    assert_eq!(run.parameters["provider"], serde_json::json!("fixture-portfolio"));
}

#[tokio::test]
async fn rescoring_same_company_in_new_run_adds_second_row() {
    let (store, runner, config) = setup();

    let first = runner
        .run_batch(&ids(&["aurora-data"]), config.snapshot())
        .await
        .expect("first run");
    let second = runner
        .run_batch(&ids(&["aurora-data"]), config.snapshot())
        .await
        .expect("second run");

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(store.score_count(), 2, "one row per (company, run)");

    // Identical evidence and config: the two runs agree on the numbers.
    let a = store
        .scores_for_run(first.run_id)
        .await
        .expect("store read")
        .remove(0);
    let b = store
        .scores_for_run(second.run_id)
        .await
        .expect("store read")
        .remove(0);
    assert_eq!(a.composite_score, b.composite_score);
    assert_eq!(a.vr_score, b.vr_score);
}
