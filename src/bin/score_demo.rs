//! Demo that scores the embedded fixture portfolio once and prints results.

use std::sync::Arc;

use org_air_scorer::config::ScoringConfig;
use org_air_scorer::provider::FixtureEvidenceProvider;
use org_air_scorer::runner::ScoringRunner;
use org_air_scorer::store::{InMemoryScoreStore, ScoreStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = Arc::new(ScoringConfig::from_toml()?);
    let provider = Arc::new(FixtureEvidenceProvider::embedded());
    let companies = provider.company_ids();
    let store = Arc::new(InMemoryScoreStore::new());
    let runner = ScoringRunner::new(store.clone(), provider);

    let report = runner.run_batch(&companies, config).await?;
    println!(
        "run {}: {} scored, {} failed",
        report.run_id,
        report.scored_count(),
        report.failed_count()
    );

    for company in &companies {
        if let Some(score) = store.latest_score_for(company).await? {
            println!(
                "{:<16} composite {:>6.2} [{}]  ci {:.2}..{:.2} ({})",
                score.company_id,
                score.composite_score,
                score.score_band.as_str(),
                score.sem_lower,
                score.sem_upper,
                score.sem_method.as_str(),
            );
        }
    }

    println!("score-demo done");
    Ok(())
}
