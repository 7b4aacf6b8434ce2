//! Org-AI-R Scoring Service — Binary Entrypoint
//! Boots the Axum HTTP server, wiring config, store, provider and routes.
//!
//! See `README.md` for quickstart and `DESIGN.md` for architecture notes.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use org_air_scorer::api::{create_router, AppState};
use org_air_scorer::config::{ConfigHandle, ScoringConfig};
use org_air_scorer::metrics::Metrics;
use org_air_scorer::provider::{EvidenceProvider, FixtureEvidenceProvider};
use org_air_scorer::runner::{ScoringRunner, DEFAULT_MAX_CONCURRENCY};
use org_air_scorer::store::InMemoryScoreStore;

/// Compact tracing with env-filter override (RUST_LOG wins when set).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("org_air_scorer=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn max_concurrency_from_env() -> usize {
    std::env::var("ORG_AIR_MAX_CONCURRENCY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_CONCURRENCY)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent. Enables ORG_AIR_CONFIG_PATH
    // and friends without exporting them by hand.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = ConfigHandle::new(ScoringConfig::from_toml()?);

    #[cfg(feature = "demo-fixtures")]
    let provider: Arc<dyn EvidenceProvider> = Arc::new(FixtureEvidenceProvider::embedded());
    #[cfg(not(feature = "demo-fixtures"))]
    let provider: Arc<dyn EvidenceProvider> = {
        tracing::warn!(
            "no evidence provider wired in; scoring requests will fail \
             (build with --features demo-fixtures for the demo portfolio)"
        );
        Arc::new(FixtureEvidenceProvider::empty())
    };

    let store = Arc::new(InMemoryScoreStore::new());
    let runner = Arc::new(
        ScoringRunner::new(store.clone(), Arc::clone(&provider))
            .with_max_concurrency(max_concurrency_from_env()),
    );

    let metrics = Metrics::init();
    let state = AppState::new(config, store, provider, runner);
    let app = create_router(state).merge(metrics.router());

    let addr = std::env::var("ORG_AIR_BIND").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "scoring service listening");
    axum::serve(listener, app).await?;
    Ok(())
}
