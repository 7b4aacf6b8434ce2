use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder. If a recorder is already
    /// installed in this process the handle degrades to a detached one
    /// (renders, but records nothing); `strict-metrics` turns that into a
    /// panic instead.
    pub fn init() -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = match builder.install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                if cfg!(feature = "strict-metrics") {
                    panic!("prometheus: install recorder: {e}");
                }
                tracing::warn!(error = %e, "prometheus recorder unavailable, serving detached handle");
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
