use axum::{routing::get, Router};
use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::fetch::RetryPolicy;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_attempts_total", "Page GET attempts, retries included.");
        describe_counter!(
            "fetch_failures_total",
            "Failed page GET attempts by kind (timeout/transport)."
        );
        describe_counter!(
            "fetch_exhausted_total",
            "Page fetches that ran out of attempts."
        );
        describe_counter!("uploads_total", "Images imported into Cloudflare Images.");
        describe_counter!(
            "upload_failures_total",
            "Failed imports by kind (request/rejected/malformed)."
        );
        describe_counter!(
            "pipeline_runs_total",
            "Trigger invocations by outcome (updated/ignored/<failed stage>)."
        );
    });
}

impl Metrics {
    /// Install the Prometheus recorder and publish the active retry policy.
    pub fn init(policy: &RetryPolicy) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();

        gauge!("fetch_max_attempts").set(f64::from(policy.max_attempts));
        gauge!("fetch_initial_timeout_ms").set(policy.first_timeout().as_millis() as f64);

        Ok(Self { handle })
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
