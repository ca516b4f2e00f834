//! Terminal image sync — binary entrypoint.
//! Boots the Axum HTTP server that receives "document created" events,
//! wiring the pipeline, shared state and metrics.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;

use terminal_image_sync::api::{self, AppState};
use terminal_image_sync::bootstrap::build_pipeline;
use terminal_image_sync::config::Settings;
use terminal_image_sync::metrics::Metrics;
use terminal_image_sync::telemetry;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    telemetry::init();

    let settings = Settings::from_env()?;
    let pipeline = build_pipeline(&settings)?;

    let mut router = api::create_router(AppState::new(Arc::new(pipeline)));
    match Metrics::init(&settings.retry) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %e, "metrics recorder not installed"),
    }

    Ok(router.into())
}
