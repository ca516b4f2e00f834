use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::trigger::{Dispatch, DocumentCreated, TerminalImagePipeline};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<TerminalImagePipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<TerminalImagePipeline>) -> Self {
        Self { pipeline }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/events/document-created", post(document_created))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Alias kept for `crate_root::router`.
pub fn router(state: AppState) -> Router {
    create_router(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventResp {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    terminal_image_url: Option<String>,
}

/// Pipeline failures still answer 200 so the event platform doesn't redeliver;
/// only an unreadable payload is a 400.
async fn document_created(
    State(state): State<AppState>,
    Json(payload): Json<JsonValue>,
) -> (StatusCode, Json<EventResp>) {
    let event = match DocumentCreated::from_json(&payload) {
        Ok(ev) => ev,
        Err(e) => {
            warn!(error = %e, "rejecting event payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(EventResp {
                    status: "invalid",
                    document: None,
                    stage: None,
                    detail: Some(e.to_string()),
                    terminal_image_url: None,
                }),
            );
        }
    };

    let document = Some(event.document_path.clone());
    let resp = match state.pipeline.dispatch(&event).await {
        Dispatch::Updated { hosted_url } => EventResp {
            status: "updated",
            document,
            stage: None,
            detail: None,
            terminal_image_url: Some(hosted_url),
        },
        Dispatch::Skipped(failure) => EventResp {
            status: "skipped",
            document,
            stage: Some(failure.stage()),
            detail: Some(failure.to_string()),
            terminal_image_url: None,
        },
        Dispatch::Ignored => EventResp {
            status: "ignored",
            document,
            stage: None,
            detail: Some(format!(
                "outside trigger pattern {}",
                state.pipeline.pattern().as_str()
            )),
            terminal_image_url: None,
        },
    };
    (StatusCode::OK, Json(resp))
}
