//! Shared helpers for integration tests: local mock HTTP servers and
//! scripted collaborators.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

use terminal_image_sync::fetch::{FetchedPage, HttpTransport, TransportError};
use terminal_image_sync::upload::{ImageUploader, UploadError};
use terminal_image_sync::{DocumentCreated, ResilientFetcher, RetryPolicy};

pub const HERO_HTML: &str = r#"<html><body><figure class="hero banner"><picture class="fixed-aspect"><img src="http://img.test/a.png"></picture></figure></body></html>"#;

/// Serve `router` on an ephemeral local port; returns `http://127.0.0.1:<port>`.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// A request captured by the mock image host.
#[derive(Debug, Clone)]
pub struct Captured {
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct HostState {
    status: u16,
    body: String,
    seen: Arc<Mutex<Vec<Captured>>>,
}

/// Mock of the Cloudflare Images import endpoint answering every POST with
/// `status` + `body`.
pub async fn start_image_host(status: u16, body: &str) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = HostState {
        status,
        body: body.to_string(),
        seen: seen.clone(),
    };

    async fn import(
        State(st): State<HostState>,
        axum::extract::Path(account): axum::extract::Path<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> (StatusCode, String) {
        let header = |k: &str| {
            headers
                .get(k)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        st.seen.lock().unwrap().push(Captured {
            path: format!("/accounts/{account}/images/v1"),
            authorization: header("authorization"),
            content_type: header("content-type"),
            body: String::from_utf8_lossy(&body).to_string(),
        });
        (
            StatusCode::from_u16(st.status).unwrap_or(StatusCode::OK),
            st.body.clone(),
        )
    }

    let router = Router::new()
        .route("/accounts/{account}/images/v1", post(import))
        .with_state(state);
    (serve(router).await, seen)
}

/// Static pages keyed by path.
pub async fn start_pages(pages: &[(&'static str, &'static str)]) -> String {
    let mut router = Router::new();
    for &(path, html) in pages {
        router = router.route(path, get(move || async move { html }));
    }
    serve(router).await
}

/// Replays a fixed list of outcomes; once exhausted every call times out.
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<FetchedPage, TransportError>>>,
    calls: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedTransport {
    pub fn new(outcomes: Vec<Result<FetchedPage, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn always_timeout() -> Arc<Self> {
        Self::new(vec![])
    }

    pub fn page(body: &str) -> Arc<Self> {
        Self::new(vec![Ok(FetchedPage {
            status: 200,
            body: body.to_string(),
        })])
    }

    pub fn calls(&self) -> Vec<(String, Duration)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage, TransportError> {
        self.calls.lock().unwrap().push((url.to_string(), timeout));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TransportError::Timeout))
    }
}

pub fn fetcher(transport: Arc<ScriptedTransport>) -> ResilientFetcher {
    ResilientFetcher::new(transport, RetryPolicy::default())
}

/// Uploader double: records source URLs, answers with `{base}/{n}/` or a rejection.
pub struct FakeUploader {
    base: String,
    reject_with: Option<u16>,
    calls: Mutex<Vec<String>>,
}

impl FakeUploader {
    pub fn ok(base: &str) -> Arc<Self> {
        Arc::new(Self {
            base: base.to_string(),
            reject_with: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn rejecting(status: u16) -> Arc<Self> {
        Arc::new(Self {
            base: String::new(),
            reject_with: Some(status),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageUploader for FakeUploader {
    async fn upload(&self, source_image_url: &str) -> Result<String, UploadError> {
        let n = {
            let mut g = self.calls.lock().unwrap();
            g.push(source_image_url.to_string());
            g.len()
        };
        match self.reject_with {
            Some(status) => Err(UploadError::Rejected {
                status,
                body: "denied".into(),
            }),
            None => Ok(format!("{}/img-{n}/", self.base)),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

pub fn terminal_event(path: &str, fields: &[(&str, &str)]) -> DocumentCreated {
    let fields: HashMap<String, String> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    DocumentCreated::new(path, fields)
}
