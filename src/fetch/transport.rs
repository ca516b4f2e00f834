// src/fetch/transport.rs
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// User agent sent with every page fetch.
pub const USER_AGENT: &str = "terminal-image-sync/0.1 (+hero image importer)";

/// A page returned by the transport. Any HTTP status counts as a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Transport-level failures. Both variants are retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),
}

/// Single GET with a per-request timeout. Split out so the retry loop can be
/// driven by a scripted transport in tests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage, TransportError>;
}

/// Production transport on top of a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage, TransportError> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;
        let status = resp.status().as_u16();
        // Body read shares the request deadline.
        let body = resp.text().await.map_err(classify)?;
        Ok(FetchedPage { status, body })
    }
}
