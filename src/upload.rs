//! Cloudflare Images import client.
//!
//! A single POST per image, no retry and no per-request timeout beyond the
//! client default. Unlike the page fetcher, a failed import is not retried.

use async_trait::async_trait;
use metrics::counter;
use reqwest::{multipart::Form, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::config::CloudflareConfig;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("image host rejected upload ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed image host response: {0}")]
    MalformedResponse(String),
}

/// Anything that can take a public image URL and hand back a hosted one.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, source_image_url: &str) -> Result<String, UploadError>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct ImportResponse {
    result: ImportResult,
}

#[derive(Debug, Deserialize)]
struct ImportResult {
    id: String,
}

/// `{base}/{id}/`; the trailing slash is part of the delivery URL format.
pub fn hosted_url(image_base_url: &str, image_id: &str) -> String {
    format!("{image_base_url}/{image_id}/")
}

pub struct CloudflareImages {
    http: reqwest::Client,
    cfg: CloudflareConfig,
}

impl CloudflareImages {
    pub fn new(cfg: CloudflareConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            cfg,
        }
    }
}

#[async_trait]
impl ImageUploader for CloudflareImages {
    async fn upload(&self, source_image_url: &str) -> Result<String, UploadError> {
        let endpoint = self.cfg.import_endpoint();
        info!(endpoint = %endpoint, "sending POST request");

        let form = Form::new()
            .text("url", source_image_url.to_string())
            .text("requireSignedURLs", "false");

        let resp = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.cfg.api_token)
            .multipart(form)
            .send()
            .await
            .inspect_err(|e| {
                counter!("upload_failures_total", "kind" => "request").increment(1);
                error!(error = %e, "failed to reach Cloudflare Images");
            })?;

        let status = resp.status();
        let body = resp.text().await?;

        if status != StatusCode::OK {
            counter!("upload_failures_total", "kind" => "rejected").increment(1);
            error!(status = status.as_u16(), body = %body, "failed to save image in Cloudflare Images");
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ImportResponse = serde_json::from_str(&body).map_err(|e| {
            counter!("upload_failures_total", "kind" => "malformed").increment(1);
            error!(error = %e, body = %body, "unexpected Cloudflare Images response");
            UploadError::MalformedResponse(e.to_string())
        })?;

        counter!("uploads_total").increment(1);
        Ok(hosted_url(&self.cfg.image_base_url, &parsed.result.id))
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare-images"
    }
}
