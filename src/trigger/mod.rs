//! Terminal image pipeline, run once per created Terminal document.
//!
//! ```text
//! DocumentCreated ─▶ TerminalRecord ─▶ ImageLocator ─▶ ImageUploader ─▶ DocumentStore
//!                    (link, name)      (fetch+parse)   (Cloudflare)     terminalImageUrl
//! ```
//!
//! Every stage short-circuits on failure; the document is only written when
//! all of them produced a value.

pub mod event;

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{error, info};

use crate::locate::{ImageLocator, LocateOutcome, NotFoundReason};
use crate::store::DocumentStore;
use crate::upload::{ImageUploader, UploadError};

pub use event::{DocumentCreated, DocumentPattern, EventError, MissingField, TerminalRecord};

/// Output field written on success.
pub const IMAGE_URL_FIELD: &str = "terminalImageUrl";

/// Stage at which a run stopped.
#[derive(Debug, Error)]
pub enum PipelineFailure {
    #[error(transparent)]
    FieldMissing(#[from] MissingField),

    #[error("terminal page could not be fetched")]
    FetchFailed,

    #[error("hero image not found: {0}")]
    ParseFailed(NotFoundReason),

    #[error(transparent)]
    UploadFailed(#[from] UploadError),

    #[error("write-back failed: {0:#}")]
    WriteFailed(anyhow::Error),
}

impl PipelineFailure {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineFailure::FieldMissing(_) => "field_missing",
            PipelineFailure::FetchFailed => "fetch_failed",
            PipelineFailure::ParseFailed(_) => "parse_failed",
            PipelineFailure::UploadFailed(_) => "upload_failed",
            PipelineFailure::WriteFailed(_) => "write_failed",
        }
    }
}

impl From<NotFoundReason> for PipelineFailure {
    fn from(reason: NotFoundReason) -> Self {
        if reason.is_fetch_failure() {
            PipelineFailure::FetchFailed
        } else {
            PipelineFailure::ParseFailed(reason)
        }
    }
}

/// What happened to one event.
#[derive(Debug)]
pub enum Dispatch {
    /// `terminalImageUrl` was written.
    Updated { hosted_url: String },
    /// The pipeline stopped early; the document is untouched.
    Skipped(PipelineFailure),
    /// The document path is outside the trigger pattern.
    Ignored,
}

/// Collaborators are built once per process and shared across invocations.
pub struct TerminalImagePipeline {
    locator: ImageLocator,
    uploader: Arc<dyn ImageUploader>,
    store: Arc<dyn DocumentStore>,
    pattern: DocumentPattern,
}

impl TerminalImagePipeline {
    pub fn new(
        locator: ImageLocator,
        uploader: Arc<dyn ImageUploader>,
        store: Arc<dyn DocumentStore>,
        pattern: DocumentPattern,
    ) -> Self {
        Self {
            locator,
            uploader,
            store,
            pattern,
        }
    }

    pub fn pattern(&self) -> &DocumentPattern {
        &self.pattern
    }

    /// Pattern check + run. Never returns an error: failures become `Skipped`.
    pub async fn dispatch(&self, event: &DocumentCreated) -> Dispatch {
        if !self.pattern.matches(&event.document_path) {
            info!(
                document = %event.document_path,
                pattern = self.pattern.as_str(),
                "event outside trigger pattern, ignoring"
            );
            counter!("pipeline_runs_total", "outcome" => "ignored").increment(1);
            return Dispatch::Ignored;
        }

        match self.handle(event).await {
            Ok(hosted_url) => {
                counter!("pipeline_runs_total", "outcome" => "updated").increment(1);
                Dispatch::Updated { hosted_url }
            }
            Err(failure) => {
                counter!("pipeline_runs_total", "outcome" => failure.stage()).increment(1);
                Dispatch::Skipped(failure)
            }
        }
    }

    /// Run the four stages for one created Terminal. Returns the hosted URL
    /// that was written.
    pub async fn handle(&self, event: &DocumentCreated) -> Result<String, PipelineFailure> {
        let doc = event.document_path.as_str();
        let display_name = event.fields.get("name").map(String::as_str).unwrap_or(doc);

        let terminal = TerminalRecord::from_fields(&event.fields).inspect_err(|missing| {
            error!(document = doc, %missing, "terminal field missing for {display_name}");
        })?;

        let image_url = match self.locator.locate(&terminal.link).await {
            LocateOutcome::Found(url) => url,
            LocateOutcome::NotFound(reason) => {
                error!(document = doc, link = %terminal.link, %reason, "image URL not found for {}", terminal.name);
                return Err(reason.into());
            }
        };

        let hosted_url = self.uploader.upload(&image_url).await.inspect_err(|e| {
            error!(
                document = doc,
                provider = self.uploader.provider_name(),
                error = %e,
                "image not saved in Cloudflare Images for {}",
                terminal.name
            );
        })?;

        self.store
            .update_field(doc, IMAGE_URL_FIELD, &hosted_url)
            .await
            .map_err(|e| {
                error!(document = doc, store = self.store.name(), error = ?e, "write-back failed for {}", terminal.name);
                PipelineFailure::WriteFailed(e)
            })?;

        info!(document = doc, hosted_url = %hosted_url, "terminal image URL updated for {}", terminal.name);
        Ok(hosted_url)
    }
}
