// src/lib.rs
// Public library surface for the binary, the demo bin and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod metrics;
pub mod telemetry;

// Pipeline stages, leaves first
pub mod fetch;
pub mod locate;
pub mod store;
pub mod trigger;
pub mod upload;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::fetch::{ensure_url_encoded, ResilientFetcher, RetryPolicy};
pub use crate::locate::{ImageLocator, LocateOutcome, NotFoundReason};
pub use crate::trigger::{Dispatch, DocumentCreated, PipelineFailure, TerminalImagePipeline};
pub use crate::upload::{CloudflareImages, ImageUploader, UploadError};
