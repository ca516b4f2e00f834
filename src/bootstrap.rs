// src/bootstrap.rs
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::{Settings, StoreConfig};
use crate::fetch::{ReqwestTransport, ResilientFetcher};
use crate::locate::ImageLocator;
use crate::store::{DocumentStore, FirestoreRestStore, InMemoryStore};
use crate::trigger::{DocumentPattern, TerminalImagePipeline};
use crate::upload::CloudflareImages;

/// Build the process-wide pipeline from settings. Called once at startup.
pub fn build_pipeline(settings: &Settings) -> anyhow::Result<TerminalImagePipeline> {
    let transport = ReqwestTransport::new().context("building page http client")?;
    let fetcher = ResilientFetcher::new(Arc::new(transport), settings.retry.clone());

    let store: Arc<dyn DocumentStore> = match &settings.store {
        StoreConfig::Firestore {
            documents_url,
            access_token,
        } => Arc::new(FirestoreRestStore::new(documents_url, access_token)),
        StoreConfig::InMemory => Arc::new(InMemoryStore::new()),
    };

    let pattern = DocumentPattern::parse(&settings.trigger_document)
        .with_context(|| format!("invalid trigger pattern {}", settings.trigger_document))?;

    info!(
        store = store.name(),
        pattern = pattern.as_str(),
        max_attempts = settings.retry.max_attempts,
        "pipeline ready"
    );

    Ok(TerminalImagePipeline::new(
        ImageLocator::new(fetcher),
        Arc::new(CloudflareImages::new(settings.cloudflare.clone())),
        store,
        pattern,
    ))
}
