//! Document write-back. The pipeline only ever performs one partial update
//! (a single string field) on the document that triggered it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Set `field` to `value` on the document at `document_path`
    /// (e.g. `Terminals/North Pier`), leaving other fields alone.
    async fn update_field(&self, document_path: &str, field: &str, value: &str) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Firestore REST adapter (`PATCH` with an update mask). The write carries
/// `currentDocument.exists=true`, so a document deleted mid-run is not
/// recreated; Firestore answers 404 instead.
pub struct FirestoreRestStore {
    http: reqwest::Client,
    documents_url: String,
    access_token: String,
}

impl FirestoreRestStore {
    pub fn new(documents_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            documents_url: documents_url.into(),
            access_token: access_token.into(),
        }
    }

    fn document_url(&self, document_path: &str) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.documents_url)
            .with_context(|| format!("invalid documents url {}", self.documents_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("documents url cannot be a base"))?
            .pop_if_empty()
            .extend(document_path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for FirestoreRestStore {
    async fn update_field(&self, document_path: &str, field: &str, value: &str) -> Result<()> {
        let url = self.document_url(document_path)?;
        let body = json!({ "fields": { field: { "stringValue": value } } });

        self.http
            .patch(url)
            .query(&[
                ("updateMask.fieldPaths", field),
                ("currentDocument.exists", "true"),
            ])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("firestore patch")?
            .error_for_status()
            .context("firestore non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "firestore"
    }
}

/// Process-local store for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    docs: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, document_path: &str, field: &str) -> Option<String> {
        let g = self.docs.read().ok()?;
        g.get(document_path)
            .and_then(|d| d.get(field))
            .cloned()
    }

    pub fn write_count(&self) -> usize {
        self.docs
            .read()
            .map(|g| g.values().map(|d| d.len()).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn update_field(&self, document_path: &str, field: &str, value: &str) -> Result<()> {
        let mut g = self
            .docs
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        g.entry(document_path.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
