//! Process configuration, read once at startup from the environment
//! (plus an optional fetch policy file).

pub mod cloudflare;
pub mod fetch;

use anyhow::Result;
use std::env;

use crate::fetch::RetryPolicy;
pub use cloudflare::CloudflareConfig;

pub const ENV_FIRESTORE_DOCUMENTS_URL: &str = "FIRESTORE_DOCUMENTS_URL";
pub const ENV_FIRESTORE_ACCESS_TOKEN: &str = "FIRESTORE_ACCESS_TOKEN";
/// Collection path pattern the trigger is bound to.
pub const ENV_TRIGGER_DOCUMENT: &str = "TRIGGER_DOCUMENT";
pub const DEFAULT_TRIGGER_DOCUMENT: &str = "Terminals/{TerminalName}";

/// Where write-backs go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Firestore REST, e.g.
    /// `https://firestore.googleapis.com/v1/projects/<p>/databases/(default)/documents`.
    Firestore {
        documents_url: String,
        access_token: String,
    },
    /// Local runs without a database.
    InMemory,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        match env::var(ENV_FIRESTORE_DOCUMENTS_URL) {
            Ok(url) if !url.trim().is_empty() => StoreConfig::Firestore {
                documents_url: url.trim_end_matches('/').to_string(),
                access_token: env::var(ENV_FIRESTORE_ACCESS_TOKEN).unwrap_or_default(),
            },
            _ => StoreConfig::InMemory,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub cloudflare: CloudflareConfig,
    pub retry: RetryPolicy,
    pub store: StoreConfig,
    pub trigger_document: String,
}

impl Settings {
    /// Expects `.env` to have been loaded already (see `main`).
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            cloudflare: CloudflareConfig::from_env(),
            retry: fetch::load_retry_policy_default()?,
            store: StoreConfig::from_env(),
            trigger_document: env::var(ENV_TRIGGER_DOCUMENT)
                .unwrap_or_else(|_| DEFAULT_TRIGGER_DOCUMENT.to_string()),
        })
    }
}
