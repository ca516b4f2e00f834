// src/config/cloudflare.rs
use std::env;

use tracing::{info, warn};

pub const ENV_API_KEY: &str = "CLOUDFLARE_API_KEY";
pub const ENV_ACCOUNT_ID: &str = "CLOUDFLARE_IMGS_ACCOUNT_ID";
pub const ENV_IMAGE_BASE_URL: &str = "CLOUDFLARE_IMAGE_BASE_URL";
/// Optional override, mostly for tests against a local mock.
pub const ENV_API_BASE: &str = "CLOUDFLARE_API_BASE";

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Credentials and endpoints for Cloudflare Images (Images > Overview in the dashboard).
#[derive(Clone)]
pub struct CloudflareConfig {
    pub api_token: String,
    pub account_id: String,
    /// Delivery base, e.g. `https://imagedelivery.net/<hash>`.
    pub image_base_url: String,
    pub api_base: String,
}

impl std::fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("api_token", &format_args!("<{} chars>", self.api_token.len()))
            .field("account_id", &self.account_id)
            .field("image_base_url", &self.image_base_url)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CloudflareConfig {
    pub fn new(
        api_token: impl Into<String>,
        account_id: impl Into<String>,
        image_base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            account_id: account_id.into(),
            image_base_url: image_base_url.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Read the three Cloudflare variables. Missing values are passed through
    /// as empty strings; the upload then fails with a 4xx like any rejection.
    pub fn from_env() -> Self {
        let read = |key: &str| env::var(key).unwrap_or_default();

        let cfg = Self {
            api_token: read(ENV_API_KEY),
            account_id: read(ENV_ACCOUNT_ID),
            image_base_url: read(ENV_IMAGE_BASE_URL),
            api_base: env::var(ENV_API_BASE).unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        };

        let missing = cfg.missing_keys();
        if missing.is_empty() {
            // Safe diagnostics: never log the token itself
            info!(
                account_id = %cfg.account_id,
                key_len = cfg.api_token.len(),
                "cloudflare cfg loaded"
            );
        } else {
            warn!(?missing, "cloudflare cfg incomplete; uploads will be rejected");
        }
        cfg
    }

    pub fn missing_keys(&self) -> Vec<&'static str> {
        [
            (ENV_API_KEY, &self.api_token),
            (ENV_ACCOUNT_ID, &self.account_id),
            (ENV_IMAGE_BASE_URL, &self.image_base_url),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }

    /// `POST` target for image imports.
    pub fn import_endpoint(&self) -> String {
        format!("{}/accounts/{}/images/v1", self.api_base, self.account_id)
    }
}
