// src/config/fetch.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fetch::RetryPolicy;

pub const ENV_PATH: &str = "FETCH_CONFIG_PATH";
pub const DEFAULT_PATH: &str = "config/fetch.toml";

/// Load a retry policy from an explicit path. Supports TOML or JSON.
pub fn load_retry_policy_from(path: &Path) -> Result<RetryPolicy> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading fetch config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_retry_policy(&content, ext.as_str())
}

/// Load the retry policy using env var + fallbacks:
/// 1) $FETCH_CONFIG_PATH
/// 2) config/fetch.toml
/// 3) built-in defaults (3 attempts, 5s timeout +5s, 2s delay doubling)
pub fn load_retry_policy_default() -> Result<RetryPolicy> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_retry_policy_from(&pb);
        } else {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_PATH);
    if toml_p.exists() {
        return load_retry_policy_from(&toml_p);
    }
    Ok(RetryPolicy::default())
}

fn parse_retry_policy(s: &str, hint_ext: &str) -> Result<RetryPolicy> {
    #[derive(serde::Deserialize)]
    struct TomlFetch {
        retry: RetryPolicy,
    }

    if hint_ext == "json" {
        let p: RetryPolicy = serde_json::from_str(s).context("parsing fetch config json")?;
        return Ok(p.sanitized());
    }
    // `[retry]` table, or the fields at top level
    if let Ok(v) = toml::from_str::<TomlFetch>(s) {
        return Ok(v.retry.sanitized());
    }
    let p: RetryPolicy = toml::from_str(s).context("parsing fetch config toml")?;
    Ok(p.sanitized())
}
