//! Runs the locate stage (and optionally the Cloudflare import) for one page URL.
//!
//! `cargo run --bin locate_once -- <page-url> [--upload]`

use std::sync::Arc;

use terminal_image_sync::config::{fetch::load_retry_policy_default, CloudflareConfig};
use terminal_image_sync::fetch::{ReqwestTransport, ResilientFetcher};
use terminal_image_sync::{CloudflareImages, ImageLocator, ImageUploader, LocateOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    terminal_image_sync::telemetry::init();

    let mut args = std::env::args().skip(1);
    let Some(page_url) = args.next() else {
        anyhow::bail!("usage: locate_once <page-url> [--upload]");
    };
    let upload = args.any(|a| a == "--upload");

    let fetcher = ResilientFetcher::new(
        Arc::new(ReqwestTransport::new()?),
        load_retry_policy_default()?,
    );
    let locator = ImageLocator::new(fetcher);

    let image_url = match locator.locate(&page_url).await {
        LocateOutcome::Found(url) => url,
        LocateOutcome::NotFound(reason) => {
            println!("not found: {reason}");
            return Ok(());
        }
    };
    println!("hero image: {image_url}");

    if upload {
        let client = CloudflareImages::new(CloudflareConfig::from_env());
        match client.upload(&image_url).await {
            Ok(hosted) => println!("hosted: {hosted}"),
            Err(e) => println!("upload failed: {e}"),
        }
    }
    Ok(())
}
