//! Hero image lookup on a terminal's web page.
//!
//! Walks `figure.hero.banner > … picture.fixed-aspect > … img` and reads the
//! `src` attribute. Only the first matching container is considered.
//!
//! Class selectors match on class membership, not on the exact attribute
//! string: `class="banner hero featured"` counts as a hero banner too. Any
//! markup change on the terminal pages can still break the lookup.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::ResilientFetcher;

static HERO_FIGURE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("figure.hero.banner").expect("valid figure selector"));
static FIXED_PICTURE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("picture.fixed-aspect").expect("valid picture selector"));
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("valid img selector"));

/// Why no image URL came out of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotFoundReason {
    #[error("page could not be fetched")]
    FetchFailed,
    #[error("no hero banner figure on page")]
    MissingFigure,
    #[error("no fixed-aspect picture inside hero banner")]
    MissingPicture,
    #[error("no img inside fixed-aspect picture")]
    MissingImg,
    #[error("img has no src attribute")]
    MissingSrc,
}

impl NotFoundReason {
    /// `true` when the page itself never arrived, as opposed to a page with
    /// an unexpected shape.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, NotFoundReason::FetchFailed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateOutcome {
    Found(String),
    NotFound(NotFoundReason),
}

/// Pull the hero image `src` out of an HTML document.
pub fn extract_hero_image(html: &str) -> Result<String, NotFoundReason> {
    let doc = Html::parse_document(html);

    let figure = doc
        .select(&HERO_FIGURE)
        .next()
        .ok_or(NotFoundReason::MissingFigure)?;
    let picture = figure
        .select(&FIXED_PICTURE)
        .next()
        .ok_or(NotFoundReason::MissingPicture)?;
    let img = picture
        .select(&IMG)
        .next()
        .ok_or(NotFoundReason::MissingImg)?;

    match img.value().attr("src").map(str::trim) {
        Some(src) if !src.is_empty() => Ok(src.to_string()),
        _ => Err(NotFoundReason::MissingSrc),
    }
}

/// Resolve a possibly relative `src` against the page it came from.
/// Falls back to the raw value when the page URL itself doesn't parse.
pub fn resolve_src(page_url: &str, src: &str) -> String {
    if Url::parse(src).is_ok() {
        return src.to_string();
    }
    match Url::parse(page_url).and_then(|base| base.join(src)) {
        Ok(abs) => abs.to_string(),
        Err(e) => {
            debug!(page_url, src, error = %e, "could not resolve relative src");
            src.to_string()
        }
    }
}

#[derive(Clone)]
pub struct ImageLocator {
    fetcher: ResilientFetcher,
}

impl ImageLocator {
    pub fn new(fetcher: ResilientFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch `page_url` and look for the hero image. Never fails loudly:
    /// every miss is reported as `NotFound` with its reason.
    pub async fn locate(&self, page_url: &str) -> LocateOutcome {
        let Some(page) = self.fetcher.get_with_retry(page_url).await else {
            info!(url = page_url, "failed to get a response");
            return LocateOutcome::NotFound(NotFoundReason::FetchFailed);
        };
        debug!(url = page_url, status = page.status, bytes = page.body.len(), "page fetched");

        match extract_hero_image(&page.body) {
            Ok(src) => LocateOutcome::Found(resolve_src(page_url, &src)),
            Err(reason) => {
                warn!(url = page_url, status = page.status, %reason, "hero image not found");
                LocateOutcome::NotFound(reason)
            }
        }
    }
}
