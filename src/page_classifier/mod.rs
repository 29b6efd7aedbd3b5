//! Page classifier: fetches a listing URL and decides what kind of page
//! came back
//!
//! Shapes are recognized by marker elements, evaluated through an ordered
//! classification table (first match wins, falling through to `Unknown`), so
//! a new page shape is one more table row rather than another branch:
//!
//! 1. an experience page (`div.page-experience`), which is paused when its
//!    wrap element is hidden inline, active otherwise;
//! 2. a collection page (category/destination/author/home markers), which is
//!    inherently active since a link into a live collection is never broken;
//! 3. anything else is `Unknown` and flagged for manual review.
//!
//! Fetches wait a randomized politeness pause first and masquerade as a
//! desktop browser. Only DNS-resolution failures are retried (with a fixed
//! delay); every other transport error aborts the fetch immediately.

use std::sync::LazyLock;
use std::time::Duration;

use rand::Rng;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::config::WatchConfig;
use crate::error::WatchResult;
use crate::model::{REASON_NOT_SPECIFIED, TITLE_PLACEHOLDER};

/// What the fetched page told us about the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSignal {
    /// Experience page, listing bookable. Nothing further to do.
    Active,
    /// A live collection/category/author/home page; inherently active.
    Collection,
    /// Experience page with the listing paused or removed. Placeholders are
    /// substituted when the page omits the reason paragraph or heading.
    Paused { title: String, reason: String },
    /// No known marker matched; requires manual review.
    Unknown,
    /// The page could not be retrieved at all; carries the detail.
    FetchFailed(String),
}

impl PageSignal {
    /// A reason extracted from the page itself, if the shape carries one.
    /// This is the only signal allowed to override an API-derived reason.
    #[must_use]
    pub fn page_reason(&self) -> Option<&str> {
        match self {
            Self::Paused { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Page shapes the marker table can land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageShape {
    Experience,
    Collection,
}

// Hardcoded selectors should never fail to parse - if they do, it's a
// compile-time bug.

/// Ordered (marker, shape) classification table. Evaluated top to bottom;
/// extend by appending rows.
static SHAPE_TABLE: LazyLock<Vec<(Selector, PageShape)>> = LazyLock::new(|| {
    [
        ("div.page-experience", PageShape::Experience),
        ("div.product-header", PageShape::Collection),
        ("div.destination", PageShape::Collection),
        ("div.author_page", PageShape::Collection),
        ("div.welcome-top", PageShape::Collection),
    ]
    .into_iter()
    .map(|(css, shape)| {
        (
            Selector::parse(css).expect("BUG: hardcoded page marker selector is invalid"),
            shape,
        )
    })
    .collect()
});

static WRAP_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.page-experience__wrap").expect("BUG: hardcoded wrap selector is invalid")
});

static PAUSED_REASON_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.exp-paused p").expect("BUG: hardcoded paused reason selector is invalid")
});

static PAUSED_TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.exp-paused h1, div.exp-paused h2")
        .expect("BUG: hardcoded paused title selector is invalid")
});

/// Fetches listing URLs and classifies the resulting pages.
#[derive(Debug, Clone)]
pub struct PageClassifier {
    client: reqwest::Client,
    user_agent: String,
    max_attempts: u32,
    dns_retry_delay: Duration,
    politeness_min: Duration,
    politeness_max: Duration,
}

impl PageClassifier {
    /// Build a classifier with its own HTTP client and fetch timeout,
    /// independent of the API client's.
    ///
    /// The politeness bounds are clamped to `min <= max` here, so a config
    /// built by writing the public fields directly cannot produce an
    /// inverted sampling range.
    pub fn new(config: &WatchConfig) -> WatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            max_attempts: config.max_fetch_attempts.max(1),
            dns_retry_delay: config.dns_retry_delay,
            politeness_min: config.politeness_min.min(config.politeness_max),
            politeness_max: config.politeness_max,
        })
    }

    /// Fetch `url` and classify the page that came back.
    ///
    /// Never returns an error: fetch trouble degrades to
    /// [`PageSignal::FetchFailed`] so the caller always has a usable signal.
    pub async fn classify(&self, url: &str) -> PageSignal {
        for attempt in 1..=self.max_attempts {
            self.politeness_pause().await;

            match self.fetch(url).await {
                Ok(body) => return classify_html(&body),
                Err(e) if is_dns_failure(&e) => {
                    warn!(
                        url,
                        attempt,
                        max_attempts = self.max_attempts,
                        "DNS resolution failed"
                    );
                    if attempt == self.max_attempts {
                        return PageSignal::FetchFailed(format!(
                            "failed to resolve host after {} attempts: {e}",
                            self.max_attempts
                        ));
                    }
                    tokio::time::sleep(self.dns_retry_delay).await;
                }
                Err(e) => {
                    debug!(url, error = %e, "page fetch failed");
                    return PageSignal::FetchFailed(format!("failed to retrieve page: {e}"));
                }
            }
        }
        // max_attempts >= 1, so the loop always returns
        PageSignal::FetchFailed("no fetch attempts configured".to_string())
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    /// Randomized pause before each outbound fetch. Politeness against the
    /// scraped site, not a correctness requirement.
    async fn politeness_pause(&self) {
        if self.politeness_max.is_zero() {
            return;
        }
        let delay = {
            let mut rng = rand::rng();
            rng.random_range(self.politeness_min..=self.politeness_max)
        };
        debug!(?delay, "politeness pause before fetch");
        tokio::time::sleep(delay).await;
    }
}

/// Classify a fetched page body through the marker table.
#[must_use]
pub fn classify_html(html: &str) -> PageSignal {
    let document = Html::parse_document(html);

    for (marker, shape) in SHAPE_TABLE.iter() {
        if document.select(marker).next().is_none() {
            continue;
        }
        return match shape {
            PageShape::Experience => classify_experience_page(&document),
            PageShape::Collection => PageSignal::Collection,
        };
    }

    PageSignal::Unknown
}

/// An experience page is paused exactly when its wrap element is hidden
/// with an inline `display:none`.
fn classify_experience_page(document: &Html) -> PageSignal {
    let hidden = document
        .select(&WRAP_SELECTOR)
        .next()
        .and_then(|wrap| wrap.value().attr("style"))
        .is_some_and(|style| style.replace(' ', "").contains("display:none"));

    if !hidden {
        return PageSignal::Active;
    }

    let reason = select_text(document, &PAUSED_REASON_SELECTOR)
        .unwrap_or_else(|| REASON_NOT_SPECIFIED.to_string());
    let title = select_text(document, &PAUSED_TITLE_SELECTOR)
        .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string());

    PageSignal::Paused { title, reason }
}

fn select_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Walk the error source chain looking for a DNS-resolution failure.
/// reqwest exposes no first-class predicate for this, so we match on the
/// hyper/getaddrinfo failure text.
fn is_dns_failure(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        source = cause.source();
    }
    false
}
