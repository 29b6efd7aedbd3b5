//! Resolution coordinator: reconciles the API signal with the scraped page
//!
//! One [`Reference`] in, one [`Resolution`] out: the activity [`Verdict`]
//! plus any fresher title the API or the page reported along the way. The
//! precedence rules live in [`reconcile`], a free function over the two
//! tagged signals, so the override logic stays in one place and is testable
//! without any network:
//!
//! - An API-active listing is final; the page is never fetched for it.
//! - An API-inactive or API-unknown deep link gets a page fetch, because the
//!   page often carries a richer inactivity reason than the API's (which is
//!   frequently null). A page-derived reason overrides the API's; anything
//!   short of an extracted reason leaves the API verdict standing.
//! - With no usable id, the page is the only signal; with no URL either, the
//!   scan-time preset verdict is used unchanged.
//!
//! No failure in here is fatal to a run: a panic while resolving one
//! reference is caught, logged, and becomes an ambiguous manual-review
//! verdict for that reference alone.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::{FutureExt, StreamExt};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::WatchConfig;
use crate::error::{WatchError, WatchResult};
use crate::listing_api::{ApiLookup, ListingStatusClient};
use crate::model::{
    Article, LinkRecord, REASON_FETCH_FAILED, REASON_MANUAL_REVIEW, REASON_NOT_FOUND_IN_API,
    REASON_UNKNOWN_PAGE, REASON_WIDGET_URL_MISSING, Reference, RefKind, TITLE_NOT_FOUND,
    TITLE_PLACEHOLDER, Verdict,
};
use crate::page_classifier::{PageClassifier, PageSignal};
use crate::scanner::scan;

/// Cooperative cancellation flag, checked between references.
///
/// Verdicts are immutable and written one at a time, so stopping between
/// references can never corrupt partially produced output.
#[derive(Debug, Clone)]
pub struct CancelFlag {
    rx: watch::Receiver<bool>,
}

impl CancelFlag {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// A flag that never fires, for callers without a cancellation path.
    /// The dropped sender leaves the receiver holding `false` forever.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

/// Handle that trips the matching [`CancelFlag`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a linked cancellation handle/flag pair.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelFlag) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelFlag { rx })
}

/// Where articles come from. Paging/indexing against the CMS is the
/// collaborator's business; the engine only sees the delivered batch.
pub trait ArticleSource: Send + Sync {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = WatchResult<Vec<Article>>> + Send + '_>>;
}

/// Where resolution records go. Upsert semantics (keyed by post, listing and
/// link type) are the sink's business.
pub trait RecordSink: Send + Sync {
    fn upsert<'a>(
        &'a self,
        records: &'a [LinkRecord],
    ) -> Pin<Box<dyn Future<Output = WatchResult<()>> + Send + 'a>>;
}

/// Counters for one completed run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    pub articles_checked: usize,
    pub references_checked: usize,
    pub inactive: usize,
    pub ambiguous: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_secs: u64,
}

/// The outcome of resolving one [`Reference`]: the verdict, plus a fresher
/// title when the API or the page reported one. `title: None` means the
/// scan-time title stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub verdict: Verdict,
    pub title: Option<String>,
}

/// The freshest title the two signals can offer, mirroring the reason
/// precedence: a title extracted from a paused page wins, then a non-empty
/// API title, and an API-unknown listing gets the "listing not found"
/// title. `None` leaves the scan-time title in place.
#[must_use]
pub fn resolved_title(api: &ApiLookup, page: Option<&PageSignal>) -> Option<String> {
    if let Some(title) = page.and_then(paused_title) {
        return Some(title);
    }
    match api {
        ApiLookup::Found { title, .. } if !title.is_empty() => Some(title.clone()),
        ApiLookup::NotFound => Some(TITLE_NOT_FOUND.to_string()),
        _ => None,
    }
}

/// Title from a paused page, unless the classifier substituted its
/// placeholder for a missing heading.
fn paused_title(signal: &PageSignal) -> Option<String> {
    match signal {
        PageSignal::Paused { title, .. } if title != TITLE_PLACEHOLDER => Some(title.clone()),
        _ => None,
    }
}

/// Apply the precedence rules to the two signals for an id-bearing
/// reference.
///
/// `page` is `None` when no page fetch was warranted (API said active, or
/// the reference had no fetchable URL).
#[must_use]
pub fn reconcile(api: &ApiLookup, page: Option<&PageSignal>) -> Verdict {
    match api {
        // The API is authoritative for the active case.
        ApiLookup::Found { active: true, .. } => Verdict::active(),

        ApiLookup::Found {
            active: false,
            reason,
            ..
        } => enrich_with_page(Verdict::inactive_opt(reason.clone()), page),

        ApiLookup::NotFound => enrich_with_page(Verdict::inactive(REASON_NOT_FOUND_IN_API), page),

        // The API gave us nothing; the page is the only usable signal.
        ApiLookup::Error(detail) => match page {
            Some(PageSignal::Active | PageSignal::Collection) => Verdict::active().ambiguous(),
            Some(PageSignal::Paused { reason, .. }) => Verdict::inactive(reason.clone()),
            Some(PageSignal::Unknown) => Verdict::inactive(REASON_UNKNOWN_PAGE).ambiguous(),
            Some(PageSignal::FetchFailed(_)) | None => {
                Verdict::inactive(detail.clone()).ambiguous()
            }
        },
    }
}

/// Fold a page signal into an API-derived Inactive verdict. Only an
/// extracted paused reason may override the API reason; an unknown shape
/// flags the verdict for review; a clean or failed fetch changes nothing.
fn enrich_with_page(mut verdict: Verdict, page: Option<&PageSignal>) -> Verdict {
    match page {
        Some(PageSignal::Paused { reason, .. }) => {
            verdict.inactivity_reason = Some(reason.clone());
        }
        Some(PageSignal::Unknown) => {
            verdict.is_ambiguous = true;
        }
        _ => {}
    }
    verdict
}

/// Verdict for a reference that carries a URL but no resolvable id: the
/// page is inspected directly, and nothing can be fully certain without an
/// id confirming what the page belongs to.
fn verdict_from_page_only(signal: PageSignal) -> Verdict {
    match signal {
        // The page loads fine, but without an id we cannot be sure.
        PageSignal::Active | PageSignal::Collection => Verdict::active().ambiguous(),
        PageSignal::Paused { reason, .. } => Verdict::inactive(reason),
        PageSignal::Unknown => Verdict::inactive(REASON_UNKNOWN_PAGE).ambiguous(),
        PageSignal::FetchFailed(_) => Verdict::inactive(REASON_FETCH_FAILED).ambiguous(),
    }
}

/// Run one reference's resolution future with panic containment: a panic is
/// caught, logged, and replaced by an ambiguous manual-review verdict so the
/// rest of the batch proceeds.
async fn resolve_guarded<F>(resolution: F, post_id: u64, reference: &Reference) -> Resolution
where
    F: Future<Output = Resolution>,
{
    match AssertUnwindSafe(resolution).catch_unwind().await {
        Ok(resolution) => resolution,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(
                post_id,
                ordinal = reference.ordinal,
                kind = reference.kind.as_str(),
                detail,
                "reference resolution panicked"
            );
            Resolution {
                verdict: Verdict::inactive(REASON_MANUAL_REVIEW).ambiguous(),
                title: None,
            }
        }
    }
}

/// Orchestrates the listing-status client and the page classifier into one
/// verdict per reference.
pub struct Resolver {
    config: WatchConfig,
    api: ListingStatusClient,
    pages: PageClassifier,
}

impl Resolver {
    pub fn new(config: WatchConfig) -> WatchResult<Self> {
        let api = ListingStatusClient::new(&config)?;
        let pages = PageClassifier::new(&config)?;
        Ok(Self { config, api, pages })
    }

    /// Resolve one reference to its verdict and any fresher title.
    pub async fn resolve(&self, reference: &Reference) -> Resolution {
        // Scan-time verdicts (message-off widgets, URL-less widgets) are
        // final; no network.
        if let Some(preset) = &reference.preset {
            return Resolution {
                verdict: preset.clone(),
                title: None,
            };
        }

        if let Some(listing_id) = reference.listing_id {
            let api = self.api.lookup(listing_id).await;
            let page = match &api {
                // Fetching on top of an authoritative active answer would be
                // wasted work and impolite.
                ApiLookup::Found { active: true, .. } => None,
                ApiLookup::Found { active: false, .. } | ApiLookup::NotFound => {
                    self.fetch_for_richer_reason(reference).await
                }
                ApiLookup::Error(_) => match &reference.url {
                    Some(url) => Some(self.pages.classify(url).await),
                    None => None,
                },
            };
            return Resolution {
                verdict: reconcile(&api, page.as_ref()),
                title: resolved_title(&api, page.as_ref()),
            };
        }

        match &reference.url {
            Some(url) => {
                let signal = self.pages.classify(url).await;
                Resolution {
                    title: paused_title(&signal),
                    verdict: verdict_from_page_only(signal),
                }
            }
            // The scanner presets this case; kept for directly built refs.
            None => Resolution {
                verdict: Verdict::inactive(REASON_WIDGET_URL_MISSING).ambiguous(),
                title: None,
            },
        }
    }

    /// Page fetch for an API-inactive reference: only deep links into a
    /// specific listing page are worth a confirmation fetch.
    async fn fetch_for_richer_reason(&self, reference: &Reference) -> Option<PageSignal> {
        if reference.kind != RefKind::Deeplink {
            return None;
        }
        let url = reference.url.as_ref()?;
        Some(self.pages.classify(url).await)
    }

    /// Scan one article and resolve every extracted reference sequentially.
    ///
    /// A panic while resolving a single reference is contained: that one
    /// reference gets an ambiguous manual-review verdict and the batch
    /// continues. Cancellation is honored between references.
    pub async fn resolve_article(&self, article: &Article, cancel: &CancelFlag) -> Vec<LinkRecord> {
        let outcome = scan(&article.html_body, &self.config.partner_domain);
        info!(
            post_id = article.id,
            post_title = %article.title,
            widgets = outcome.widgets.len(),
            deeplinks = outcome.deeplinks.len(),
            "resolving article references"
        );

        let mut records = Vec::with_capacity(outcome.len());
        for reference in outcome.iter() {
            if cancel.is_cancelled() {
                warn!(post_id = article.id, "cancelled mid-article, returning partial records");
                break;
            }
            let resolution = resolve_guarded(self.resolve(reference), article.id, reference).await;
            records.push(LinkRecord::new(
                article,
                reference,
                resolution.verdict,
                resolution.title,
            ));
        }
        records
    }

    /// Fan out over articles with a bounded worker pool. Politeness delays
    /// and retry policy stay per outbound request, not global.
    pub async fn resolve_articles(
        &self,
        articles: &[Article],
        cancel: &CancelFlag,
    ) -> Vec<LinkRecord> {
        futures::stream::iter(articles)
            .map(|article| self.resolve_article(article, cancel))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Full run: fetch articles from the source, resolve everything, upsert
    /// into the sink, and return the run counters.
    pub async fn run(
        &self,
        source: &dyn ArticleSource,
        sink: &dyn RecordSink,
        cancel: &CancelFlag,
    ) -> WatchResult<RunSummary> {
        let started_at = chrono::Utc::now();
        let clock = Instant::now();

        let articles = source.fetch().await?;
        if cancel.is_cancelled() {
            return Err(WatchError::Cancelled);
        }

        let records = self.resolve_articles(&articles, cancel).await;
        sink.upsert(&records).await?;

        let summary = RunSummary {
            articles_checked: articles.len(),
            references_checked: records.len(),
            inactive: records.iter().filter(|r| !is_active_record(r)).count(),
            ambiguous: records.iter().filter(|r| r.is_ambiguous).count(),
            started_at,
            duration_secs: round_secs(clock.elapsed()),
        };
        info!(
            articles = summary.articles_checked,
            references = summary.references_checked,
            inactive = summary.inactive,
            ambiguous = summary.ambiguous,
            duration_secs = summary.duration_secs,
            "monitoring run complete"
        );
        Ok(summary)
    }
}

fn is_active_record(record: &LinkRecord) -> bool {
    record.status == crate::model::ActivityStatus::Active
}

fn round_secs(elapsed: Duration) -> u64 {
    elapsed.as_secs() + u64::from(elapsed.subsec_millis() >= 500)
}
