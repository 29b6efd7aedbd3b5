//! tripwatch: stale-reference monitoring for partner booking content
//!
//! Articles in the CMS embed partner travel-booking content two ways:
//! rendered widget cards and freestanding deep links. Listings behind those
//! references get paused or removed over time, and nothing on the article
//! side notices. This crate scans raw article HTML for both reference kinds,
//! reconciles two independent signals per reference (the partner's
//! listing-search API and the scraped page itself), and produces one
//! unambiguous activity verdict for each, degrading every network or parse
//! failure into an "inactive, needs review" record rather than aborting the
//! run.

pub mod config;
pub mod error;
pub mod listing_api;
pub mod model;
pub mod page_classifier;
pub mod resolver;
pub mod scanner;

pub use config::WatchConfig;
pub use error::{WatchError, WatchResult};
pub use listing_api::{ApiLookup, ListingStatusClient};
pub use model::{ActivityStatus, Article, LinkRecord, RefKind, Reference, Verdict};
pub use page_classifier::{PageClassifier, PageSignal, classify_html};
pub use resolver::{
    ArticleSource, CancelFlag, CancelHandle, RecordSink, Resolution, Resolver, RunSummary,
    cancel_pair, reconcile, resolved_title,
};
pub use scanner::{ScanOutcome, listing_id_from_url, scan};
