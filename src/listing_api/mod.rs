//! Listing-search API client
//!
//! The partner's public search API does not expose paused listings by
//! default, so a lookup is two-phase: query without the paused flag first,
//! and only when the listing is missing or non-active, query again with
//! `paused=true`. The second response's title wins because the first one may
//! be empty or stale for paused listings.
//!
//! Transport and body-decode failures are *not* retried here; they surface
//! as [`ApiLookup::Error`] and the resolution coordinator decides whether a
//! direct page fetch can still settle the reference.

use serde::Deserialize;
use tracing::debug;

use crate::config::WatchConfig;
use crate::error::WatchResult;

/// Listing status value the API uses for bookable listings.
const STATUS_ACTIVE: &str = "active";

/// Outcome of one two-phase API lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiLookup {
    /// The API knows this listing.
    Found {
        active: bool,
        title: String,
        /// Inactivity reason as reported by the API; frequently null even
        /// for paused listings.
        reason: Option<String>,
    },
    /// Neither the active-only nor the paused-included query found the id.
    NotFound,
    /// Transport or decode failure; carries the formatted detail.
    Error(String),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    count: u64,
    #[serde(default)]
    results: Vec<ExperienceHit>,
}

#[derive(Debug, Deserialize)]
struct ExperienceHit {
    #[allow(dead_code)]
    id: u64,
    title: String,
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Client for the partner's listing-search API.
#[derive(Debug, Clone)]
pub struct ListingStatusClient {
    client: reqwest::Client,
    base_url: String,
}

impl ListingStatusClient {
    /// Build a client with the configured endpoint and per-call timeout.
    pub fn new(config: &WatchConfig) -> WatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    /// Resolve one listing id to its structured status.
    ///
    /// Never returns a transport error to the caller; failures collapse into
    /// [`ApiLookup::Error`] so a single flaky call cannot abort a batch.
    pub async fn lookup(&self, listing_id: u64) -> ApiLookup {
        match self.lookup_inner(listing_id).await {
            Ok(lookup) => lookup,
            Err(e) => {
                debug!(listing_id, error = %e, "listing-search API call failed");
                ApiLookup::Error(format!("API error: {e}"))
            }
        }
    }

    async fn lookup_inner(&self, listing_id: u64) -> Result<ApiLookup, reqwest::Error> {
        // Phase 1: active-only query. An active hit short-circuits.
        let first = self.search(listing_id, false).await?;
        let mut known = first_hit(first);

        if let Some(hit) = &known
            && hit.status == STATUS_ACTIVE
        {
            return Ok(ApiLookup::Found {
                active: true,
                title: hit.title.clone(),
                reason: None,
            });
        }

        // Phase 2: the listing is missing or non-active; ask again with
        // paused listings included. A hit here carries the fresher title.
        let second = self.search(listing_id, true).await?;
        if let Some(hit) = first_hit(second) {
            known = Some(hit);
        }

        Ok(match known {
            Some(hit) => ApiLookup::Found {
                active: false,
                title: hit.title,
                reason: hit.reason,
            },
            None => ApiLookup::NotFound,
        })
    }

    async fn search(
        &self,
        listing_id: u64,
        include_paused: bool,
    ) -> Result<SearchResponse, reqwest::Error> {
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[("ids", listing_id.to_string())]);
        if include_paused {
            request = request.query(&[("paused", "true")]);
        }
        request
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await
    }
}

fn first_hit(response: SearchResponse) -> Option<ExperienceHit> {
    if response.count == 0 {
        return None;
    }
    response.results.into_iter().next()
}
