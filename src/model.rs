//! Shared value objects for the resolution engine
//!
//! A [`Reference`] is one extracted mention of partner content inside an
//! article (a widget or a deep link). A [`Verdict`] is the activity
//! determination for one Reference. Both are plain value objects created and
//! consumed within a single resolution pass; a re-resolution produces a new
//! Verdict rather than mutating the old one.

use serde::{Deserialize, Serialize};

/// Display title used when a listing cannot be located at all.
pub const TITLE_NOT_FOUND: &str = "listing not found";

/// Placeholder title when a widget card or paused page carries no heading.
pub const TITLE_PLACEHOLDER: &str = "title not found";

/// Reason recorded when the search API has no knowledge of a listing id.
pub const REASON_NOT_FOUND_IN_API: &str = "listing not found in API";

/// Reason recorded when a widget container carries no usable URL.
pub const REASON_WIDGET_URL_MISSING: &str = "widget URL not found";

/// Placeholder reason when a paused page omits its explanation paragraph.
pub const REASON_NOT_SPECIFIED: &str = "reason not specified";

/// Reason recorded when a direct page fetch fails outright.
pub const REASON_FETCH_FAILED: &str = "failed to retrieve page data";

/// Reason recorded when a fetched page matches no known shape.
pub const REASON_UNKNOWN_PAGE: &str = "requires manual review (unrecognized page type)";

/// Conservative fallback reason for references whose processing blew up.
pub const REASON_MANUAL_REVIEW: &str = "requires manual review";

/// The two kinds of partner reference an article can embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// An embedded widget block (rendered booking card).
    Widget,
    /// A freestanding anchor pointing into the partner domain.
    Deeplink,
}

impl RefKind {
    /// Sink-facing name (`widget` / `deeplink`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Widget => "widget",
            Self::Deeplink => "deeplink",
        }
    }
}

/// Final activity state of a referenced listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Active,
    Inactive,
}

/// The resolution result for one [`Reference`].
///
/// `inactivity_reason` is `None` whenever `status` is Active.
/// `is_ambiguous` is orthogonal to `status`: an ambiguous verdict still
/// carries a definite status, with Inactive as the conservative default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: ActivityStatus,
    pub inactivity_reason: Option<String>,
    pub is_ambiguous: bool,
}

impl Verdict {
    /// An unambiguous Active verdict.
    #[must_use]
    pub fn active() -> Self {
        Self {
            status: ActivityStatus::Active,
            inactivity_reason: None,
            is_ambiguous: false,
        }
    }

    /// An Inactive verdict with the given reason.
    #[must_use]
    pub fn inactive(reason: impl Into<String>) -> Self {
        Self {
            status: ActivityStatus::Inactive,
            inactivity_reason: Some(reason.into()),
            is_ambiguous: false,
        }
    }

    /// An Inactive verdict whose reason may be unknown (the API reports some
    /// paused listings with a null reason field).
    #[must_use]
    pub fn inactive_opt(reason: Option<String>) -> Self {
        Self {
            status: ActivityStatus::Inactive,
            inactivity_reason: reason,
            is_ambiguous: false,
        }
    }

    /// Mark this verdict as requiring manual review.
    #[must_use]
    pub fn ambiguous(mut self) -> Self {
        self.is_ambiguous = true;
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ActivityStatus::Active
    }
}

/// One extracted mention of partner content inside an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub kind: RefKind,
    /// Numeric listing id, when the widget data or deep-link URL encodes one.
    pub listing_id: Option<u64>,
    /// Human-readable label, HTML-entity-decoded at scan time.
    pub title: String,
    /// Resolvable URL, or `None` for malformed widgets.
    pub url: Option<String>,
    /// 1-based position within the owning article, per kind, assigned in
    /// document order at scan time and never recomputed.
    pub ordinal: u32,
    /// Scan-time verdict for references that need no network resolution
    /// (message-off widgets, widgets with no usable URL).
    pub preset: Option<Verdict>,
}

/// An article as delivered by the CMS collaborator.
///
/// Fetched fresh on each run; references and verdicts are recomputed from
/// scratch, there is no incremental diffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub html_body: String,
}

/// One row for the persistence sink, upsert-keyed by
/// (`post_id`, `listing_id`, `link_type`) on the sink side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub post_id: u64,
    pub post_title: String,
    pub link_type: RefKind,
    pub ordinal: u32,
    pub listing_id: Option<u64>,
    pub title: String,
    pub url: Option<String>,
    pub status: ActivityStatus,
    pub inactivity_reason: Option<String>,
    pub is_ambiguous: bool,
}

impl LinkRecord {
    /// Combine an article, one of its references, and the verdict for that
    /// reference into a sink row.
    ///
    /// `resolved_title`, when present, is a fresher title learned from the
    /// API or the scraped page during resolution; it replaces the scan-time
    /// title, which may be stale anchor text.
    #[must_use]
    pub fn new(
        article: &Article,
        reference: &Reference,
        verdict: Verdict,
        resolved_title: Option<String>,
    ) -> Self {
        Self {
            post_id: article.id,
            post_title: article.title.clone(),
            link_type: reference.kind,
            ordinal: reference.ordinal,
            listing_id: reference.listing_id,
            title: resolved_title.unwrap_or_else(|| reference.title.clone()),
            url: reference.url.clone(),
            status: verdict.status,
            inactivity_reason: verdict.inactivity_reason,
            is_ambiguous: verdict.is_ambiguous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_verdict_has_no_reason() {
        let v = Verdict::active();
        assert_eq!(v.status, ActivityStatus::Active);
        assert!(v.inactivity_reason.is_none());
        assert!(!v.is_ambiguous);
    }

    #[test]
    fn ambiguous_preserves_status_and_reason() {
        let v = Verdict::inactive("paused").ambiguous();
        assert_eq!(v.status, ActivityStatus::Inactive);
        assert_eq!(v.inactivity_reason.as_deref(), Some("paused"));
        assert!(v.is_ambiguous);
    }

    #[test]
    fn link_record_carries_reference_fields() {
        let article = Article {
            id: 7,
            title: "Weekend in Prague".into(),
            html_body: String::new(),
        };
        let reference = Reference {
            kind: RefKind::Deeplink,
            listing_id: Some(40064),
            title: "Old Town walk".into(),
            url: Some("https://experience.tripster.ru/experience/40064-walk/".into()),
            ordinal: 2,
            preset: None,
        };
        let record = LinkRecord::new(&article, &reference, Verdict::active(), None);
        assert_eq!(record.post_id, 7);
        assert_eq!(record.link_type, RefKind::Deeplink);
        assert_eq!(record.ordinal, 2);
        assert_eq!(record.listing_id, Some(40064));
        assert_eq!(record.title, "Old Town walk");
        assert_eq!(record.status, ActivityStatus::Active);
    }

    #[test]
    fn resolved_title_replaces_stale_anchor_text() {
        let article = Article {
            id: 7,
            title: "Weekend in Prague".into(),
            html_body: String::new(),
        };
        let reference = Reference {
            kind: RefKind::Deeplink,
            listing_id: Some(40064),
            title: "old anchor text".into(),
            url: None,
            ordinal: 1,
            preset: None,
        };
        let record = LinkRecord::new(
            &article,
            &reference,
            Verdict::inactive("paused"),
            Some("Old Town walk".into()),
        );
        assert_eq!(record.title, "Old Town walk");
    }
}
