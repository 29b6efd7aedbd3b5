//! Markup scanner: extracts partner widgets and deep links from article HTML
//!
//! The scanner is pure: it never touches the network. It walks the parsed
//! document once per reference kind, assigns 1-based ordinals in document
//! order, and decodes HTML entities in every title/anchor it emits. Widgets
//! that can be judged at scan time (the "message off" placeholder card, or a
//! card with no usable URL) carry a preset verdict so the resolver skips them
//! without any outbound call.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::model::{
    REASON_WIDGET_URL_MISSING, Reference, RefKind, TITLE_NOT_FOUND, TITLE_PLACEHOLDER, Verdict,
};

/// Class marking a partner widget container.
const WIDGET_CLASS: &str = "tripster-widget";

/// Class marking a widget whose listing the partner could not render.
const MESSAGE_OFF_CLASS: &str = "tripster-message-off";

/// Anchor classes that belong to a widget's own rendered card. Anchors
/// carrying any of these are part of the widget, not independent deep links.
const WIDGET_CARD_CLASSES: [&str; 8] = [
    "expcard__img-link",
    "expcard__title",
    "expcard__title__link",
    "expcard__text__link",
    "expcard__left_user",
    "rating",
    "expcard__review",
    "grey-button",
];

// Hardcoded selectors should never fail to parse - if they do, it's a
// compile-time bug.

static WIDGET_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.tripster-widget").expect("BUG: hardcoded widget selector is invalid")
});

static CARD_TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("figcaption.expcard-info a.expcard__title__link")
        .expect("BUG: hardcoded card title selector is invalid")
});

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("BUG: hardcoded anchor selector is invalid"));

/// Listing ids are encoded in experience-page URLs as `/experience/<id>-slug`.
static LISTING_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/experience/(\d+)").expect("BUG: hardcoded listing id regex is invalid")
});

/// Everything one `scan` call extracted from a single article.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutcome {
    pub widgets: Vec<Reference>,
    pub deeplinks: Vec<Reference>,
}

impl ScanOutcome {
    /// Widgets first, then deep links, each in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.widgets.iter().chain(self.deeplinks.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.widgets.len() + self.deeplinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty() && self.deeplinks.is_empty()
    }
}

/// Extract all partner references from raw article HTML.
///
/// Widgets and deep links are numbered independently, starting at 1, in
/// extraction order. Deep links that are structurally part of a widget card
/// are excluded, and duplicate (href, decoded anchor) pairs are dropped
/// silently.
#[must_use]
pub fn scan(html: &str, partner_domain: &str) -> ScanOutcome {
    let document = Html::parse_document(html);
    ScanOutcome {
        widgets: scan_widgets(&document),
        deeplinks: scan_deeplinks(&document, partner_domain),
    }
}

/// Decode HTML entities in an extracted label.
///
/// Decoding is total: unknown entities pass through unchanged, so a
/// malformed label degrades to its raw form instead of aborting the scan.
fn decode_entities(raw: &str) -> String {
    html_escape::decode_html_entities(raw.trim()).into_owned()
}

/// Parse a numeric listing id out of an experience-page URL.
#[must_use]
pub fn listing_id_from_url(url: &str) -> Option<u64> {
    LISTING_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn scan_widgets(document: &Html) -> Vec<Reference> {
    let mut widgets = Vec::new();

    for (index, widget) in document.select(&WIDGET_SELECTOR).enumerate() {
        let ordinal = (index + 1) as u32;

        if has_class(widget, MESSAGE_OFF_CLASS) {
            // The partner already renders this card as "nothing to show";
            // no id, no URL, judged inactive at scan time.
            widgets.push(Reference {
                kind: RefKind::Widget,
                listing_id: None,
                title: TITLE_NOT_FOUND.to_string(),
                url: None,
                ordinal,
                preset: Some(Verdict::inactive_opt(None)),
            });
            continue;
        }

        let listing_id = widget
            .value()
            .attr("data-exp-id")
            .and_then(|raw| raw.trim().parse().ok());
        let url = widget
            .value()
            .attr("data-exp-url")
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from);
        let title = widget
            .select(&CARD_TITLE_SELECTOR)
            .next()
            .map(|a| decode_entities(&a.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string());

        let preset = if listing_id.is_none() || url.is_none() {
            Some(Verdict::inactive(REASON_WIDGET_URL_MISSING).ambiguous())
        } else {
            None
        };

        widgets.push(Reference {
            kind: RefKind::Widget,
            listing_id,
            title,
            url,
            ordinal,
            preset,
        });
    }

    widgets
}

/// True when an anchor belongs to a widget's own rendered card, either by
/// carrying one of the fixed card classes or by sitting inside a widget
/// container in the DOM.
fn is_widget_card_anchor(anchor: ElementRef<'_>) -> bool {
    if anchor
        .value()
        .classes()
        .any(|c| WIDGET_CARD_CLASSES.contains(&c))
    {
        return true;
    }
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| has_class(ancestor, WIDGET_CLASS))
}

fn scan_deeplinks(document: &Html, partner_domain: &str) -> Vec<Reference> {
    let mut deeplinks = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.contains(partner_domain) || is_widget_card_anchor(anchor) {
            continue;
        }

        let text = decode_entities(&anchor.text().collect::<String>());
        if !seen.insert((href.to_string(), text.clone())) {
            continue;
        }

        deeplinks.push(Reference {
            kind: RefKind::Deeplink,
            listing_id: listing_id_from_url(href),
            title: text,
            url: Some(href.to_string()),
            ordinal: deeplinks.len() as u32 + 1,
            preset: None,
        });
    }

    deeplinks
}
