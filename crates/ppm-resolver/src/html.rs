//! Tolerant scanning of a PEP 503 "simple" index listing page.
//!
//! This deliberately does not build a full HTML parse tree: index listings are a single flat
//! list of anchors and real-world listings occasionally carry malformed markup that a strict
//! parser would reject outright. A regex-based scan over `href="..."` attributes, paired with
//! their visible anchor text, is robust to that and is the redesign direction called out for
//! this component.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// One anchor recovered from a listing page: its resolved absolute URL, its visible text (used
/// as the displayed filename), and a `sha256=<hex>` fragment if the href carried one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// The anchor's href, resolved against the listing page's URL, with any fragment stripped.
    pub url: Url,
    /// The anchor's visible text, used as the artifact's displayed filename.
    pub filename: String,
    /// The `sha256=<hex>` value from the href's fragment, if present.
    pub sha256: String,
}

static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s+[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap()
});

static SHA256_FRAGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)sha256=([0-9a-f]{64})").unwrap());

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());

/// Scans `body` for anchor tags and resolves each href against `base`. Malformed markup around
/// an anchor is tolerated: anchors that fail to resolve are skipped rather than aborting the
/// scan. Returns an empty vector (not an error) if zero anchors are found.
pub fn parse_listing(body: &str, base: &Url) -> Vec<ListingEntry> {
    let mut entries = Vec::new();
    for caps in ANCHOR_RE.captures_iter(body) {
        let href = &caps[1];
        let inner_html = &caps[2];
        let text = TAG_RE.replace_all(inner_html, "");
        let text = html_escape::decode_html_entities(text.trim()).to_string();

        let Ok(mut resolved) = base.join(href) else {
            continue;
        };

        let sha256 = resolved
            .fragment()
            .and_then(|frag| SHA256_FRAGMENT_RE.captures(frag))
            .map(|c| c[1].to_ascii_lowercase())
            .unwrap_or_default();
        resolved.set_fragment(None);

        let filename = if text.is_empty() {
            resolved
                .path_segments()
                .and_then(|mut segs| segs.next_back())
                .unwrap_or_default()
                .to_string()
        } else {
            text
        };

        entries.push(ListingEntry {
            url: resolved,
            filename,
            sha256,
        });
    }
    entries
}
