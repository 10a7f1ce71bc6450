//! # Scrape Extraction Module
//!
//! Turns the nutrition source's markup into raw food records. The source
//! publishes no schema, so extraction is defensive throughout: a detail page
//! without a usable breakdown falls back to the summary text visible on the
//! results page, a single unreadable numeric field becomes the sentinel
//! rather than an error, and a malformed entry is dropped without failing
//! the page.
//!
//! ## Markup contract
//!
//! Search results page:
//! - each result sits in an `<li class="product-result">` block containing
//!   an anchor whose `href` path runs through `/CaloriesIn/Product/`,
//!   optionally an `<img>` and a `<p class="serving-note">` snippet like
//!   `Per 100g Serving - 287 calories`;
//! - a further page exists iff the literal text `Next` appears anywhere in
//!   the document's own text content.
//!
//! Product detail page:
//! - the portion breakdown sits in a `<div id="breakdown">` container;
//! - portion labels are the `<option>` elements, 1-indexed by position;
//! - the i-th `<span class="portion-kcal">` holds that portion's kcal;
//! - the i-th `<tr class="portion-row">` holds protein/carbs/fat in the
//!   cells at column offsets 1..3 (offset 0 repeats the label), each value
//!   written like `12.5g` or `1,234g`.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

use crate::errors::ExtractError;
use crate::food_model::{RawPortion, UNAVAILABLE};
use crate::html_scan;

pub const PRODUCT_LINK_MARKER: &str = "/CaloriesIn/Product/";
pub const RESULT_ENTRY_MARKER: &str = r#"class="product-result""#;
pub const SERVING_NOTE_MARKER: &str = r#"class="serving-note""#;
pub const BREAKDOWN_MARKER: &str = r#"id="breakdown""#;
pub const PORTION_KCAL_MARKER: &str = r#"class="portion-kcal""#;
pub const PORTION_ROW_MARKER: &str = r#"class="portion-row""#;
pub const NEXT_PAGE_TEXT: &str = "Next";

lazy_static! {
    // First run of digits immediately followed by the literal " calories".
    // Case-sensitive on purpose: that is how the source writes it.
    static ref SUMMARY_KCAL_RE: Regex =
        Regex::new(r"(\d+) calories").expect("summary kcal pattern should be valid");
}

/// One result entry from the search page, identified and ready for a detail
/// lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Product id segment of the detail link path.
    pub product_id: String,
    /// Percent-decoded trailing path segment; the detail request echoes it.
    pub product_title: String,
    /// Human-readable name shown in the result list.
    pub display_title: String,
    /// Trailing segment of the entry's image source, if any.
    pub image_ref: Option<String>,
    /// Visible summary snippet used by the fallback path.
    pub summary: Option<String>,
}

/// Locate and parse the result entries of a search page.
///
/// A malformed entry is logged and dropped; the rest of the page is still
/// returned.
pub fn extract_search_hits(document: &str) -> Vec<SearchHit> {
    let entries = html_scan::marked_blocks(document, "li", RESULT_ENTRY_MARKER);
    let mut hits = Vec::with_capacity(entries.len());

    for entry in entries {
        match parse_hit(entry) {
            Ok(hit) => hits.push(hit),
            Err(err) => warn!("dropping unreadable result entry: {}", err),
        }
    }
    hits
}

/// Whether the results document advertises a further page.
pub fn has_next_page(document: &str) -> bool {
    html_scan::text_content(document).contains(NEXT_PAGE_TEXT)
}

fn parse_hit(entry: &str) -> Result<SearchHit, ExtractError> {
    let (href, anchor_text) = html_scan::first_anchor(entry)
        .ok_or_else(|| ExtractError::MalformedEntry("entry has no link".into()))?;

    if !href.contains(PRODUCT_LINK_MARKER) {
        return Err(ExtractError::MalformedEntry(format!(
            "link does not point at a product: {}",
            href
        )));
    }

    let segments: Vec<&str> = href.split('/').filter(|s| !s.is_empty()).collect();
    let product_pos = segments
        .iter()
        .position(|s| *s == "Product")
        .ok_or_else(|| ExtractError::MalformedEntry(format!("unexpected link shape: {}", href)))?;
    let product_id = segments
        .get(product_pos + 1)
        .ok_or_else(|| ExtractError::MalformedEntry(format!("link has no product id: {}", href)))?
        .to_string();
    let slug = *segments
        .last()
        .ok_or_else(|| ExtractError::MalformedEntry(format!("empty link path: {}", href)))?;
    let product_title = urlencoding::decode(slug)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| slug.to_string());

    let display_title = if anchor_text.is_empty() {
        product_title.clone()
    } else {
        anchor_text
    };

    let image_ref = html_scan::first_img_src(entry)
        .and_then(|src| src.rsplit('/').next().map(str::to_string))
        .filter(|name| !name.is_empty());

    let summary = html_scan::marked_block(entry, "p", SERVING_NOTE_MARKER)
        .map(html_scan::text_content)
        .filter(|text| !text.is_empty());

    Ok(SearchHit {
        product_id,
        product_title,
        display_title,
        image_ref,
        summary,
    })
}

/// Extract the per-portion nutrition breakdown from a product detail page.
///
/// A missing breakdown container, or one listing no portion options, is the
/// expected "detail unavailable" outcome and asks the caller for the
/// summary fallback. Individual fields that fail to parse become the
/// sentinel without failing the portion.
pub fn extract_detail(document: &str) -> Result<Vec<RawPortion>, ExtractError> {
    let breakdown = html_scan::marked_block(document, "div", BREAKDOWN_MARKER)
        .ok_or(ExtractError::MissingBreakdown)?;

    let labels: Vec<String> = html_scan::tag_blocks(breakdown, "option")
        .iter()
        .map(|block| html_scan::text_content(block))
        .collect();
    if labels.is_empty() {
        return Err(ExtractError::NoPortions);
    }

    let kcal_spans = html_scan::marked_blocks(breakdown, "span", PORTION_KCAL_MARKER);
    let rows = html_scan::marked_blocks(breakdown, "tr", PORTION_ROW_MARKER);

    let portions = labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            let kcal = kcal_spans
                .get(i)
                .map(|span| parse_field(span))
                .unwrap_or(UNAVAILABLE);

            let cells = rows.get(i).map(|row| html_scan::tag_blocks(row, "td"));
            let macro_at = |offset: usize| {
                cells
                    .as_ref()
                    .and_then(|cells| cells.get(offset))
                    .map(|cell| parse_field(cell))
                    .unwrap_or(UNAVAILABLE)
            };

            RawPortion {
                label,
                kcal,
                protein: macro_at(1),
                carbs: macro_at(2),
                fat: macro_at(3),
            }
        })
        .collect();

    Ok(portions)
}

/// Build the single fallback portion for an entry whose detail page was
/// unusable, from the summary snippet on the results page.
///
/// `Per 100g Serving - 287 calories` yields the label `100g Serving` with
/// kcal 287 and sentinel macros. With no snippet at all, the portion is
/// fully unavailable.
pub fn fallback_portion(summary: Option<&str>) -> RawPortion {
    let summary = match summary {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            debug!("no summary snippet; synthesizing fully-unavailable portion");
            return RawPortion::unavailable("Serving");
        }
    };

    let kcal = SUMMARY_KCAL_RE
        .captures(summary)
        .and_then(|caps| caps[1].parse::<f32>().ok())
        .unwrap_or(UNAVAILABLE);

    let descriptive = summary.split(" - ").next().unwrap_or(summary);
    let label = descriptive
        .trim()
        .strip_prefix("Per")
        .map(str::trim)
        .unwrap_or_else(|| descriptive.trim());
    let label = if label.is_empty() { "Serving" } else { label };

    RawPortion {
        label: label.to_string(),
        kcal,
        protein: UNAVAILABLE,
        carbs: UNAVAILABLE,
        fat: UNAVAILABLE,
    }
}

// Numeric cell parser: strips one trailing unit-suffix character and any
// thousands-separating commas. Unreadable fields become the sentinel.
fn parse_field(fragment: &str) -> f32 {
    let text = html_scan::text_content(fragment);
    let trimmed = text.trim();
    let without_suffix = match trimmed.chars().last() {
        Some(c) if c.is_alphabetic() => &trimmed[..trimmed.len() - c.len_utf8()],
        _ => trimmed,
    };
    without_suffix
        .replace(',', "")
        .trim()
        .parse::<f32>()
        .unwrap_or(UNAVAILABLE)
}
