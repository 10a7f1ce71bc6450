//! # HTML Scanning Module
//!
//! Tolerant helpers for reading scraped markup. The external source offers
//! no schema guarantees, so everything here favors resilience over strict
//! parsing: case-insensitive tag detection, local scanning within known
//! blocks, and tolerance to attribute order, whitespace, and harmless
//! markup noise. All helpers are pure string-in/string-out and are
//! exercised offline against fixture documents.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ANCHOR_RE: Regex =
        Regex::new(r#"(?is)<a\b[^>]*\bhref\s*=\s*"([^"]*)"[^>]*>(.*?)</a>"#)
            .expect("anchor pattern should be valid");
    static ref IMG_SRC_RE: Regex =
        Regex::new(r#"(?is)<img\b[^>]*\bsrc\s*=\s*"([^"]*)""#)
            .expect("img pattern should be valid");
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").expect("tag pattern should be valid");
    static ref WS_RE: Regex = Regex::new(r"\s+").expect("whitespace pattern should be valid");
}

/// Content of the first `<tag ...>` whose opening tag contains `marker`
/// (e.g. `id="breakdown"` or `class="product-result"`), with nested
/// same-name tags balanced by depth counting.
///
/// Matching is ASCII case-insensitive; `marker` should be lowercase.
pub fn marked_block<'a>(doc: &'a str, tag: &str, marker: &str) -> Option<&'a str> {
    marked_blocks_from(doc, tag, marker, 0).next()
}

/// All `<tag ...>` blocks whose opening tag contains `marker`, in document
/// order.
pub fn marked_blocks<'a>(doc: &'a str, tag: &str, marker: &str) -> Vec<&'a str> {
    marked_blocks_from(doc, tag, marker, 0).collect()
}

fn marked_blocks_from<'a>(
    doc: &'a str,
    tag: &str,
    marker: &str,
    start: usize,
) -> impl Iterator<Item = &'a str> + 'a {
    let lower = doc.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let close = format!("</{}", tag);
    let marker = marker.to_ascii_lowercase();
    let mut pos = start;

    std::iter::from_fn(move || {
        loop {
            let rel = lower[pos..].find(&open)?;
            let open_start = pos + rel;
            let open_end = match lower[open_start..].find('>') {
                Some(i) => open_start + i + 1,
                None => return None,
            };
            pos = open_end;

            if !lower[open_start..open_end].contains(&marker) {
                continue;
            }

            // Depth-counted scan for the matching close tag.
            let mut depth = 1usize;
            let mut cursor = open_end;
            while depth > 0 {
                let next_open = lower[cursor..].find(&open).map(|i| cursor + i);
                let next_close = lower[cursor..].find(&close).map(|i| cursor + i);
                match (next_open, next_close) {
                    (Some(o), Some(c)) if o < c => {
                        depth += 1;
                        cursor = o + open.len();
                    }
                    (_, Some(c)) => {
                        depth -= 1;
                        if depth == 0 {
                            pos = c + close.len();
                            return Some(&doc[open_end..c]);
                        }
                        cursor = c + close.len();
                    }
                    // Unclosed block: tolerate by taking the remainder.
                    _ => {
                        pos = doc.len();
                        return Some(&doc[open_end..]);
                    }
                }
            }
            unreachable!()
        }
    })
}

/// Inner content of each `<tag>` element in `fragment`, in order.
///
/// For non-nesting tags only (`option`, `tr`, `td`, `span`): the scan takes
/// the text up to the nearest matching close tag without depth counting.
pub fn tag_blocks<'a>(fragment: &'a str, tag: &str) -> Vec<&'a str> {
    let lower = fragment.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let close = format!("</{}", tag);
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(rel) = lower[pos..].find(&open) {
        let open_start = pos + rel;
        let open_end = match lower[open_start..].find('>') {
            Some(i) => open_start + i + 1,
            None => break,
        };
        match lower[open_end..].find(&close) {
            Some(i) => {
                blocks.push(&fragment[open_end..open_end + i]);
                pos = open_end + i + close.len();
            }
            None => break,
        }
    }
    blocks
}

/// `(href, inner text)` of the first anchor in `fragment`.
pub fn first_anchor(fragment: &str) -> Option<(String, String)> {
    ANCHOR_RE
        .captures(fragment)
        .map(|caps| (caps[1].to_string(), text_content(&caps[2])))
}

/// `src` attribute of the first image in `fragment`.
pub fn first_img_src(fragment: &str) -> Option<String> {
    IMG_SRC_RE.captures(fragment).map(|caps| caps[1].to_string())
}

/// Visible text of a fragment: tags stripped, common entities decoded,
/// whitespace collapsed.
pub fn text_content(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&stripped);
    WS_RE.replace_all(decoded.trim(), " ").to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
