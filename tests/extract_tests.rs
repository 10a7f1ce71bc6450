//! Offline extraction tests against fixture documents, including the
//! orchestration that assembles a full normalized search page.

use async_trait::async_trait;
use std::collections::HashMap;

use macrolog::errors::{ExtractError, FetchError};
use macrolog::extract::{extract_detail, extract_search_hits, fallback_portion, has_next_page};
use macrolog::food_model::UNAVAILABLE;
use macrolog::remote::{fetch_food_page, FoodSource};

const SEARCH_DOC: &str = r#"<html><body>
<ul class="product-list">
  <li class="product-result">
    <a href="/CaloriesIn/Product/101/Oat-Milk">Oat Milk</a>
    <img src="/media/productimages/148/101.jpg">
    <p class="serving-note">Per 100ml - 45 calories</p>
  </li>
  <li class="product-result">
    <a href="/CaloriesIn/Product/202/Flapjack%20Bar">Flapjack Bar</a>
    <p class="serving-note">Per 100g Serving - 287 calories</p>
  </li>
  <li class="product-result">
    <a href="/somewhere/else">Not a product</a>
  </li>
</ul>
<div class="pager"><a href="?page=1">Next</a></div>
</body></html>"#;

const OAT_MILK_DETAIL: &str = r#"<html><body>
<h1>Oat Milk</h1>
<div id="breakdown">
  <select>
    <option>100ml</option>
    <option>250ml Glass</option>
  </select>
  <span class="portion-kcal">45</span>
  <span class="portion-kcal">113</span>
  <table>
    <tr class="portion-row"><td>100ml</td><td>1.0g</td><td>8.0g</td><td>1.5g</td></tr>
    <tr class="portion-row"><td>250ml Glass</td><td>2.5g</td><td>20.0g</td><td>3.8g</td></tr>
  </table>
</div>
</body></html>"#;

const NO_BREAKDOWN_DETAIL: &str = "<html><body><h1>Flapjack Bar</h1></body></html>";

#[test]
fn test_search_hits_drop_malformed_entries() {
    let hits = extract_search_hits(SEARCH_DOC);
    assert_eq!(hits.len(), 2);

    assert_eq!(hits[0].product_id, "101");
    assert_eq!(hits[0].product_title, "Oat-Milk");
    assert_eq!(hits[0].display_title, "Oat Milk");
    assert_eq!(hits[0].image_ref.as_deref(), Some("101.jpg"));
    assert_eq!(hits[0].summary.as_deref(), Some("Per 100ml - 45 calories"));
}

#[test]
fn test_search_hits_percent_decode_trailing_segment() {
    let hits = extract_search_hits(SEARCH_DOC);
    assert_eq!(hits[1].product_id, "202");
    assert_eq!(hits[1].product_title, "Flapjack Bar");
    assert_eq!(hits[1].image_ref, None);
}

#[test]
fn test_next_page_detection() {
    assert!(has_next_page(SEARCH_DOC));
    assert!(!has_next_page("<html><body>no more results</body></html>"));
}

#[test]
fn test_detail_extraction_positions_and_offsets() {
    let portions = extract_detail(OAT_MILK_DETAIL).unwrap();
    assert_eq!(portions.len(), 2);

    assert_eq!(portions[0].label, "100ml");
    assert_eq!(portions[0].kcal, 45.0);
    assert_eq!(portions[0].protein, 1.0);
    assert_eq!(portions[0].carbs, 8.0);
    assert_eq!(portions[0].fat, 1.5);

    assert_eq!(portions[1].label, "250ml Glass");
    assert_eq!(portions[1].kcal, 113.0);
    assert_eq!(portions[1].fat, 3.8);
}

#[test]
fn test_detail_with_unreadable_field_keeps_portion() {
    let doc = r#"<div id="breakdown">
        <option>1 Bar</option>
        <span class="portion-kcal">n/a</span>
        <tr class="portion-row"><td>1 Bar</td><td>4.1g</td><td></td><td>9.9g</td></tr>
    </div>"#;
    let portions = extract_detail(doc).unwrap();
    assert_eq!(portions.len(), 1);
    assert_eq!(portions[0].kcal, UNAVAILABLE);
    assert_eq!(portions[0].protein, 4.1);
    assert_eq!(portions[0].carbs, UNAVAILABLE);
    assert_eq!(portions[0].fat, 9.9);
}

#[test]
fn test_detail_missing_breakdown_is_unavailable() {
    assert_eq!(
        extract_detail(NO_BREAKDOWN_DETAIL),
        Err(ExtractError::MissingBreakdown)
    );
}

#[test]
fn test_detail_with_empty_breakdown_is_unavailable() {
    let doc = r#"<div id="breakdown"><select></select></div>"#;
    assert_eq!(extract_detail(doc), Err(ExtractError::NoPortions));
}

#[test]
fn test_fallback_from_results_page_summary() {
    let portion = fallback_portion(Some("Per 100g Serving - 287 calories"));
    assert_eq!(portion.label, "100g Serving");
    assert_eq!(portion.kcal, 287.0);
    assert_eq!(portion.protein, UNAVAILABLE);
}

struct FixtureSource {
    search_doc: String,
    details: HashMap<String, String>,
}

#[async_trait]
impl FoodSource for FixtureSource {
    async fn search_document(&self, _query: &str, _page: u32) -> Result<String, FetchError> {
        Ok(self.search_doc.clone())
    }

    async fn detail_document(
        &self,
        product_id: &str,
        _product_title: &str,
    ) -> Result<String, FetchError> {
        self.details
            .get(product_id)
            .cloned()
            .ok_or_else(|| FetchError::Transport("no such product".to_string()))
    }
}

#[tokio::test]
async fn test_fetch_food_page_assembles_normalized_records() {
    let source = FixtureSource {
        search_doc: SEARCH_DOC.to_string(),
        details: HashMap::from([
            ("101".to_string(), OAT_MILK_DETAIL.to_string()),
            ("202".to_string(), NO_BREAKDOWN_DETAIL.to_string()),
        ]),
    };

    let page = fetch_food_page(&source, "oat", 0).await.unwrap();
    assert_eq!(page.query, "oat");
    assert_eq!(page.page_index, 0);
    assert!(page.has_next_page);
    assert_eq!(page.items.len(), 2);

    // Detail succeeded: both scraped portions plus a synthesized "ml" basis
    // from the first millilitre-labeled portion.
    let oat_milk = &page.items[0];
    assert_eq!(oat_milk.title, "Oat Milk");
    assert_eq!(oat_milk.image_ref.as_deref(), Some("101.jpg"));
    let labels: Vec<&str> = oat_milk.units.iter().map(|u| u.label.as_str()).collect();
    assert_eq!(labels, vec!["100ml", "250ml Glass", "ml"]);
    assert_eq!(oat_milk.units[2].kcal, 0.45);

    // Detail had no breakdown: rebuilt from the summary snippet, then
    // normalized into a per-gram basis with sentinel macros preserved.
    let flapjack = &page.items[1];
    assert_eq!(flapjack.title, "Flapjack Bar");
    let labels: Vec<&str> = flapjack.units.iter().map(|u| u.label.as_str()).collect();
    assert_eq!(labels, vec!["100g Serving", "g"]);
    assert_eq!(flapjack.units[0].kcal, 287.0);
    assert_eq!(flapjack.units[1].kcal, 2.87);
    assert_eq!(flapjack.units[1].protein, UNAVAILABLE);
}

#[tokio::test]
async fn test_fetch_food_page_degrades_on_detail_fetch_failure() {
    // No detail documents at all: every entry falls back to its summary.
    let source = FixtureSource {
        search_doc: SEARCH_DOC.to_string(),
        details: HashMap::new(),
    };

    let page = fetch_food_page(&source, "oat", 0).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].units[0].label, "100ml");
    assert_eq!(page.items[0].units[0].kcal, 45.0);
}

#[tokio::test]
async fn test_fetch_food_page_without_summary_synthesizes_unavailable() {
    let doc = r#"<li class="product-result">
        <a href="/CaloriesIn/Product/7/Mystery">Mystery</a>
    </li>"#;
    let source = FixtureSource {
        search_doc: doc.to_string(),
        details: HashMap::new(),
    };

    let page = fetch_food_page(&source, "mystery", 0).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(!page.has_next_page);
    let units = &page.items[0].units;
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].label, "Serving");
    assert_eq!(units[0].kcal, UNAVAILABLE);
}
