//! # Remote Source Module
//!
//! HTTP access to the nutrition source and the per-page orchestration that
//! turns its documents into a normalized [`SearchPage`]. The source is
//! reached through the [`FoodSource`] trait so sessions and tests can swap
//! in scripted documents without a network.

use async_trait::async_trait;
use log::{debug, warn};

use crate::config::{SourceConfig, PRODUCT_PATH, SEARCH_PATH};
use crate::errors::FetchError;
use crate::extract::{self, SearchHit};
use crate::food_model::{FoodRecord, RawFood, SearchPage, MISSING_TITLE};

/// Document-level access to the nutrition source.
///
/// Both operations return opaque markup text; extraction happens in
/// [`crate::extract`].
#[async_trait]
pub trait FoodSource: Send + Sync {
    async fn search_document(&self, query: &str, page: u32) -> Result<String, FetchError>;
    async fn detail_document(
        &self,
        product_id: &str,
        product_title: &str,
    ) -> Result<String, FetchError>;
}

/// reqwest-backed [`FoodSource`] with an explicit request deadline.
///
/// The deadline keeps a dead network from leaving a search session stuck in
/// its loading state: the request fails, and the failure surfaces as an
/// error with a retry affordance.
pub struct NutritionClient {
    http: reqwest::Client,
    config: SourceConfig,
}

impl NutritionClient {
    pub fn new(config: SourceConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn get_text(&self, url: String, query: &[(&str, String)]) -> Result<String, FetchError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl FoodSource for NutritionClient {
    async fn search_document(&self, query: &str, page: u32) -> Result<String, FetchError> {
        let url = format!("{}{}", self.config.base_url, SEARCH_PATH);
        self.get_text(url, &[("desc", query.to_string()), ("page", page.to_string())])
            .await
    }

    async fn detail_document(
        &self,
        product_id: &str,
        product_title: &str,
    ) -> Result<String, FetchError> {
        let url = format!(
            "{}{}/{}/{}",
            self.config.base_url,
            PRODUCT_PATH,
            product_id,
            urlencoding::encode(product_title)
        );
        self.get_text(url, &[]).await
    }
}

/// Fetch and assemble one page of normalized search results.
///
/// Per entry: the detail page is fetched and extracted; if the detail is
/// unavailable (missing page, missing breakdown, no portions) the entry is
/// rebuilt from its results-page summary; any other per-entry failure drops
/// just that entry. Only a failure of the search request itself fails the
/// whole page.
pub async fn fetch_food_page(
    source: &dyn FoodSource,
    query: &str,
    page_index: u32,
) -> Result<SearchPage, FetchError> {
    let document = source.search_document(query, page_index).await?;
    let hits = extract::extract_search_hits(&document);
    let has_next_page = extract::has_next_page(&document);

    let mut items: Vec<FoodRecord> = Vec::with_capacity(hits.len());
    for hit in hits {
        match resolve_hit(source, &hit).await {
            Some(record) if record.is_usable() => items.push(record),
            Some(_) => debug!("discarding '{}': no usable units", hit.display_title),
            None => {}
        }
    }

    Ok(SearchPage {
        query: query.to_string(),
        page_index,
        items,
        has_next_page,
    })
}

async fn resolve_hit(source: &dyn FoodSource, hit: &SearchHit) -> Option<FoodRecord> {
    let portions = match source
        .detail_document(&hit.product_id, &hit.product_title)
        .await
    {
        Ok(document) => match extract::extract_detail(&document) {
            Ok(portions) => portions,
            Err(err) if err.is_unavailable() => {
                debug!("detail unusable for '{}' ({}); using summary", hit.display_title, err);
                vec![extract::fallback_portion(hit.summary.as_deref())]
            }
            Err(err) => {
                warn!("dropping '{}': {}", hit.display_title, err);
                return None;
            }
        },
        Err(err) => {
            // A dead detail request degrades this entry, not the page.
            debug!("detail fetch failed for '{}' ({}); using summary", hit.display_title, err);
            vec![extract::fallback_portion(hit.summary.as_deref())]
        }
    };

    let title = if hit.display_title.trim().is_empty() {
        MISSING_TITLE.to_string()
    } else {
        hit.display_title.clone()
    };

    Some(
        RawFood {
            title,
            image_ref: hit.image_ref.clone(),
            portions,
        }
        .normalize(),
    )
}
