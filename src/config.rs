//! # Source Configuration Module
//!
//! This module defines the fixed configuration for the scraped nutrition
//! source (endpoints, paging, request deadline) and the bounds applied to
//! user-entered values before they reach the rest of the pipeline.

// Constants for the remote nutrition source
pub const BASE_URL: &str = "https://www.nutracheck.co.uk/";
pub const IMAGE_BASE_URL: &str = "https://d2lhwe7okuon6r.cloudfront.net/media/productimages/148/";
pub const SEARCH_PATH: &str = "CaloriesIn/Product/Search";
pub const PRODUCT_PATH: &str = "CaloriesIn/Product";
pub const PAGE_SIZE: u32 = 5;
pub const FIRST_PAGE: u32 = 0;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

// Bounds for user-entered values
pub const MAX_QUANTITY: f32 = 10_000.0;
pub const MAX_MANUAL_KCAL: f32 = 100_000.0;

/// Configuration for the remote nutrition source
///
/// The defaults mirror the production endpoints; tests point `base_url`
/// at a local fixture server or bypass the HTTP layer entirely.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base endpoint for search and product-detail requests
    pub base_url: String,
    /// Base path for product images (records hold only the trailing segment)
    pub image_base_url: String,
    /// Number of result items per search page
    pub page_size: u32,
    /// Deadline for a single document request in seconds
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            image_base_url: IMAGE_BASE_URL.to_string(),
            page_size: PAGE_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl SourceConfig {
    /// Full URL for an image reference stored on a food record
    pub fn image_url(&self, image_ref: &str) -> String {
        format!("{}{}", self.image_base_url, image_ref)
    }
}
