//! # Error Types Module
//!
//! Failure taxonomy for the food-diary core, split by how far each class of
//! failure is allowed to travel:
//!
//! - [`ExtractError`]: per-item scraping problems, absorbed inside the
//!   extraction layer (fallback or item drop), never shown to the user.
//! - [`FetchError`]: whole-request failures, surfaced as an error state
//!   with a retry affordance.
//! - [`ValidationError`]: rejected user input, surfaced inline and blocking
//!   the dependent action without mutating state.

use thiserror::Error;

/// Failures while picking a single item apart from scraped markup.
///
/// `MissingBreakdown` and `NoPortions` are the expected "detail page is not
/// usable" outcomes that trigger the summary fallback. `MalformedEntry`
/// covers everything else and causes only that item to be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("detail page has no nutrition breakdown")]
    MissingBreakdown,
    #[error("nutrition breakdown lists no portion options")]
    NoPortions,
    #[error("malformed result entry: {0}")]
    MalformedEntry(String),
}

impl ExtractError {
    /// Whether the summary-text fallback applies (the detail page exists but
    /// carries no usable breakdown), as opposed to dropping the item.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ExtractError::MissingBreakdown | ExtractError::NoPortions)
    }
}

/// Whole-request failure for a search page fetch.
///
/// The message rendered by `Display` is what ends up in the error state, so
/// every variant carries a non-empty human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_status() {
            FetchError::BadResponse(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Rejected user input for quantities and manual kcal entries.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ValidationError {
    #[error("not a valid number")]
    NotANumber,
    #[error("value must be greater than zero")]
    NotPositive,
    #[error("value must not exceed {0}")]
    TooLarge(f32),
    #[error("a title is required")]
    EmptyTitle,
}
