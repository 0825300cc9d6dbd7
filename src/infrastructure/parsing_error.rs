//! Parsing error types for listing extraction
//!
//! Detailed error types for HTML parsing operations, carrying enough
//! context (page number, selectors tried) to explain a miss in the logs.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ParsingError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No usable selectors configured for field '{field}'")]
    NoSelectorsForField { field: String, errors: Vec<String> },

    #[error("No listings found on page {page}")]
    NoListingsFound {
        page: u32,
        tried_selectors: Vec<String>,
    },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed {
        url: String,
        reason: String,
        base_url: Option<String>,
    },
}

impl ParsingError {
    pub fn invalid_selector(selector: &str, reason: &str) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn no_listings_found(page: u32, tried_selectors: Vec<String>) -> Self {
        Self::NoListingsFound { page, tried_selectors }
    }

    /// Whether skipping the current page and carrying on makes sense
    pub const fn is_page_local(&self) -> bool {
        matches!(self, Self::NoListingsFound { .. } | Self::UrlResolutionFailed { .. })
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ParsingError::no_listings_found(3, vec!["article".to_string()]);
        assert_eq!(err.to_string(), "No listings found on page 3");
        assert!(err.is_page_local());

        let err = ParsingError::invalid_selector("div[", "unexpected end");
        assert!(err.to_string().contains("div["));
        assert!(!err.is_page_local());
    }
}
