//! Classifieds Crawler - search results scraper for classifieds sites
//!
//! Fetches paginated OLX search results with retries and fallback request
//! methods, extracts listings with ordered fallback selectors, and exports
//! them as JSON and CSV.

// Module declarations
pub mod cli;
pub mod domain;
pub mod infrastructure;
