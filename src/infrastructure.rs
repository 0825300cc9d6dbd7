//! Infrastructure layer for fetching, parsing and exporting listings
//!
//! This module provides the HTTP client with retry and fallback, HTML
//! parsing, the paginated crawler, result export and diagnostics.

pub mod config; // Configuration constants and helpers
pub mod crawling; // Paginated listing crawler
pub mod diagnostics; // Blocking detection and connectivity probe
pub mod export; // JSON / CSV output
pub mod http_client;
pub mod logging; // Logging infrastructure
pub mod parsing; // Listing extraction with fallback selectors
pub mod parsing_error;
pub mod retry_policy;

// Re-export commonly used items
pub use config::{AppConfig, ConfigLoadStatus, ConfigManager, OutputFormat};
pub use crawling::{CrawlOutcome, CrawlerConfig, ListingCrawler, PageFetcher, PageReport, PageStatus};
pub use export::{ExportError, render_summary, save_to_csv, save_to_json, write_outputs};
pub use http_client::{FetchError, FetchedPage, HttpClient, HttpClientConfig};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use parsing::{ListingParser, ListingSelectors, ParsingError, ParsingResult};
pub use retry_policy::{AttemptOutcome, FetchMethod, FetchStrategy, RetryPolicy};
