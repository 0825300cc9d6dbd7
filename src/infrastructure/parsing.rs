//! HTML parsing infrastructure
//!
//! Trait-based parsing of search results pages with ordered fallback
//! selectors and typed errors.

pub mod config;
pub mod context;
pub mod error;
pub mod listing_parser;

pub use config::ListingSelectors;
pub use context::ParseContext;
pub use error::{ParsingError, ParsingResult};
pub use listing_parser::{ContainerStrategy, ListingParser, PageExtraction};

use scraper::Html;

/// Parser that needs per-page context (page number, base URL)
pub trait ContextualParser {
    type Output;
    type Context;

    /// Parse HTML with contextual information
    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output>;
}
