//! Parsing context for listing extraction

/// Context information for parsing one search results page
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// 1-based page number being parsed
    pub page: u32,

    /// Base URL for resolving relative links
    pub base_url: String,
}

impl ParseContext {
    pub fn new(page: u32, base_url: impl Into<String>) -> Self {
        Self {
            page,
            base_url: base_url.into(),
        }
    }
}
