//! Selector configuration for listing extraction
//!
//! Every field holds an ordered list of CSS selectors; the first one that
//! matches wins. The defaults track OLX's `data-aut-id` markup and fall
//! back to looser class/tag matches when that markup changes.

use serde::{Deserialize, Serialize};

/// CSS selectors for search results pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// Selectors for listing containers - first selector with any match wins
    pub container: Vec<String>,

    /// Links whose parent is used as the container when no container selector matches
    pub item_link_fallback: String,

    pub title: Vec<String>,

    pub price: Vec<String>,

    pub location: Vec<String>,

    pub date: Vec<String>,

    /// First match's `href` is resolved against the site base URL
    pub link: Vec<String>,

    /// First match's `src` is taken verbatim
    pub image: Vec<String>,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            container: vec![
                "div[data-aut-id='itemBox']".to_string(),
                "div[class*='EIR5N'], div[class*='_1ONrY'], div[class*='item']".to_string(),
                "li[data-aut-id='itemBox']".to_string(),
                "article".to_string(),
            ],
            item_link_fallback: "a[href*='/item/']".to_string(),
            title: vec![
                "span[data-aut-id='itemTitle']".to_string(),
                "h3".to_string(),
                "a[data-aut-id='itemTitle']".to_string(),
            ],
            price: vec![
                "span[data-aut-id='itemPrice']".to_string(),
                "span[class*='price' i]".to_string(),
            ],
            location: vec!["span[data-aut-id='item-location']".to_string()],
            date: vec!["span[data-aut-id='item-date']".to_string()],
            link: vec!["a".to_string()],
            image: vec!["img".to_string()],
        }
    }
}
