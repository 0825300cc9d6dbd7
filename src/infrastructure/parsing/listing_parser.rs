//! Listing parser for search results pages
//!
//! Locates listing containers with ordered fallback selectors, then pulls
//! the six listing fields out of each container, again trying selectors
//! in order. Missing fields become `N/A`; listings without a title are
//! dropped.

use std::fmt;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::config::ListingSelectors;
use super::{ContextualParser, ParseContext, ParsingError, ParsingResult};
use crate::domain::listing::{Listing, NOT_AVAILABLE};

/// A compiled selector together with its source text for logging
#[derive(Debug, Clone)]
struct NamedSelector {
    source: String,
    selector: Selector,
}

/// Which rule located the listing containers on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStrategy {
    Selector(String),
    /// Parents of item links, used when no container selector matched
    LinkFallback(String),
}

impl fmt::Display for ContainerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selector(source) => write!(f, "{source}"),
            Self::LinkFallback(source) => write!(f, "parents of {source}"),
        }
    }
}

/// Result of parsing one page
#[derive(Debug, Clone)]
pub struct PageExtraction {
    pub strategy: ContainerStrategy,
    /// Containers matched, including ones later dropped for lacking a title
    pub containers_found: usize,
    pub listings: Vec<Listing>,
}

/// Parser for extracting listings from search results pages
pub struct ListingParser {
    container_selectors: Vec<NamedSelector>,
    item_link_selector: NamedSelector,
    anchor_selector: Selector,
    title_selectors: Vec<NamedSelector>,
    price_selectors: Vec<NamedSelector>,
    location_selectors: Vec<NamedSelector>,
    date_selectors: Vec<NamedSelector>,
    link_selectors: Vec<NamedSelector>,
    image_selectors: Vec<NamedSelector>,
    title_selector: Selector,
}

impl ListingParser {
    /// Create a parser with the default OLX selectors
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ListingSelectors::default())
    }

    /// Create parser with custom selector configuration
    pub fn with_config(selectors: &ListingSelectors) -> ParsingResult<Self> {
        Ok(Self {
            container_selectors: Self::compile_selectors("container", &selectors.container)?,
            item_link_selector: Self::compile_one(&selectors.item_link_fallback)?,
            anchor_selector: Self::static_selector("a[href]")?,
            title_selectors: Self::compile_selectors("title", &selectors.title)?,
            price_selectors: Self::compile_selectors("price", &selectors.price)?,
            location_selectors: Self::compile_selectors("location", &selectors.location)?,
            date_selectors: Self::compile_selectors("date", &selectors.date)?,
            link_selectors: Self::compile_selectors("link", &selectors.link)?,
            image_selectors: Self::compile_selectors("image", &selectors.image)?,
            title_selector: Self::static_selector("title")?,
        })
    }

    fn compile_one(source: &str) -> ParsingResult<NamedSelector> {
        Selector::parse(source)
            .map(|selector| NamedSelector { source: source.to_string(), selector })
            .map_err(|e| ParsingError::invalid_selector(source, &e.to_string()))
    }

    fn static_selector(source: &str) -> ParsingResult<Selector> {
        Self::compile_one(source).map(|named| named.selector)
    }

    /// Compile a field's selector list, skipping (and logging) invalid entries
    fn compile_selectors(field: &str, sources: &[String]) -> ParsingResult<Vec<NamedSelector>> {
        let mut selectors = Vec::new();
        let mut errors = Vec::new();

        for source in sources {
            match Self::compile_one(source) {
                Ok(selector) => selectors.push(selector),
                Err(e) => {
                    warn!("Failed to compile {} selector '{}': {}", field, source, e);
                    errors.push(e.to_string());
                }
            }
        }

        if selectors.is_empty() {
            return Err(ParsingError::NoSelectorsForField {
                field: field.to_string(),
                errors,
            });
        }

        Ok(selectors)
    }

    /// Page `<title>` text, if any
    pub fn page_title(&self, html: &Html) -> Option<String> {
        html.select(&self.title_selector)
            .next()
            .map(|title| element_text(&title))
            .filter(|text| !text.is_empty())
    }

    /// Number of anchors with an `href` on the page
    pub fn count_links(&self, html: &Html) -> usize {
        html.select(&self.anchor_selector).count()
    }

    /// Locate listing containers with the ordered fallbacks
    fn find_containers<'a>(&self, html: &'a Html) -> Option<(ContainerStrategy, Vec<ElementRef<'a>>)> {
        for named in &self.container_selectors {
            let elements: Vec<ElementRef> = html.select(&named.selector).collect();
            if !elements.is_empty() {
                debug!("Found {} containers using: {}", elements.len(), named.source);
                return Some((ContainerStrategy::Selector(named.source.clone()), elements));
            }
        }

        debug!("Trying fallback: parents of links matching {}", self.item_link_selector.source);
        let parents: Vec<ElementRef> = html
            .select(&self.item_link_selector.selector)
            .filter_map(|link| link.parent().and_then(ElementRef::wrap))
            .collect();

        if parents.is_empty() {
            None
        } else {
            Some((ContainerStrategy::LinkFallback(self.item_link_selector.source.clone()), parents))
        }
    }

    /// Extract one listing from a container element
    pub fn extract_listing(&self, element: &ElementRef, base_url: &str) -> Listing {
        Listing {
            title: first_text(element, &self.title_selectors),
            price: first_text(element, &self.price_selectors),
            location: first_text(element, &self.location_selectors),
            date: first_text(element, &self.date_selectors),
            url: first_attr(element, &self.link_selectors, "href")
                .filter(|href| !href.is_empty())
                .map_or_else(|| NOT_AVAILABLE.to_string(), |href| resolve_url(href, base_url)),
            image_url: first_attr(element, &self.image_selectors, "src")
                .map_or_else(|| NOT_AVAILABLE.to_string(), str::to_string),
        }
    }

    fn tried_selectors(&self) -> Vec<String> {
        self.container_selectors
            .iter()
            .map(|named| named.source.clone())
            .chain(std::iter::once(format!("parents of {}", self.item_link_selector.source)))
            .collect()
    }
}

impl ContextualParser for ListingParser {
    type Output = PageExtraction;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output> {
        debug!("Parsing listings for page {}", context.page);

        let Some((strategy, containers)) = self.find_containers(html) else {
            return Err(ParsingError::no_listings_found(context.page, self.tried_selectors()));
        };

        let listings: Vec<Listing> = containers
            .iter()
            .map(|element| self.extract_listing(element, &context.base_url))
            .filter(Listing::has_title)
            .collect();

        debug!(
            "Kept {} of {} containers on page {}",
            listings.len(),
            containers.len(),
            context.page
        );

        Ok(PageExtraction {
            strategy,
            containers_found: containers.len(),
            listings,
        })
    }
}

/// Concatenated text nodes, each trimmed, empty ones skipped
pub fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Text of the first element matched by the first matching selector, even if empty
fn first_text(element: &ElementRef, selectors: &[NamedSelector]) -> String {
    selectors
        .iter()
        .find_map(|named| element.select(&named.selector).next())
        .map_or_else(|| NOT_AVAILABLE.to_string(), |found| element_text(&found))
}

/// Attribute of the first element matched by the first matching selector
fn first_attr<'a>(element: &ElementRef<'a>, selectors: &[NamedSelector], attr: &str) -> Option<&'a str> {
    selectors
        .iter()
        .find_map(|named| element.select(&named.selector).next())
        .and_then(|found| found.value().attr(attr))
}

/// Resolve a listing href against the site base URL; `N/A` when impossible
pub fn resolve_url(href: &str, base_url: &str) -> String {
    let resolved = Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map_err(|e| ParsingError::UrlResolutionFailed {
            url: href.to_string(),
            reason: e.to_string(),
            base_url: Some(base_url.to_string()),
        });

    match resolved {
        Ok(url) => url.to_string(),
        Err(e) => {
            debug!("{}", e);
            NOT_AVAILABLE.to_string()
        }
    }
}
