//! Listing crawler
//!
//! Walks the paginated search results, fetching each page through a
//! [`PageFetcher`], dumping it for inspection and parsing listings out of it.
//! Pages that fail are logged and skipped so one bad page never aborts a run.

use std::path::PathBuf;

use async_trait::async_trait;
use scraper::Html;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::domain::listing::Listing;
use crate::infrastructure::config::{AppConfig, utils};
use crate::infrastructure::diagnostics::{BLOCKING_INDICATORS, detect_blocking, save_debug_page};
use crate::infrastructure::http_client::{FetchError, FetchedPage, HttpClient};
use crate::infrastructure::parsing::{ContextualParser, ListingParser, ParseContext, ParsingError};
use crate::infrastructure::retry_policy::DelayRange;

/// Source of page bodies for the crawler
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        Self::fetch_page(self, url).await
    }
}

/// Settings for one crawl run
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub search_url: String,
    /// Base for resolving relative listing links
    pub base_url: String,
    pub pages: u32,
    /// Pause before every page after the first
    pub page_delay: DelayRange,
    pub save_debug_pages: bool,
    pub debug_dir: PathBuf,
}

impl CrawlerConfig {
    pub fn from_app_config(config: &AppConfig, pages: u32) -> Self {
        Self {
            search_url: config.site.search_url(),
            base_url: config.site.base_url.clone(),
            pages: config.crawling.clamp_pages(pages),
            page_delay: config
                .crawling
                .strategy
                .page_delay()
                .scaled(config.crawling.effective_delay_scale()),
            save_debug_pages: config.crawling.save_debug_pages,
            debug_dir: config.output.debug_dir().to_path_buf(),
        }
    }
}

/// What happened to a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStatus {
    Parsed {
        /// Selector (or link fallback) that located the containers
        strategy: String,
        listings: usize,
    },
    /// Every fetch method and attempt failed
    FetchFailed(String),
    /// Page fetched but no listing containers found
    NoListings {
        title: Option<String>,
        total_links: usize,
    },
}

#[derive(Debug, Clone)]
pub struct PageReport {
    pub page: u32,
    pub url: String,
    pub status: PageStatus,
    /// Blocking indicators found in the body
    pub blocking: Vec<&'static str>,
    pub debug_file: Option<PathBuf>,
}

/// Everything a crawl run produced
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    pub listings: Vec<Listing>,
    pub pages: Vec<PageReport>,
}

impl CrawlOutcome {
    pub fn pages_with_listings(&self) -> usize {
        self.pages
            .iter()
            .filter(|report| matches!(report.status, PageStatus::Parsed { listings, .. } if listings > 0))
            .count()
    }

    pub fn blocking_detected(&self) -> bool {
        self.pages.iter().any(|report| !report.blocking.is_empty())
    }
}

/// Paginated search results crawler
pub struct ListingCrawler<F> {
    fetcher: F,
    parser: ListingParser,
    config: CrawlerConfig,
}

impl<F: PageFetcher> ListingCrawler<F> {
    pub const fn new(fetcher: F, parser: ListingParser, config: CrawlerConfig) -> Self {
        Self { fetcher, parser, config }
    }

    pub const fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Crawl pages `1..=pages` in order, collecting every listing found
    pub async fn crawl(&self) -> CrawlOutcome {
        info!("🚀 Starting scrape of {} page(s)", self.config.pages);
        info!("🔗 Search URL: {}", self.config.search_url);

        let mut outcome = CrawlOutcome::default();

        for page in 1..=self.config.pages {
            if page > 1 {
                let delay = self.config.page_delay.sample();
                info!("⏳ Waiting {:.1} seconds before next page...", delay.as_secs_f64());
                sleep(delay).await;
            }

            let (report, listings) = self.crawl_page(page).await;
            outcome.listings.extend(listings);
            outcome.pages.push(report);
        }

        info!(
            "🏁 Crawl finished: {} listings from {} of {} pages",
            outcome.listings.len(),
            outcome.pages_with_listings(),
            self.config.pages
        );
        outcome
    }

    async fn crawl_page(&self, page: u32) -> (PageReport, Vec<Listing>) {
        let url = utils::page_url(&self.config.search_url, page);
        info!("📄 Scraping page {}...", page);

        let fetched = match self.fetcher.fetch_page(&url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!("❌ Failed to fetch page {} with all methods: {}", page, e);
                let report = PageReport {
                    page,
                    url,
                    status: PageStatus::FetchFailed(e.to_string()),
                    blocking: Vec::new(),
                    debug_file: None,
                };
                return (report, Vec::new());
            }
        };

        let debug_file = if self.config.save_debug_pages {
            match save_debug_page(&self.config.debug_dir, page, &fetched.body).await {
                Ok(path) => {
                    info!("💾 Saved page {} as '{}' for inspection", page, path.display());
                    Some(path)
                }
                Err(e) => {
                    warn!("Could not save debug page {}: {:#}", page, e);
                    None
                }
            }
        } else {
            None
        };

        let blocking = detect_blocking(&fetched.body, BLOCKING_INDICATORS);
        if !blocking.is_empty() {
            warn!("⚠️  Detected possible blocking in content: {:?}", blocking);
        }

        let (status, listings) = self.parse_page(page, &fetched.body);
        let report = PageReport {
            page,
            url,
            status,
            blocking,
            debug_file,
        };
        (report, listings)
    }

    /// Parse synchronously so the non-Send `Html` never crosses an await
    fn parse_page(&self, page: u32, body: &str) -> (PageStatus, Vec<Listing>) {
        let html = Html::parse_document(body);
        let context = ParseContext::new(page, self.config.base_url.clone());

        match self.parser.parse_with_context(&html, &context) {
            Ok(extraction) => {
                info!(
                    "✅ Found {} listings using: {}",
                    extraction.containers_found, extraction.strategy
                );
                info!("✅ Successfully parsed {} listings from page {}", extraction.listings.len(), page);
                let status = PageStatus::Parsed {
                    strategy: extraction.strategy.to_string(),
                    listings: extraction.listings.len(),
                };
                (status, extraction.listings)
            }
            Err(ParsingError::NoListingsFound { .. }) => {
                let title = self.parser.page_title(&html);
                let total_links = self.parser.count_links(&html);

                warn!("❌ No listings found on page {}", page);
                info!("📊 Page analysis:");
                info!("   - Total links: {}", total_links);
                info!("   - Page title: {}", title.as_deref().unwrap_or("No title"));

                (PageStatus::NoListings { title, total_links }, Vec::new())
            }
            Err(e) => {
                error!("Failed to parse page {}: {}", page, e);
                (
                    PageStatus::NoListings {
                        title: None,
                        total_links: 0,
                    },
                    Vec::new(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::infrastructure::retry_policy::{AttemptOutcome, FetchMethod};

    /// Serves canned bodies keyed by URL and records request order
    struct StubFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages.iter().map(|(u, b)| ((*u).to_string(), (*b).to_string())).collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(body) => Ok(FetchedPage {
                    requested_url: url.to_string(),
                    final_url: url.to_string(),
                    status: 200,
                    body: body.clone(),
                    method: FetchMethod::Standard,
                    attempt: 0,
                    elapsed: Duration::ZERO,
                }),
                None => Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: 3,
                    last_outcome: Some(AttemptOutcome::Forbidden),
                }),
            }
        }
    }

    const SEARCH: &str = "https://www.olx.in/items/q-car-cover";

    fn config(pages: u32, debug_dir: PathBuf, save_debug_pages: bool) -> CrawlerConfig {
        CrawlerConfig {
            search_url: SEARCH.to_string(),
            base_url: "https://www.olx.in".to_string(),
            pages,
            page_delay: DelayRange::secs(0, 0),
            save_debug_pages,
            debug_dir,
        }
    }

    fn item(title: &str) -> String {
        format!(
            r#"<div data-aut-id="itemBox"><a href="/item/{title}"><span data-aut-id="itemTitle">{title}</span></a></div>"#
        )
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped_and_crawl_continues() {
        let page_one = format!("<html><body>{}{}</body></html>", item("a"), item("b"));
        let page_three = format!("<html><body>{}</body></html>", item("c"));
        let fetcher = StubFetcher::new(&[
            (SEARCH, page_one.as_str()),
            ("https://www.olx.in/items/q-car-cover?page=3", page_three.as_str()),
        ]);

        let dir = tempfile::tempdir().unwrap();
        let crawler = ListingCrawler::new(fetcher, ListingParser::new().unwrap(), config(3, dir.path().to_path_buf(), false));
        let outcome = crawler.crawl().await;

        let titles: Vec<&str> = outcome.listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert_eq!(outcome.pages.len(), 3);
        assert!(matches!(outcome.pages[1].status, PageStatus::FetchFailed(_)));
        assert_eq!(outcome.pages_with_listings(), 2);

        let requested = crawler.fetcher.requested.lock().unwrap().clone();
        assert_eq!(
            requested,
            vec![
                SEARCH.to_string(),
                format!("{SEARCH}?page=2"),
                format!("{SEARCH}?page=3"),
            ]
        );
    }

    #[tokio::test]
    async fn test_blocked_page_is_analysed_and_dumped() {
        let blocked = "<html><head><title>Access Denied</title></head><body><a href='/help'>help</a></body></html>";
        let fetcher = StubFetcher::new(&[(SEARCH, blocked)]);

        let dir = tempfile::tempdir().unwrap();
        let crawler = ListingCrawler::new(fetcher, ListingParser::new().unwrap(), config(1, dir.path().to_path_buf(), true));
        let outcome = crawler.crawl().await;

        assert!(outcome.listings.is_empty());
        assert!(outcome.blocking_detected());

        let report = &outcome.pages[0];
        assert_eq!(
            report.status,
            PageStatus::NoListings {
                title: Some("Access Denied".to_string()),
                total_links: 1,
            }
        );
        assert_eq!(report.blocking, vec!["access denied"]);
        assert!(dir.path().join("debug_page_1.html").exists());
    }

    #[test]
    fn test_crawler_config_clamps_pages() {
        let mut app = AppConfig::default();
        app.crawling.delay_scale = 0.0;

        let crawler_config = CrawlerConfig::from_app_config(&app, 40);
        assert_eq!(crawler_config.pages, app.crawling.max_pages_limit);
        assert_eq!(crawler_config.page_delay.sample(), Duration::ZERO);
        assert_eq!(crawler_config.search_url, SEARCH);
    }

    #[test]
    fn test_huge_delay_scale_is_capped() {
        let mut app = AppConfig::default();
        app.crawling.delay_scale = 1e300;

        let crawler_config = CrawlerConfig::from_app_config(&app, 2);
        let ceiling = app.crawling.strategy.page_delay().scaled(crate::infrastructure::config::defaults::MAX_DELAY_SCALE);
        assert!(crawler_config.page_delay.sample() <= ceiling.max);
    }
}
