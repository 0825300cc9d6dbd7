//! Blocking detection, debug page dumps and connectivity probing

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use tokio::fs;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::infrastructure::config::{SiteConfig, utils};
use crate::infrastructure::http_client::{FetchError, HttpClient};
use crate::infrastructure::parsing::{ListingParser, ParsingError, ParsingResult};

/// Phrases that suggest an anti-bot page instead of search results
pub const BLOCKING_INDICATORS: &[&str] = &["blocked", "captcha", "robot", "access denied"];

/// The probe is stricter and also flags a bare "bot"
pub const PROBE_BLOCKING_INDICATORS: &[&str] = &["blocked", "captcha", "robot", "bot"];

/// Element kinds a healthy search page contains
const EXPECTED_ELEMENTS: [&str; 3] = [
    "div[data-aut-id='itemBox']",
    "div[class*='item' i]",
    "a[href*='/item/']",
];

/// Indicators occurring anywhere in `body`, case-insensitively
pub fn detect_blocking<'a>(body: &str, indicators: &[&'a str]) -> Vec<&'a str> {
    let lowered = body.to_lowercase();
    indicators
        .iter()
        .copied()
        .filter(|indicator| lowered.contains(indicator))
        .collect()
}

/// Write a fetched page to `{dir}/debug_page_{page}.html`
pub async fn save_debug_page(dir: &Path, page: u32, body: &str) -> Result<PathBuf> {
    save_html(dir, &format!("debug_page_{page}.html"), body).await
}

async fn save_html(dir: &Path, file_name: &str, body: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let path = dir.join(file_name);
    fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}

/// Title and element counts for a probed search page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInspection {
    pub title: Option<String>,
    /// How many of the three expected element kinds are present
    pub expected_elements_found: usize,
}

pub fn inspect_page(parser: &ListingParser, html: &Html) -> ParsingResult<PageInspection> {
    let mut found = 0;
    for source in EXPECTED_ELEMENTS {
        let selector =
            Selector::parse(source).map_err(|e| ParsingError::invalid_selector(source, &e.to_string()))?;
        if html.select(&selector).next().is_some() {
            found += 1;
        }
    }

    Ok(PageInspection {
        title: parser.page_title(html),
        expected_elements_found: found,
    })
}

/// One URL to probe
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub url: String,
    /// Inspect the body and keep a copy on disk
    pub inspect: bool,
}

impl ProbeTarget {
    /// Site root over HTTPS and HTTP, the search page, and the sitemap
    pub fn defaults_for(site: &SiteConfig) -> Vec<Self> {
        let base = site.base_url.trim_end_matches('/');
        vec![
            Self { url: base.to_string(), inspect: false },
            Self { url: base.replacen("https://", "http://", 1), inspect: false },
            Self { url: utils::search_url(base, &site.search_query), inspect: true },
            Self { url: format!("{base}/sitemap.xml"), inspect: false },
        ]
    }
}

#[derive(Debug)]
pub enum ProbeOutcome {
    Reached {
        status: u16,
        elapsed: Duration,
        size: usize,
        final_url: String,
        blocking: Vec<&'static str>,
        inspection: Option<PageInspection>,
        saved_as: Option<PathBuf>,
    },
    Failed(FetchError),
}

#[derive(Debug)]
pub struct ProbeReport {
    pub url: String,
    pub outcome: ProbeOutcome,
}

impl ProbeReport {
    pub const fn is_reachable(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Reached { .. })
    }
}

/// Connectivity probe settings
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub timeout: Duration,
    /// Pause between consecutive targets
    pub pause: Duration,
    /// Where inspected pages are saved as `test_page_{i}.html`
    pub output_dir: PathBuf,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pause: Duration::from_secs(2),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Request every target once and report what came back
pub async fn probe(
    client: &HttpClient,
    parser: &ListingParser,
    targets: &[ProbeTarget],
    options: &ProbeOptions,
) -> Vec<ProbeReport> {
    info!("🔍 Testing connectivity...");
    let mut reports = Vec::with_capacity(targets.len());

    for (index, target) in targets.iter().enumerate() {
        let number = index + 1;
        info!("{}. Testing: {}", number, target.url);

        let outcome = match client.fetch_once(&target.url, options.timeout).await {
            Ok(page) => {
                info!("   ✅ Status: {}", page.status);
                info!("   ⏱️  Response time: {:.2} seconds", page.elapsed.as_secs_f64());
                info!("   📦 Content length: {} bytes", page.size());
                info!("   🌐 Final URL: {}", page.final_url);

                let blocking = detect_blocking(&page.body, PROBE_BLOCKING_INDICATORS);
                if !blocking.is_empty() {
                    warn!("   ⚠️  Possible blocking detected in content: {:?}", blocking);
                }

                let (inspection, saved_as) = if target.inspect {
                    inspect_and_save(parser, &page.body, number, &options.output_dir).await
                } else {
                    (None, None)
                };

                ProbeOutcome::Reached {
                    status: page.status,
                    elapsed: page.elapsed,
                    size: page.size(),
                    final_url: page.final_url,
                    blocking,
                    inspection,
                    saved_as,
                }
            }
            Err(e) => {
                warn!("   ❌ {}", e);
                ProbeOutcome::Failed(e)
            }
        };

        reports.push(ProbeReport { url: target.url.clone(), outcome });

        if number < targets.len() && !options.pause.is_zero() {
            sleep(options.pause).await;
        }
    }

    reports
}

async fn inspect_and_save(
    parser: &ListingParser,
    body: &str,
    number: usize,
    output_dir: &Path,
) -> (Option<PageInspection>, Option<PathBuf>) {
    let inspection = {
        let html = Html::parse_document(body);
        inspect_page(parser, &html)
    };

    let inspection = match inspection {
        Ok(inspection) => {
            info!("   📄 Page title: {}", inspection.title.as_deref().unwrap_or("No title"));
            info!(
                "   🎯 Found {}/{} expected element types",
                inspection.expected_elements_found,
                EXPECTED_ELEMENTS.len()
            );
            Some(inspection)
        }
        Err(e) => {
            warn!("   Page inspection failed: {}", e);
            None
        }
    };

    let saved_as = match save_html(output_dir, &format!("test_page_{number}.html"), body).await {
        Ok(path) => {
            info!("   💾 Saved response as '{}'", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("   {:#}", e);
            None
        }
    };

    (inspection, saved_as)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_blocking_is_case_insensitive() {
        let body = "<h1>Access Denied</h1><p>Please solve the CAPTCHA</p>";
        assert_eq!(detect_blocking(body, BLOCKING_INDICATORS), vec!["captcha", "access denied"]);
        assert!(detect_blocking("<p>car cover</p>", BLOCKING_INDICATORS).is_empty());
    }

    #[test]
    fn test_probe_indicators_flag_bare_bot() {
        let body = "bot check";
        assert!(detect_blocking(body, BLOCKING_INDICATORS).is_empty());
        assert_eq!(detect_blocking(body, PROBE_BLOCKING_INDICATORS), vec!["bot"]);
    }

    #[test]
    fn test_inspect_page_counts_expected_elements() {
        let parser = ListingParser::new().unwrap();
        let html = Html::parse_document(
            r#"<html><head><title>Car Cover in India | OLX</title></head>
               <body><div class="ItemCard"><a href="/item/x-iid-1">x</a></div></body></html>"#,
        );

        let inspection = inspect_page(&parser, &html).unwrap();
        assert_eq!(inspection.title.as_deref(), Some("Car Cover in India | OLX"));
        assert_eq!(inspection.expected_elements_found, 2);
    }

    #[test]
    fn test_default_probe_targets() {
        let targets = ProbeTarget::defaults_for(&SiteConfig::default());
        let urls: Vec<&str> = targets.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.olx.in",
                "http://www.olx.in",
                "https://www.olx.in/items/q-car-cover",
                "https://www.olx.in/sitemap.xml",
            ]
        );
        assert!(targets[2].inspect);
    }

    #[tokio::test]
    async fn test_save_debug_page_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_debug_page(&dir.path().join("debug"), 2, "<html></html>").await.unwrap();
        assert!(path.ends_with("debug_page_2.html"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html></html>");
    }
}
