//! Configuration infrastructure
//!
//! Contains configuration loading and management for listing crawls.
//!
//! Configuration is organized into sections:
//! 1. Site settings (which classifieds site and search query)
//! 2. Crawling settings (fetch strategy, retries, page limits)
//! 3. Selector settings (ordered fallback CSS selectors)
//! 4. Output and logging settings

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::infrastructure::parsing::config::ListingSelectors;
use crate::infrastructure::retry_policy::FetchStrategy;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub crawling: CrawlingConfig,
    pub selectors: ListingSelectors,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reject settings that would make a crawl send nothing or sleep forever
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.site.base_url)
            .with_context(|| format!("site.base_url '{}' is not a valid URL", self.site.base_url))?;
        ensure!(
            !utils::slugify(&self.site.search_query).is_empty(),
            "site.search_query must contain at least one letter or digit"
        );

        let crawling = &self.crawling;
        ensure!(crawling.max_retries >= 1, "crawling.max_retries must be at least 1");
        ensure!(crawling.max_pages_limit >= 1, "crawling.max_pages_limit must be at least 1");
        ensure!(
            crawling.delay_scale.is_finite() && (0.0..=defaults::MAX_DELAY_SCALE).contains(&crawling.delay_scale),
            "crawling.delay_scale must be between 0 and {}, got {}",
            defaults::MAX_DELAY_SCALE,
            crawling.delay_scale
        );
        Ok(())
    }
}

/// Target site and search query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Short site name used in output file names
    pub name: String,

    /// Site root, used to resolve relative listing links
    pub base_url: String,

    /// Free-text search query, e.g. "car cover"
    pub search_query: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: site::NAME.to_string(),
            base_url: site::BASE_URL.to_string(),
            search_query: site::DEFAULT_QUERY.to_string(),
        }
    }
}

impl SiteConfig {
    /// Search results URL for the configured query (page 1)
    pub fn search_url(&self) -> String {
        utils::search_url(&self.base_url, &self.search_query)
    }

    /// File stem shared by the JSON and CSV outputs, e.g. `olx_car_cover_results`
    pub fn results_file_stem(&self) -> String {
        format!("{}_{}_results", self.name, utils::slugify(&self.search_query).replace('-', "_"))
    }
}

/// Crawling behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlingConfig {
    /// Which fetch strategy to use: single-method retries or multi-method fallback
    pub strategy: FetchStrategy,

    /// Attempts per fetch method
    pub max_retries: u32,

    /// Page count used when the user gives no (or invalid) input
    pub default_pages: u32,

    /// Upper bound on pages per run
    pub max_pages_limit: u32,

    /// Save every fetched page as `debug_page_{n}.html`
    pub save_debug_pages: bool,

    /// Multiplier applied to every sleep (0.0 disables waiting)
    pub delay_scale: f64,

    /// Maximum redirects followed per request
    pub max_redirects: usize,
}

impl Default for CrawlingConfig {
    fn default() -> Self {
        Self {
            strategy: FetchStrategy::default(),
            max_retries: defaults::MAX_RETRIES,
            default_pages: defaults::DEFAULT_PAGES,
            max_pages_limit: defaults::MAX_PAGES_LIMIT,
            save_debug_pages: true,
            delay_scale: 1.0,
            max_redirects: defaults::MAX_REDIRECTS,
        }
    }
}

impl CrawlingConfig {
    /// Clamp a requested page count into `[1, max_pages_limit]`
    pub fn clamp_pages(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_pages_limit.max(1))
    }

    /// `delay_scale` forced into `[0, MAX_DELAY_SCALE]`
    pub fn effective_delay_scale(&self) -> f64 {
        utils::bounded_delay_scale(self.delay_scale)
    }
}

/// Which serialization formats to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
    #[default]
    Both,
}

impl OutputFormat {
    pub const fn writes_json(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    pub const fn writes_csv(self) -> bool {
        matches!(self, Self::Csv | Self::Both)
    }
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,

    /// Where debug page dumps go; defaults to `output_dir`
    pub debug_dir: Option<PathBuf>,

    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            debug_dir: None,
            format: OutputFormat::default(),
        }
    }
}

impl OutputConfig {
    pub fn debug_dir(&self) -> &Path {
        self.debug_dir.as_deref().unwrap_or(&self.output_dir)
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Log directory; defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,

    /// Module-specific log level filters (e.g., "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_filters = HashMap::new();
        module_filters.insert("reqwest".to_string(), "info".to_string());
        module_filters.insert("hyper".to_string(), "warn".to_string());
        module_filters.insert("html5ever".to_string(), "warn".to_string());
        module_filters.insert("selectors".to_string(), "warn".to_string());

        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: true,
            module_filters,
        }
    }
}

/// How `ConfigManager::load_config_with_status` obtained the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLoadStatus {
    Loaded,
    /// No file existed; defaults were written
    Created,
    /// The file did not parse; it was copied to `backup` (when possible) and replaced by defaults
    ResetCorrupted { reason: String, backup: Option<PathBuf> },
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Configuration manager for the default per-user location
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join("config.json");
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self { config_path: config_path.into() }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        self.load_config_with_status().await.map(|(config, _)| config)
    }

    /// Load configuration and report whether it was read, created or reset
    ///
    /// Runs before logging is set up, so callers surface the status themselves.
    /// A parsed but invalid configuration is an error and the file is left untouched.
    pub async fn load_config_with_status(&self) -> Result<(AppConfig, ConfigLoadStatus)> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok((default_config, ConfigLoadStatus::Created));
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                config
                    .validate()
                    .with_context(|| format!("Invalid configuration in {}", self.config_path.display()))?;
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok((config, ConfigLoadStatus::Loaded))
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration file could not be parsed: {}", parse_error);

                let backup_path = self.config_path.with_extension("json.corrupted");
                let backup = match fs::copy(&self.config_path, &backup_path).await {
                    Ok(_) => {
                        info!("Backed up corrupted config to: {:?}", backup_path);
                        Some(backup_path)
                    }
                    Err(e) => {
                        warn!("Failed to create backup of corrupted config: {}", e);
                        None
                    }
                };

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;

                info!("✅ Reset to default configuration");
                Ok((
                    default_config,
                    ConfigLoadStatus::ResetCorrupted {
                        reason: parse_error.to_string(),
                        backup,
                    },
                ))
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        let content = serde_json::to_string_pretty(config)
            .context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Reset configuration to defaults
    pub async fn reset_to_defaults(&self) -> Result<AppConfig> {
        info!("🔄 Resetting configuration to defaults");
        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;
        Ok(default_config)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// OLX India URLs and browser identity
pub mod site {
    pub const NAME: &str = "olx";

    pub const BASE_URL: &str = "https://www.olx.in";

    pub const DEFAULT_QUERY: &str = "car cover";

    /// Search results live under `/items/q-{slug}`
    pub const SEARCH_PATH_PREFIX: &str = "/items/q-";

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    /// Used by the last fallback method
    pub const ALTERNATE_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.1 Safari/605.1.15";

    /// Browser-like request headers sent with every request (User-Agent is set separately)
    pub const BROWSER_HEADERS: &[(&str, &str)] = &[
        ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7"),
        ("accept-language", "en-US,en;q=0.9"),
        ("dnt", "1"),
        ("upgrade-insecure-requests", "1"),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "none"),
        ("sec-fetch-user", "?1"),
        ("cache-control", "max-age=0"),
        ("sec-ch-ua", "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\""),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"Windows\""),
    ];
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "classifieds-crawler";

    /// Attempts per fetch method
    pub const MAX_RETRIES: u32 = 3;

    /// Pages crawled when the user just presses enter
    pub const DEFAULT_PAGES: u32 = 2;

    pub const MAX_PAGES_LIMIT: u32 = 5;

    pub const MAX_REDIRECTS: usize = 10;

    /// Largest accepted `delay_scale`; a 100x pause already means minutes per page
    pub const MAX_DELAY_SCALE: f64 = 100.0;

    /// Bodies at or below this size are treated as block pages
    pub const MIN_BODY_BYTES: usize = 1000;

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_MAX_FILES: u32 = 5;
}

/// URL building helper functions
pub mod utils {
    use super::{Regex, defaults, lazy_static, site};

    lazy_static! {
        static ref NON_SLUG_CHARS: Regex = Regex::new(r"[^a-z0-9]+").expect("static regex");
    }

    /// Lowercase, dash-separated form of a search query: "Car  Cover!" -> "car-cover"
    pub fn slugify(query: &str) -> String {
        NON_SLUG_CHARS
            .replace_all(&query.to_lowercase(), "-")
            .trim_matches('-')
            .to_string()
    }

    /// Sleep multiplier usable with `Duration::mul_f64`; NaN counts as 0
    pub fn bounded_delay_scale(scale: f64) -> f64 {
        if scale.is_nan() { 0.0 } else { scale.clamp(0.0, defaults::MAX_DELAY_SCALE) }
    }

    pub fn search_url(base_url: &str, query: &str) -> String {
        format!("{}{}{}", base_url.trim_end_matches('/'), site::SEARCH_PATH_PREFIX, slugify(query))
    }

    /// Page 1 is the bare search URL; later pages add `?page={n}`
    pub fn page_url(search_url: &str, page: u32) -> String {
        if page <= 1 {
            search_url.to_string()
        } else {
            format!("{search_url}?page={page}")
        }
    }
}
