//! HTTP client for listing pages with retry and multi-method fallback
//!
//! Sends browser-like requests and drives the retry loop described by
//! [`RetryPolicy`]. With the fallback strategy each page is tried with up
//! to four methods (standard, no TLS verification, plain HTTP, alternate
//! user agent), each method getting the full retry budget.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, ClientBuilder, StatusCode};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::infrastructure::config::{CrawlingConfig, site};
use crate::infrastructure::retry_policy::{
    AttemptOutcome, FetchMethod, FetchStrategy, RetryPolicy, classify_transport_error,
};

/// Errors surfaced by [`HttpClient`]
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("All {attempts} attempts failed for {url}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_outcome: Option<AttemptOutcome>,
    },

    #[error("HTTP request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Configuration for HTTP client behavior
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    /// Sent by the last fallback method instead of `user_agent`
    pub alternate_user_agent: String,
    pub max_redirects: usize,
    pub strategy: FetchStrategy,
    pub retry: RetryPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from_crawling_config(&CrawlingConfig::default())
    }
}

impl HttpClientConfig {
    pub fn from_crawling_config(crawling: &CrawlingConfig) -> Self {
        Self {
            user_agent: site::USER_AGENT.to_string(),
            alternate_user_agent: site::ALTERNATE_USER_AGENT.to_string(),
            max_redirects: crawling.max_redirects,
            strategy: crawling.strategy,
            retry: RetryPolicy::for_strategy(crawling.strategy, crawling.max_retries)
                .with_scale(crawling.effective_delay_scale()),
        }
    }
}

/// A page body accepted by the retry loop
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub requested_url: String,
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    pub body: String,
    pub method: FetchMethod,
    /// 0-based attempt within `method`
    pub attempt: u32,
    pub elapsed: Duration,
}

impl FetchedPage {
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// HTTP client with browser headers, retries and method fallback
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    /// Same settings with certificate verification disabled
    insecure_client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self, FetchError> {
        let headers = browser_headers()?;

        let client = Self::builder(&config, headers.clone())
            .build()
            .map_err(FetchError::ClientBuild)?;
        let insecure_client = Self::builder(&config, headers)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self {
            client,
            insecure_client,
            config,
        })
    }

    fn builder(config: &HttpClientConfig, headers: HeaderMap) -> ClientBuilder {
        ClientBuilder::new()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
    }

    pub const fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Fetch a page, walking through the strategy's methods until one succeeds
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut attempts = 0;
        let mut last_outcome = None;

        for (index, method) in self.config.strategy.methods().iter().enumerate() {
            info!("🔄 Method {}: {}", index + 1, method);

            match self.try_method(*method, url).await {
                Ok(page) => return Ok(page),
                Err(outcome) => {
                    attempts += self.config.retry.max_retries;
                    last_outcome = outcome.or(last_outcome);
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last_outcome,
        })
    }

    /// Run the retry loop for a single method
    async fn try_method(&self, method: FetchMethod, url: &str) -> Result<FetchedPage, Option<AttemptOutcome>> {
        let policy = &self.config.retry;
        let target = method.target_url(url);
        let mut last_outcome = None;

        for attempt in 0..policy.max_retries {
            if let Some(delay) = policy.pre_attempt_delay(attempt) {
                info!("⏳ Waiting {:.1} seconds...", delay.as_secs_f64());
                sleep(delay).await;
            }

            info!("   📡 Attempt {}: {}", attempt + 1, target);
            let started = Instant::now();

            let outcome = match self.send(method, &target, policy.timeout_for(attempt)).await {
                Ok((status, final_url, body)) => {
                    info!("   ✅ Status: {}", status.as_u16());
                    info!("   📦 Size: {} bytes", body.len());

                    let outcome = policy.classify_response(status, body.len());
                    let accept_small = outcome == AttemptOutcome::TooSmall
                        && policy.accept_small_on_last_attempt
                        && policy.is_last_attempt(attempt);

                    if accept_small {
                        warn!("   {} - using it anyway", outcome.describe());
                    }

                    if outcome.is_accepted() || accept_small {
                        return Ok(FetchedPage {
                            requested_url: target,
                            final_url,
                            status: status.as_u16(),
                            body,
                            method,
                            attempt,
                            elapsed: started.elapsed(),
                        });
                    }

                    warn!("   {}", outcome.describe());
                    if outcome == AttemptOutcome::RateLimited {
                        if let Some(wait) = policy.rate_limit_wait() {
                            info!("⏳ Waiting {:.1} seconds to avoid detection...", wait.as_secs_f64());
                            sleep(wait).await;
                        }
                    }
                    outcome
                }
                Err(e) => {
                    let outcome = classify_transport_error(&e);
                    warn!("   {}: {}...", outcome.describe(), truncate(&e.to_string(), 100));
                    outcome
                }
            };

            last_outcome = Some(outcome);

            if policy.should_backoff(outcome, attempt) {
                let delay = policy.backoff(attempt);
                info!("   ⏳ Waiting {:.1}s before retry...", delay.as_secs_f64());
                sleep(delay).await;
            }
        }

        Err(last_outcome)
    }

    async fn send(
        &self,
        method: FetchMethod,
        url: &str,
        timeout: Duration,
    ) -> Result<(StatusCode, String, String), reqwest::Error> {
        let client = match method {
            FetchMethod::InsecureTls => &self.insecure_client,
            _ => &self.client,
        };

        let mut request = client.get(url).timeout(timeout);
        if method == FetchMethod::AlternateUserAgent {
            request = request.header(USER_AGENT, &self.config.alternate_user_agent);
        }

        let response = request.send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        debug!("Fetched {} ({} bytes, {})", final_url, body.len(), status);
        Ok((status, final_url, body))
    }

    /// Single request without retries, any status accepted
    pub async fn fetch_once(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let started = Instant::now();
        let (status, final_url, body) = self
            .send(FetchMethod::Standard, url, timeout)
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        Ok(FetchedPage {
            requested_url: url.to_string(),
            final_url,
            status: status.as_u16(),
            body,
            method: FetchMethod::Standard,
            attempt: 0,
            elapsed: started.elapsed(),
        })
    }
}

fn browser_headers() -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in site::BROWSER_HEADERS {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::InvalidHeader {
            name: (*name).to_string(),
            reason: e.to_string(),
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| FetchError::InvalidHeader {
            name: (*name).to_string(),
            reason: e.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Cut a message to at most `max` characters
pub fn truncate(message: &str, max: usize) -> &str {
    message
        .char_indices()
        .nth(max)
        .map_or(message, |(index, _)| &message[..index])
}
