//! Retry policy for listing page fetches
//!
//! Classifies each attempt's outcome and computes timeouts, backoff and
//! randomized waits. Everything here is pure so the fetch loop in
//! `http_client` stays a thin driver around it.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::infrastructure::config::defaults::MIN_BODY_BYTES;
use crate::infrastructure::config::utils::bounded_delay_scale;

/// How hard the client tries before giving up on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// One method, fixed timeout, randomized pause before every retry
    Basic,
    /// Four methods in order, each with progressive-timeout retries
    #[default]
    Fallback,
}

impl FetchStrategy {
    /// Methods tried in order until one yields an accepted page
    pub const fn methods(self) -> &'static [FetchMethod] {
        match self {
            Self::Basic => &[FetchMethod::Standard],
            Self::Fallback => &[
                FetchMethod::Standard,
                FetchMethod::InsecureTls,
                FetchMethod::PlainHttp,
                FetchMethod::AlternateUserAgent,
            ],
        }
    }

    /// Pause inserted before every page after the first
    pub const fn page_delay(self) -> DelayRange {
        match self {
            Self::Basic => DelayRange::secs(3, 6),
            Self::Fallback => DelayRange::secs(5, 10),
        }
    }
}

/// A single way of requesting a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FetchMethod {
    Standard,
    /// TLS certificate verification disabled
    InsecureTls,
    /// `https://` rewritten to `http://`
    PlainHttp,
    /// Alternate (Safari) user agent
    AlternateUserAgent,
}

impl FetchMethod {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard HTTPS request",
            Self::InsecureTls => "Without SSL verification",
            Self::PlainHttp => "HTTP instead of HTTPS",
            Self::AlternateUserAgent => "Different User-Agent",
        }
    }

    /// URL actually requested by this method
    pub fn target_url(self, url: &str) -> String {
        match self {
            Self::PlainHttp => url.replacen("https://", "http://", 1),
            _ => url.to_string(),
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive range a random wait is drawn from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const fn secs(min: u64, max: u64) -> Self {
        Self { min: Duration::from_secs(min), max: Duration::from_secs(max) }
    }

    /// Uniform sample from the range
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let span = (self.max - self.min).as_secs_f64();
        self.min + Duration::from_secs_f64(span * fastrand::f64())
    }

    pub fn scaled(self, scale: f64) -> Self {
        Self { min: self.min.mul_f64(scale), max: self.max.mul_f64(scale) }
    }
}

/// Result of a single request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted,
    /// 403, most likely an IP block
    Forbidden,
    /// 429
    RateLimited,
    /// Success status but a body too small to be a results page
    TooSmall,
    UnexpectedStatus(u16),
    Timeout,
    Connection,
    Tls,
    Other,
}

impl AttemptOutcome {
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn describe(self) -> String {
        match self {
            Self::Accepted => "accepted".to_string(),
            Self::Forbidden => "🚫 Access forbidden - likely blocked".to_string(),
            Self::RateLimited => "⏰ Rate limited - need to wait longer".to_string(),
            Self::TooSmall => "⚠️  Response too short, might be blocked".to_string(),
            Self::UnexpectedStatus(status) => format!("⚠️  Unexpected status {status}"),
            Self::Timeout => "⏰ Timeout".to_string(),
            Self::Connection => "🔌 Connection error".to_string(),
            Self::Tls => "🔒 SSL error".to_string(),
            Self::Other => "❌ Unexpected error".to_string(),
        }
    }
}

/// Classify a transport-level failure
///
/// Only the underlying causes are inspected; the top-level message embeds
/// the request URL, which may itself contain words like "ssl".
pub fn classify_transport_error(error: &reqwest::Error) -> AttemptOutcome {
    if error.is_timeout() {
        return AttemptOutcome::Timeout;
    }

    if source_chain(error).any(|cause| is_tls_failure(&cause.to_string())) {
        return AttemptOutcome::Tls;
    }

    if error.is_connect() || error.is_request() {
        AttemptOutcome::Connection
    } else {
        AttemptOutcome::Other
    }
}

fn source_chain(error: &reqwest::Error) -> impl Iterator<Item = &(dyn std::error::Error + 'static)> {
    std::iter::successors(std::error::Error::source(error), |cause| cause.source())
}

fn is_tls_failure(message: &str) -> bool {
    let message = message.to_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|marker| message.contains(marker))
}

/// Retry behaviour for one fetch method
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,

    /// Timeout of the first attempt
    pub base_timeout: Duration,

    /// Added to the timeout for every further attempt
    pub timeout_step: Duration,

    /// Random pause before every attempt after the first
    pub pre_attempt_delay: Option<DelayRange>,

    /// Jitter added on top of the `2^attempt` second backoff
    pub backoff_jitter: DelayRange,

    /// Extra random wait after a 429
    pub rate_limit_wait: Option<DelayRange>,

    pub min_body_bytes: usize,

    /// Accept only 200 (otherwise any 2xx)
    pub require_exact_ok: bool,

    /// Hand back an undersized body when no attempts remain
    pub accept_small_on_last_attempt: bool,

    /// Back off after an undersized body (otherwise retry straight away)
    pub backoff_on_small_body: bool,

    /// Multiplier applied to every sleep; 0.0 disables waiting
    pub scale: f64,
}

impl RetryPolicy {
    /// Policy for a strategy; at least one attempt is always made
    pub fn for_strategy(strategy: FetchStrategy, max_retries: u32) -> Self {
        let max_retries = max_retries.max(1);
        match strategy {
            FetchStrategy::Basic => Self {
                max_retries,
                base_timeout: Duration::from_secs(30),
                timeout_step: Duration::ZERO,
                pre_attempt_delay: Some(DelayRange::secs(3, 8)),
                backoff_jitter: DelayRange::secs(1, 3),
                rate_limit_wait: None,
                min_body_bytes: MIN_BODY_BYTES,
                require_exact_ok: false,
                accept_small_on_last_attempt: true,
                backoff_on_small_body: false,
                scale: 1.0,
            },
            FetchStrategy::Fallback => Self {
                max_retries,
                base_timeout: Duration::from_secs(15),
                timeout_step: Duration::from_secs(10),
                pre_attempt_delay: None,
                backoff_jitter: DelayRange::secs(2, 5),
                rate_limit_wait: Some(DelayRange::secs(10, 20)),
                min_body_bytes: MIN_BODY_BYTES,
                require_exact_ok: true,
                accept_small_on_last_attempt: false,
                backoff_on_small_body: true,
                scale: 1.0,
            },
        }
    }

    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = bounded_delay_scale(scale);
        self
    }

    /// Request timeout for a 0-based attempt: 15s, 25s, 35s for the fallback strategy
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.base_timeout + self.timeout_step * attempt
    }

    /// Sleep after a failed 0-based attempt: `2^attempt` seconds plus jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = Duration::from_secs(2_u64.saturating_pow(attempt));
        (exponential + self.backoff_jitter.sample()).mul_f64(self.scale)
    }

    pub fn pre_attempt_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return None;
        }
        self.pre_attempt_delay.map(|range| range.scaled(self.scale).sample())
    }

    pub fn rate_limit_wait(&self) -> Option<Duration> {
        self.rate_limit_wait.map(|range| range.scaled(self.scale).sample())
    }

    pub const fn is_last_attempt(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_retries
    }

    /// Whether to sleep before the next attempt after this outcome
    pub fn should_backoff(&self, outcome: AttemptOutcome, attempt: u32) -> bool {
        if self.is_last_attempt(attempt) || outcome.is_accepted() {
            return false;
        }
        outcome != AttemptOutcome::TooSmall || self.backoff_on_small_body
    }

    /// Classify a completed HTTP response
    pub fn classify_response(&self, status: StatusCode, body_len: usize) -> AttemptOutcome {
        let status_ok = if self.require_exact_ok {
            status == StatusCode::OK
        } else {
            status.is_success()
        };

        if status_ok {
            if body_len > self.min_body_bytes {
                AttemptOutcome::Accepted
            } else {
                AttemptOutcome::TooSmall
            }
        } else if status == StatusCode::FORBIDDEN {
            AttemptOutcome::Forbidden
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            AttemptOutcome::RateLimited
        } else {
            AttemptOutcome::UnexpectedStatus(status.as_u16())
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_strategy(FetchStrategy::default(), crate::infrastructure::config::defaults::MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::defaults::MAX_DELAY_SCALE;
    use rstest::rstest;

    #[test]
    fn test_progressive_timeout() {
        let policy = RetryPolicy::for_strategy(FetchStrategy::Fallback, 3);
        assert_eq!(policy.timeout_for(0), Duration::from_secs(15));
        assert_eq!(policy.timeout_for(1), Duration::from_secs(25));
        assert_eq!(policy.timeout_for(2), Duration::from_secs(35));

        let basic = RetryPolicy::for_strategy(FetchStrategy::Basic, 3);
        assert_eq!(basic.timeout_for(2), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_bounds() {
        let policy = RetryPolicy::for_strategy(FetchStrategy::Fallback, 3);
        for attempt in 0..3 {
            let delay = policy.backoff(attempt);
            let base = 2_u64.pow(attempt);
            assert!(delay >= Duration::from_secs(base + 2));
            assert!(delay <= Duration::from_secs(base + 5));
        }
    }

    #[test]
    fn test_zero_scale_disables_waiting() {
        let policy = RetryPolicy::for_strategy(FetchStrategy::Basic, 3).with_scale(0.0);
        assert_eq!(policy.backoff(2), Duration::ZERO);
        assert_eq!(policy.pre_attempt_delay(1), Some(Duration::ZERO));
        assert_eq!(policy.pre_attempt_delay(0), None);
    }

    #[test]
    fn test_huge_scale_is_capped() {
        let policy = RetryPolicy::for_strategy(FetchStrategy::Fallback, 3).with_scale(1e300);
        assert_eq!(policy.scale, MAX_DELAY_SCALE);
        assert!(policy.backoff(2) <= Duration::from_secs(9).mul_f64(MAX_DELAY_SCALE));
        assert!(policy.rate_limit_wait().is_some());
    }

    #[test]
    fn test_zero_retries_still_attempts_once() {
        let policy = RetryPolicy::for_strategy(FetchStrategy::Basic, 0);
        assert_eq!(policy.max_retries, 1);
        assert!(policy.is_last_attempt(0));
    }

    #[tokio::test]
    async fn test_refused_connection_with_tls_words_in_url() {
        let error = reqwest::get("http://127.0.0.1:1/items/q-ssl-cable").await.unwrap_err();
        assert!(error.to_string().contains("ssl-cable"));
        assert_eq!(classify_transport_error(&error), AttemptOutcome::Connection);
    }

    #[rstest]
    #[case("invalid peer certificate: UnknownIssuer", true)]
    #[case("error:0A000086:SSL routines:tls_post_process_server_certificate", true)]
    #[case("received fatal alert: HandshakeFailure", true)]
    #[case("Connection refused (os error 111)", false)]
    #[case("tcp connect error", false)]
    fn test_tls_failure_messages(#[case] message: &str, #[case] expected: bool) {
        assert_eq!(is_tls_failure(message), expected);
    }

    #[rstest]
    #[case(FetchStrategy::Fallback, 200, 5000, AttemptOutcome::Accepted)]
    #[case(FetchStrategy::Fallback, 200, 1000, AttemptOutcome::TooSmall)]
    #[case(FetchStrategy::Fallback, 203, 5000, AttemptOutcome::UnexpectedStatus(203))]
    #[case(FetchStrategy::Basic, 203, 5000, AttemptOutcome::Accepted)]
    #[case(FetchStrategy::Fallback, 403, 5000, AttemptOutcome::Forbidden)]
    #[case(FetchStrategy::Basic, 429, 0, AttemptOutcome::RateLimited)]
    #[case(FetchStrategy::Fallback, 503, 5000, AttemptOutcome::UnexpectedStatus(503))]
    fn test_classify_response(
        #[case] strategy: FetchStrategy,
        #[case] status: u16,
        #[case] body_len: usize,
        #[case] expected: AttemptOutcome,
    ) {
        let policy = RetryPolicy::for_strategy(strategy, 3);
        let status = StatusCode::from_u16(status).unwrap();
        assert_eq!(policy.classify_response(status, body_len), expected);
    }

    #[test]
    fn test_small_body_backoff_differs_by_strategy() {
        let basic = RetryPolicy::for_strategy(FetchStrategy::Basic, 3);
        let fallback = RetryPolicy::for_strategy(FetchStrategy::Fallback, 3);

        assert!(!basic.should_backoff(AttemptOutcome::TooSmall, 0));
        assert!(basic.should_backoff(AttemptOutcome::Timeout, 0));
        assert!(fallback.should_backoff(AttemptOutcome::TooSmall, 0));
        assert!(!fallback.should_backoff(AttemptOutcome::Timeout, 2));
    }

    #[test]
    fn test_methods_per_strategy() {
        assert_eq!(FetchStrategy::Basic.methods(), &[FetchMethod::Standard]);
        assert_eq!(FetchStrategy::Fallback.methods().len(), 4);
        assert_eq!(
            FetchMethod::PlainHttp.target_url("https://www.olx.in/items/q-car-cover"),
            "http://www.olx.in/items/q-car-cover"
        );
    }

    #[test]
    fn test_delay_range_sample_within_bounds() {
        let range = DelayRange::secs(5, 10);
        for _ in 0..50 {
            let d = range.sample();
            assert!(d >= Duration::from_secs(5) && d <= Duration::from_secs(10));
        }
    }
}
