//! The fetch pipeline's HTTP client: wires rate limiting, circuit breaking,
//! per-host concurrency, and robots compliance around a `reqwest::Client`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::StatusCode;

use super::circuit_breaker::CircuitBreaker;
use super::domain_concurrency::DomainConcurrencyLimiter;
use super::error::FetchError;
use super::rate_limiter::{HostRateLimiter, RateLimitDecision};
use super::robots::RobotsCache;

/// Result of a single successful fetch, carrying everything an
/// `http_responses` row needs.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub final_url: String,
    pub http_status: u16,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub redirect_chain: Vec<String>,
    pub body: Vec<u8>,
    pub request_started_at: chrono::DateTime<Utc>,
    pub fetched_at: chrono::DateTime<Utc>,
    pub ttfb_ms: u64,
    pub download_ms: u64,
    pub total_ms: u64,
}

impl FetchOutcome {
    #[must_use]
    pub fn transfer_kbps(&self) -> f64 {
        if self.download_ms == 0 {
            return 0.0;
        }
        (self.body.len() as f64 / 1024.0) / (self.download_ms as f64 / 1000.0)
    }

    #[must_use]
    pub fn not_modified(&self) -> bool {
        self.http_status == StatusCode::NOT_MODIFIED.as_u16()
    }
}

pub struct FetchClient {
    http: reqwest::Client,
    rate_limiter: HostRateLimiter,
    circuit_breaker: Arc<CircuitBreaker>,
    domain_concurrency: DomainConcurrencyLimiter,
    robots: RobotsCache,
    max_redirects: u8,
    user_agent: String,
    default_host_delay: Duration,
}

impl FetchClient {
    pub fn new(
        user_agent: String,
        connect_timeout: Duration,
        total_timeout: Duration,
        max_redirects: u8,
        max_host_concurrency: usize,
        default_rate_per_sec: f64,
        circuit_breaker: Arc<CircuitBreaker>,
        robots_ttl: Duration,
        default_host_delay: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.clone())
            .connect_timeout(connect_timeout)
            .timeout(total_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            http,
            rate_limiter: HostRateLimiter::new(default_rate_per_sec),
            circuit_breaker,
            domain_concurrency: DomainConcurrencyLimiter::new(max_host_concurrency),
            robots: RobotsCache::new(robots_ttl, user_agent.clone()),
            max_redirects,
            user_agent,
            default_host_delay,
        })
    }

    /// Fetch `url`, following redirects manually (up to `max_redirects`) so
    /// the full chain can be recorded, applying conditional-fetch headers
    /// when `etag`/`last_modified` are known from a prior fetch.
    pub async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchOutcome, FetchError> {
        let host = super::extract_host(url)?;

        if !self.circuit_breaker.should_attempt(&host) {
            return Err(FetchError::CircuitOpen(host));
        }

        self.ensure_robots_fresh(&host).await?;
        let path = url::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string());
        if !self.robots.is_permitted(&host, &path) {
            return Err(FetchError::RobotsBlocked);
        }

        let _permit = self.domain_concurrency.acquire(&host).await;
        self.wait_for_rate_limit(&host).await;

        let request_started_at = Utc::now();
        let overall_start = Instant::now();

        let result = self
            .follow_redirects(url, etag, last_modified, request_started_at, overall_start)
            .await;

        match &result {
            Ok(outcome) if outcome.http_status < 500 && outcome.http_status != 429 => {
                self.circuit_breaker.record_success(&host);
                self.rate_limiter.reset_429_streak(&host);
            }
            Ok(outcome) => {
                self.circuit_breaker
                    .record_failure(&host, &format!("HTTP {}", outcome.http_status));
            }
            Err(FetchError::RateLimited { retry_after }) => {
                let floor = self.rate_limiter.record_429(&host, self.default_host_delay);
                self.rate_limiter
                    .apply_retry_after(&host, (*retry_after).max(floor));
                self.circuit_breaker.record_failure(&host, "HTTP 429");
            }
            Err(err) => {
                self.circuit_breaker.record_failure(&host, &err.to_string());
            }
        }

        result
    }

    async fn follow_redirects(
        &self,
        start_url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
        request_started_at: chrono::DateTime<Utc>,
        overall_start: Instant,
    ) -> Result<FetchOutcome, FetchError> {
        let mut current_url = start_url.to_string();
        let mut chain = Vec::new();

        for _ in 0..=self.max_redirects {
            let ttfb_start = Instant::now();
            let mut req = self.http.get(&current_url).header("User-Agent", &self.user_agent);
            if let Some(etag) = etag {
                req = req.header("If-None-Match", etag);
            }
            if let Some(last_modified) = last_modified {
                req = req.header("If-Modified-Since", last_modified);
            }

            let response = req.send().await?;
            let ttfb_ms = ttfb_start.elapsed().as_millis() as u64;
            let status = response.status();

            if status.is_redirection() {
                if let Some(location) = response.headers().get(reqwest::header::LOCATION) {
                    chain.push(current_url.clone());
                    current_url = resolve_redirect(&current_url, location.to_str().unwrap_or(""));
                    continue;
                }
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = parse_retry_after(response.headers());
                return Err(FetchError::RateLimited {
                    retry_after: retry_after.unwrap_or(Duration::from_secs(60)),
                });
            }

            if status.is_server_error() {
                return Err(FetchError::ServerError(status.as_u16()));
            }
            if status.is_client_error() && status != StatusCode::NOT_FOUND {
                return Err(FetchError::ClientError(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let content_encoding = response
                .headers()
                .get(reqwest::header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let response_etag = response
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let response_last_modified = response
                .headers()
                .get(reqwest::header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let download_start = Instant::now();
            let final_url = response.url().to_string();
            let body = if status == StatusCode::NOT_MODIFIED {
                Vec::new()
            } else {
                response.bytes().await?.to_vec()
            };
            let download_ms = download_start.elapsed().as_millis() as u64;

            return Ok(FetchOutcome {
                final_url,
                http_status: status.as_u16(),
                content_type,
                content_encoding,
                etag: response_etag,
                last_modified: response_last_modified,
                redirect_chain: chain,
                body,
                request_started_at,
                fetched_at: Utc::now(),
                ttfb_ms,
                download_ms,
                total_ms: overall_start.elapsed().as_millis() as u64,
            });
        }

        Err(FetchError::TooManyRedirects(self.max_redirects))
    }

    async fn ensure_robots_fresh(&self, host: &str) -> Result<(), FetchError> {
        if !self.robots.needs_refresh(host) {
            return Ok(());
        }
        let robots_url = format!("https://{host}/robots.txt");
        match self.http.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => {
                let body = response.text().await.unwrap_or_default();
                self.robots.ingest(host, &body);
            }
            _ => self.robots.ingest_absent(host),
        }
        Ok(())
    }

    async fn wait_for_rate_limit(&self, host: &str) {
        loop {
            match self.rate_limiter.check(host) {
                RateLimitDecision::Allow => return,
                RateLimitDecision::Deny { retry_after } => {
                    tokio::time::sleep(retry_after.min(Duration::from_secs(30))).await;
                }
            }
        }
    }
}

fn resolve_redirect(base: &str, location: &str) -> String {
    url::Url::parse(base)
        .and_then(|b| b.join(location))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| location.to_string())
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}
