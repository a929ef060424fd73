//! Host-aware fetch pipeline: admission control, rate limiting, circuit
//! breaking, robots.txt compliance, and the HTTP client itself.
//!
//! Grounded on the teacher's `crawl_engine` module: `rate_limiter.rs`
//! (per-host token bucket, reworked for stable Rust), `circuit_breaker.rs`
//! (three-state domain health, kept almost verbatim — it was already
//! domain-generic), and `domain_limiter.rs` (per-host concurrency
//! semaphores).

mod circuit_breaker;
mod client;
mod domain_concurrency;
mod error;
mod rate_analyzer;
mod rate_limiter;
mod robots;

pub use circuit_breaker::{CircuitBreaker, CircuitState, DomainHealth};
pub use client::{FetchClient, FetchOutcome};
pub use domain_concurrency::DomainConcurrencyLimiter;
pub use error::FetchError;
pub use rate_analyzer::{HostRateSample, RateLimitAnalyzer};
pub use rate_limiter::{HostRateLimiter, RateLimitDecision};
pub use robots::RobotsCache;

/// Extract the host from a URL string.
pub fn extract_host(url_str: &str) -> Result<String, FetchError> {
    url::Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .ok_or_else(|| FetchError::InvalidUrl(url_str.to_string()))
}
