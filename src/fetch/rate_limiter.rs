//! Per-host token-bucket rate limiting.
//!
//! The teacher's `crawl_engine::rate_limiter` packs tokens and a refill
//! timestamp into a single `AtomicU128` for lock-free updates, which needs
//! the nightly `integer_atomics` feature. This rework keeps the same
//! per-host token-bucket math and lock granularity (one lock per host, held
//! only across the refill-then-consume arithmetic) behind a stable
//! `parking_lot::Mutex`, and adds the adaptive target-rate hook spec.md's
//! Rate-Limit Analyzer needs (§4.3): a host's rate can be lowered in
//! response to observed 429s or `Retry-After` headers without discarding
//! its accumulated token state.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitDecision {
    Allow,
    Deny { retry_after: Duration },
}

struct TokenBucketState {
    tokens: f64,
    last_refill: Instant,
    rate_per_sec: f64,
    max_tokens: f64,
}

impl TokenBucketState {
    fn new(rate_per_sec: f64) -> Self {
        let max_tokens = rate_per_sec.max(1.0);
        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            rate_per_sec,
            max_tokens,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.max_tokens);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> RateLimitDecision {
        let now = Instant::now();
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            RateLimitDecision::Allow
        } else {
            let deficit = 1.0 - self.tokens;
            let wait_secs = if self.rate_per_sec > 0.0 {
                deficit / self.rate_per_sec
            } else {
                1.0
            };
            RateLimitDecision::Deny {
                retry_after: Duration::from_secs_f64(wait_secs),
            }
        }
    }
}

/// Per-host token bucket rate limiter with an adaptive long-term target
/// rate per host.
pub struct HostRateLimiter {
    buckets: DashMap<String, Mutex<TokenBucketState>>,
    default_rate_per_sec: f64,
    consecutive_429s: DashMap<String, u32>,
}

impl HostRateLimiter {
    #[must_use]
    pub fn new(default_rate_per_sec: f64) -> Self {
        Self {
            buckets: DashMap::new(),
            default_rate_per_sec,
            consecutive_429s: DashMap::new(),
        }
    }

    /// Record a 429 response for `host` and return the minimum delay the
    /// next request to it must observe: `min(2^n * default_host_delay, 60s)`
    /// where `n` is the number of consecutive 429s including this one.
    pub fn record_429(&self, host: &str, default_host_delay: Duration) -> Duration {
        let mut count = self.consecutive_429s.entry(host.to_string()).or_insert(0);
        *count += 1;
        let exponent = (*count).min(32);
        let backoff_ms = default_host_delay
            .as_millis()
            .saturating_mul(1u128 << exponent)
            .min(60_000);
        Duration::from_millis(backoff_ms as u64)
    }

    /// Reset a host's consecutive-429 streak after a non-429 response.
    pub fn reset_429_streak(&self, host: &str) {
        self.consecutive_429s.remove(host);
    }

    /// Attempt to consume one token for `host`, lazily creating its bucket
    /// at the default rate.
    pub fn check(&self, host: &str) -> RateLimitDecision {
        let bucket = self
            .buckets
            .entry(host.to_string())
            .or_insert_with(|| Mutex::new(TokenBucketState::new(self.default_rate_per_sec)));
        let decision = bucket.lock().try_consume();
        decision
    }

    /// Lower (or raise) a host's long-term target rate, e.g. in response to
    /// a 429 or an observed error-rate spike. Preserves accumulated tokens.
    pub fn set_target_rate(&self, host: &str, rate_per_sec: f64) {
        let rate_per_sec = rate_per_sec.max(0.001);
        let bucket = self
            .buckets
            .entry(host.to_string())
            .or_insert_with(|| Mutex::new(TokenBucketState::new(rate_per_sec)));
        let mut state = bucket.lock();
        state.refill(Instant::now());
        state.rate_per_sec = rate_per_sec;
        state.max_tokens = rate_per_sec.max(1.0);
        state.tokens = state.tokens.min(state.max_tokens);
    }

    /// Apply a server-supplied `Retry-After` by putting the host's bucket
    /// into debt for that duration: `check` stays `Deny` until enough time
    /// has elapsed for the debt to refill back to zero.
    pub fn apply_retry_after(&self, host: &str, retry_after: Duration) {
        let bucket = self
            .buckets
            .entry(host.to_string())
            .or_insert_with(|| Mutex::new(TokenBucketState::new(self.default_rate_per_sec)));
        let mut state = bucket.lock();
        state.refill(Instant::now());
        let debt = state.rate_per_sec * retry_after.as_secs_f64();
        state.tokens = (state.tokens - debt).min(0.0);
    }

    #[must_use]
    pub fn tracked_hosts(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_allowed_second_denied() {
        let limiter = HostRateLimiter::new(1.0);
        assert_eq!(limiter.check("example.com"), RateLimitDecision::Allow);
        assert!(matches!(
            limiter.check("example.com"),
            RateLimitDecision::Deny { .. }
        ));
    }

    #[test]
    fn independent_hosts_do_not_share_buckets() {
        let limiter = HostRateLimiter::new(1.0);
        assert_eq!(limiter.check("a.example.com"), RateLimitDecision::Allow);
        assert_eq!(limiter.check("b.example.com"), RateLimitDecision::Allow);
    }

    #[test]
    fn set_target_rate_lowers_future_refill() {
        let limiter = HostRateLimiter::new(10.0);
        limiter.check("slow.example.com");
        limiter.set_target_rate("slow.example.com", 0.5);

        let bucket = limiter.buckets.get("slow.example.com").unwrap();
        let state = bucket.lock();
        assert!((state.rate_per_sec - 0.5).abs() < f64::EPSILON);
    }
}
