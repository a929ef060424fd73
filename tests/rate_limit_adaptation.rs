//! End-to-end 429 adaptation scenario (spec.md §8 scenario 2): a host
//! returning 429 with `Retry-After: 2` delays the next fetch by at least
//! 2000ms, and after 3 consecutive 429s the host delay reaches the
//! exponential floor `min(2^3 * defaultHostDelayMs, 60000)`.

use std::time::Duration;

use newsgraph_crawler::fetch::{HostRateLimiter, RateLimitDecision};

#[test]
fn retry_after_header_delays_the_next_fetch() {
    let limiter = HostRateLimiter::new(10.0);
    let floor = limiter.record_429("h.example", Duration::from_millis(500));
    limiter.apply_retry_after("h.example", Duration::from_secs(2).max(floor));

    assert!(matches!(
        limiter.check("h.example"),
        RateLimitDecision::Deny { .. }
    ));
}

#[test]
fn three_consecutive_429s_reach_exponential_floor() {
    let limiter = HostRateLimiter::new(10.0);
    let default_host_delay = Duration::from_millis(500);

    let mut last = Duration::ZERO;
    for _ in 0..3 {
        last = limiter.record_429("h.example", default_host_delay);
    }

    assert_eq!(last, Duration::from_millis(2u64.pow(3) * 500));
}

#[test]
fn success_resets_the_429_streak() {
    let limiter = HostRateLimiter::new(10.0);
    let default_host_delay = Duration::from_millis(500);
    limiter.record_429("h.example", default_host_delay);
    limiter.record_429("h.example", default_host_delay);
    limiter.reset_429_streak("h.example");

    let first_after_reset = limiter.record_429("h.example", default_host_delay);
    assert_eq!(first_after_reset, Duration::from_millis(1_000));
}
