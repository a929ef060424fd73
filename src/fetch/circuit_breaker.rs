//! Three-state circuit breaker for per-host failure detection.
//!
//! Kept close to the teacher's `crawl_engine::circuit_breaker` — that module
//! was already host/domain-generic and needed no domain-specific rework,
//! only the module path and a couple of doc-comment tweaks.

use dashmap::DashMap;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

#[derive(Debug, Clone)]
pub struct DomainHealth {
    pub consecutive_failures: u32,
    pub total_attempts: u32,
    pub total_successes: u32,
    pub last_success: Option<Instant>,
    pub last_opened: Option<Instant>,
    pub consecutive_successes_in_halfopen: u32,
    pub state: CircuitState,
}

impl DomainHealth {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            total_attempts: 0,
            total_successes: 0,
            last_success: None,
            last_opened: None,
            consecutive_successes_in_halfopen: 0,
            state: CircuitState::Closed,
        }
    }
}

/// Tracks per-host health independently of the rate limiter's pacing
/// decisions; a host can be within its rate budget and still circuit-open
/// after consecutive failures.
pub struct CircuitBreaker {
    hosts: DashMap<String, DomainHealth>,
    failure_threshold: u32,
    success_threshold: u32,
    half_open_timeout: Duration,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(failure_threshold: u32, success_threshold: u32, half_open_timeout: Duration) -> Self {
        Self {
            hosts: DashMap::new(),
            failure_threshold,
            success_threshold,
            half_open_timeout,
        }
    }

    pub fn should_attempt(&self, host: &str) -> bool {
        let mut health = self.hosts.entry(host.to_string()).or_insert_with(DomainHealth::new);

        match health.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if let Some(opened) = health.last_opened {
                    if opened.elapsed() >= self.half_open_timeout {
                        health.state = CircuitState::HalfOpen;
                        health.consecutive_successes_in_halfopen = 0;
                        info!(
                            "circuit breaker transitioning to half-open for host {} after {:?}",
                            host,
                            opened.elapsed()
                        );
                        return true;
                    }
                } else {
                    debug!("circuit breaker open with no timestamp for host {host}, staying open");
                }
                false
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self, host: &str) {
        if let Some(mut health) = self.hosts.get_mut(host) {
            health.consecutive_failures = 0;
            health.total_successes += 1;
            health.total_attempts += 1;
            health.last_success = Some(Instant::now());

            if health.state == CircuitState::HalfOpen {
                health.consecutive_successes_in_halfopen += 1;
                if health.consecutive_successes_in_halfopen >= self.success_threshold {
                    health.state = CircuitState::Closed;
                    info!("circuit breaker closed for host {host}");
                }
            }
        }
    }

    pub fn record_failure(&self, host: &str, error: &str) {
        let mut health = self.hosts.entry(host.to_string()).or_insert_with(DomainHealth::new);

        health.consecutive_failures += 1;
        health.total_attempts += 1;

        if health.consecutive_failures >= self.failure_threshold && health.state != CircuitState::Open {
            health.state = CircuitState::Open;
            health.last_opened = Some(Instant::now());
            health.consecutive_successes_in_halfopen = 0;
            warn!(
                "circuit breaker open for host {} after {} consecutive failures: {}",
                host, health.consecutive_failures, error
            );
        }
    }

    #[must_use]
    pub fn get_health(&self, host: &str) -> Option<DomainHealth> {
        self.hosts.get(host).map(|r| r.value().clone())
    }

    #[must_use]
    pub fn open_hosts(&self) -> Vec<String> {
        self.hosts
            .iter()
            .filter(|entry| entry.value().state == CircuitState::Open)
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_allows_and_tracks_success() {
        let cb = CircuitBreaker::new(3, 2, Duration::from_secs(60));
        assert!(cb.should_attempt("news.example.com"));
        cb.record_success("news.example.com");
        let health = cb.get_health("news.example.com").unwrap();
        assert_eq!(health.state, CircuitState::Closed);
        assert_eq!(health.total_successes, 1);
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = CircuitBreaker::new(3, 2, Duration::from_secs(60));
        cb.record_failure("flaky.example.com", "timeout");
        cb.record_failure("flaky.example.com", "timeout");
        cb.record_failure("flaky.example.com", "timeout");

        let health = cb.get_health("flaky.example.com").unwrap();
        assert_eq!(health.state, CircuitState::Open);
        assert!(!cb.should_attempt("flaky.example.com"));
    }

    #[test]
    fn half_opens_after_timeout() {
        let cb = CircuitBreaker::new(2, 1, Duration::from_millis(50));
        cb.record_failure("slow.example.com", "503");
        cb.record_failure("slow.example.com", "503");
        assert_eq!(cb.get_health("slow.example.com").unwrap().state, CircuitState::Open);

        std::thread::sleep(Duration::from_millis(80));
        assert!(cb.should_attempt("slow.example.com"));
        assert_eq!(cb.get_health("slow.example.com").unwrap().state, CircuitState::HalfOpen);
    }
}
