//! Per-host concurrency limiting, adapted from the teacher's
//! `crawl_engine::domain_limiter::DomainLimiter`.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct DomainConcurrencyLimiter {
    semaphores: DashMap<String, Arc<Semaphore>>,
    max_per_host: usize,
}

impl DomainConcurrencyLimiter {
    #[must_use]
    pub fn new(max_per_host: usize) -> Self {
        Self {
            semaphores: DashMap::new(),
            max_per_host,
        }
    }

    /// Acquire a permit for `host`, lazily creating its semaphore.
    pub async fn acquire(&self, host: &str) -> OwnedSemaphorePermit {
        let semaphore = self
            .semaphores
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_host)))
            .clone();

        semaphore
            .acquire_owned()
            .await
            .expect("semaphore is never closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_permit_blocks_until_first_drops() {
        let limiter = DomainConcurrencyLimiter::new(1);
        let first = limiter.acquire("example.com").await;

        let limiter2 = &limiter;
        let second = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            limiter2.acquire("example.com"),
        )
        .await;
        assert!(second.is_err());

        drop(first);
        let second = limiter.acquire("example.com").await;
        drop(second);
    }
}
