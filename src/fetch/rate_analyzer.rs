//! Rate-Limit Analyzer: periodically derives a per-host target rate from
//! recent `http_responses`, feeding it back into [`super::HostRateLimiter`]
//! per spec.md §4.3's "Rate-Limit Analyzer (companion)".

use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use super::rate_limiter::HostRateLimiter;

#[derive(Debug, Clone, Copy)]
pub struct HostRateSample {
    pub requests_per_minute: f64,
    pub error_rate: f64,
}

pub struct RateLimitAnalyzer {
    pool: SqlitePool,
    rate_limiter: Arc<HostRateLimiter>,
    window_secs: i64,
}

impl RateLimitAnalyzer {
    #[must_use]
    pub fn new(pool: SqlitePool, rate_limiter: Arc<HostRateLimiter>, window_secs: i64) -> Self {
        Self {
            pool,
            rate_limiter,
            window_secs,
        }
    }

    /// Query recent responses grouped by host, compute `requests_per_minute`
    /// and `error_rate`, and adjust each host's long-term target rate.
    /// Hosts with an elevated error rate get their target halved rather
    /// than raised, so adaptation never fights the circuit breaker.
    pub async fn sweep(&self) -> Result<Vec<(String, HostRateSample)>, sqlx::Error> {
        let since = chrono::Utc::now().timestamp() - self.window_secs;
        let rows = sqlx::query(
            "SELECT u.host AS host, \
                    COUNT(*) AS total, \
                    SUM(CASE WHEN hr.http_status >= 400 THEN 1 ELSE 0 END) AS errors \
             FROM http_responses hr \
             JOIN urls u ON u.id = hr.url_id \
             WHERE hr.fetched_at >= ?1 \
             GROUP BY u.host",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut samples = Vec::with_capacity(rows.len());
        for row in rows {
            let host: String = row.get("host");
            let total: i64 = row.get("total");
            let errors: i64 = row.get("errors");

            let minutes = (self.window_secs as f64 / 60.0).max(1.0);
            let requests_per_minute = total as f64 / minutes;
            let error_rate = if total > 0 { errors as f64 / total as f64 } else { 0.0 };

            let current_rate = requests_per_minute / 60.0;
            let target_rate = if error_rate > 0.2 {
                (current_rate * 0.5).max(0.05)
            } else {
                current_rate.max(0.1)
            };
            self.rate_limiter.set_target_rate(&host, target_rate);

            samples.push((
                host,
                HostRateSample {
                    requests_per_minute,
                    error_rate,
                },
            ));
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn sweep_lowers_target_for_error_prone_host() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open(&dir.path().join("crawl.db")).await.unwrap();

        sqlx::query("INSERT INTO urls (url, host, created_at, last_seen_at) VALUES ('https://bad.example/a', 'bad.example', 0, 0)")
            .execute(&pool)
            .await
            .unwrap();
        let url_id: i64 = sqlx::query("SELECT id FROM urls WHERE url = 'https://bad.example/a'")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("id");

        let now = chrono::Utc::now().timestamp();
        for status in [500, 500, 500, 200] {
            sqlx::query(
                "INSERT INTO http_responses (url_id, request_started_at, fetched_at, http_status) \
                 VALUES (?1, ?2, ?2, ?3)",
            )
            .bind(url_id)
            .bind(now)
            .bind(status)
            .execute(&pool)
            .await
            .unwrap();
        }

        let rate_limiter = Arc::new(HostRateLimiter::new(10.0));
        let analyzer = RateLimitAnalyzer::new(pool, rate_limiter.clone(), 3600);
        let samples = analyzer.sweep().await.unwrap();
        let (_, sample) = samples.iter().find(|(h, _)| h == "bad.example").unwrap();
        assert!(sample.error_rate > 0.5);
    }
}
