//! Crate-wide configuration.
//!
//! `CrawlerConfig` collects every tunable named in spec.md §6. A CLI or
//! service collaborator is expected to parse its own flags/env and call
//! [`CrawlerConfigBuilder`] to produce a validated, normalized config; no
//! flag-parsing crate is pulled in here (that concern is out of scope, see
//! SPEC_FULL.md §1).

use std::path::{Path, PathBuf};
use std::time::Duration;

mod defaults;
pub use defaults::*;

/// Validated, immutable crawler configuration.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub(crate) database_path: PathBuf,
    pub(crate) storage_dir: PathBuf,
    pub(crate) gazetteer_path: Option<PathBuf>,
    pub(crate) user_agent: String,

    pub(crate) max_global_concurrency: usize,
    pub(crate) max_host_concurrency: usize,
    pub(crate) default_host_delay: Duration,
    pub(crate) retry_budget: u32,
    pub(crate) backoff_base: Duration,
    pub(crate) backoff_max: Duration,

    pub(crate) connect_timeout: Duration,
    pub(crate) total_timeout: Duration,
    pub(crate) max_redirects: u8,

    pub(crate) inline_storage_threshold_bytes: usize,
    pub(crate) bucket_max_entries: u64,
    pub(crate) bucket_max_bytes: u64,
    pub(crate) compression_type: String,

    pub(crate) queue_window_size: usize,

    pub(crate) robots_ttl: Duration,

    pub(crate) circuit_breaker_failure_threshold: u32,
    pub(crate) circuit_breaker_success_threshold: u32,
    pub(crate) circuit_breaker_half_open_timeout: Duration,
}

impl CrawlerConfig {
    #[must_use]
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::default()
    }

    #[must_use]
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    #[must_use]
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    #[must_use]
    pub fn gazetteer_path(&self) -> Option<&Path> {
        self.gazetteer_path.as_deref()
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn max_global_concurrency(&self) -> usize {
        self.max_global_concurrency
    }

    #[must_use]
    pub fn max_host_concurrency(&self) -> usize {
        self.max_host_concurrency
    }

    #[must_use]
    pub fn default_host_delay(&self) -> Duration {
        self.default_host_delay
    }

    #[must_use]
    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn total_timeout(&self) -> Duration {
        self.total_timeout
    }

    #[must_use]
    pub fn max_redirects(&self) -> u8 {
        self.max_redirects
    }

    #[must_use]
    pub fn inline_storage_threshold_bytes(&self) -> usize {
        self.inline_storage_threshold_bytes
    }

    #[must_use]
    pub fn bucket_max_entries(&self) -> u64 {
        self.bucket_max_entries
    }

    #[must_use]
    pub fn bucket_max_bytes(&self) -> u64 {
        self.bucket_max_bytes
    }

    #[must_use]
    pub fn compression_type(&self) -> &str {
        &self.compression_type
    }

    #[must_use]
    pub fn queue_window_size(&self) -> usize {
        self.queue_window_size
    }

    #[must_use]
    pub fn robots_ttl(&self) -> Duration {
        self.robots_ttl
    }

    #[must_use]
    pub fn circuit_breaker_failure_threshold(&self) -> u32 {
        self.circuit_breaker_failure_threshold
    }

    #[must_use]
    pub fn circuit_breaker_success_threshold(&self) -> u32 {
        self.circuit_breaker_success_threshold
    }

    #[must_use]
    pub fn circuit_breaker_half_open_timeout(&self) -> Duration {
        self.circuit_breaker_half_open_timeout
    }
}

/// Fallible builder for [`CrawlerConfig`].
///
/// Mirrors the teacher's `CrawlConfigBuilder` (`config/builder.rs`) but
/// without the typestate machinery: this crate has one genuinely required
/// field (`database_path`), so a plain `build()` returning `Result` is
/// simpler without losing safety.
#[derive(Debug, Clone)]
pub struct CrawlerConfigBuilder {
    database_path: Option<PathBuf>,
    storage_dir: Option<PathBuf>,
    gazetteer_path: Option<PathBuf>,
    user_agent: String,
    max_global_concurrency: usize,
    max_host_concurrency: usize,
    default_host_delay_ms: u64,
    retry_budget: u32,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
    connect_timeout_secs: u64,
    total_timeout_secs: u64,
    max_redirects: u8,
    inline_storage_threshold_bytes: usize,
    bucket_max_entries: u64,
    bucket_max_bytes: u64,
    compression_type: String,
    queue_window_size: usize,
    robots_ttl_secs: u64,
    circuit_breaker_failure_threshold: u32,
    circuit_breaker_success_threshold: u32,
    circuit_breaker_half_open_timeout_secs: u64,
}

impl Default for CrawlerConfigBuilder {
    fn default() -> Self {
        Self {
            database_path: None,
            storage_dir: None,
            gazetteer_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_global_concurrency: DEFAULT_MAX_GLOBAL_CONCURRENCY,
            max_host_concurrency: DEFAULT_MAX_HOST_CONCURRENCY,
            default_host_delay_ms: DEFAULT_HOST_DELAY_MS,
            retry_budget: DEFAULT_RETRY_BUDGET,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            connect_timeout_secs: 10,
            total_timeout_secs: 30,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            inline_storage_threshold_bytes: DEFAULT_INLINE_THRESHOLD_BYTES,
            bucket_max_entries: DEFAULT_BUCKET_MAX_ENTRIES,
            bucket_max_bytes: DEFAULT_BUCKET_MAX_BYTES,
            compression_type: "zstd".to_string(),
            queue_window_size: DEFAULT_QUEUE_WINDOW_SIZE,
            robots_ttl_secs: DEFAULT_ROBOTS_TTL_SECS,
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_success_threshold: 2,
            circuit_breaker_half_open_timeout_secs: 300,
        }
    }
}

impl CrawlerConfigBuilder {
    #[must_use]
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn storage_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn gazetteer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.gazetteer_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    #[must_use]
    pub fn max_global_concurrency(mut self, n: usize) -> Self {
        self.max_global_concurrency = n;
        self
    }

    #[must_use]
    pub fn max_host_concurrency(mut self, n: usize) -> Self {
        self.max_host_concurrency = n;
        self
    }

    #[must_use]
    pub fn default_host_delay_ms(mut self, ms: u64) -> Self {
        self.default_host_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn retry_budget(mut self, n: u32) -> Self {
        self.retry_budget = n;
        self
    }

    #[must_use]
    pub fn backoff_bounds_ms(mut self, base: u64, max: u64) -> Self {
        self.backoff_base_ms = base;
        self.backoff_max_ms = max;
        self
    }

    #[must_use]
    pub fn inline_storage_threshold_bytes(mut self, n: usize) -> Self {
        self.inline_storage_threshold_bytes = n;
        self
    }

    #[must_use]
    pub fn bucket_limits(mut self, max_entries: u64, max_bytes: u64) -> Self {
        self.bucket_max_entries = max_entries;
        self.bucket_max_bytes = max_bytes;
        self
    }

    #[must_use]
    pub fn compression_type(mut self, name: impl Into<String>) -> Self {
        self.compression_type = name.into();
        self
    }

    #[must_use]
    pub fn queue_window_size(mut self, n: usize) -> Self {
        self.queue_window_size = n;
        self
    }

    #[must_use]
    pub fn robots_ttl_secs(mut self, secs: u64) -> Self {
        self.robots_ttl_secs = secs;
        self
    }

    /// Validate and normalize into an immutable [`CrawlerConfig`].
    ///
    /// # Errors
    /// Returns an error if `database_path` is unset or if any numeric
    /// tunable is out of its valid range.
    pub fn build(self) -> anyhow::Result<CrawlerConfig> {
        let database_path = self
            .database_path
            .ok_or_else(|| anyhow::anyhow!("database_path is required"))?;
        let database_path = normalize_absolute(&database_path)?;

        let storage_dir = match self.storage_dir {
            Some(dir) => normalize_absolute(&dir)?,
            None => database_path
                .parent()
                .map(|p| p.join("content"))
                .unwrap_or_else(|| PathBuf::from("content")),
        };

        if self.max_global_concurrency == 0 {
            anyhow::bail!("max_global_concurrency must be >= 1");
        }
        if self.max_host_concurrency == 0 {
            anyhow::bail!("max_host_concurrency must be >= 1");
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            anyhow::bail!("backoff_base_ms must be <= backoff_max_ms");
        }

        Ok(CrawlerConfig {
            database_path,
            storage_dir,
            gazetteer_path: self.gazetteer_path,
            user_agent: self.user_agent,
            max_global_concurrency: self.max_global_concurrency,
            max_host_concurrency: self.max_host_concurrency,
            default_host_delay: Duration::from_millis(self.default_host_delay_ms),
            retry_budget: self.retry_budget,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            total_timeout: Duration::from_secs(self.total_timeout_secs),
            max_redirects: self.max_redirects,
            inline_storage_threshold_bytes: self.inline_storage_threshold_bytes,
            bucket_max_entries: self.bucket_max_entries,
            bucket_max_bytes: self.bucket_max_bytes,
            compression_type: self.compression_type,
            queue_window_size: self.queue_window_size,
            robots_ttl: Duration::from_secs(self.robots_ttl_secs),
            circuit_breaker_failure_threshold: self.circuit_breaker_failure_threshold,
            circuit_breaker_success_threshold: self.circuit_breaker_success_threshold,
            circuit_breaker_half_open_timeout: Duration::from_secs(
                self.circuit_breaker_half_open_timeout_secs,
            ),
        })
    }
}

/// Make a path absolute without requiring it to exist yet.
///
/// **INVARIANT:** downstream modules (storage bucket paths, sqlx connection
/// strings) assume `CrawlerConfig` paths are always absolute.
fn normalize_absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_database_path() {
        let err = CrawlerConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("database_path"));
    }

    #[test]
    fn builder_normalizes_relative_storage_dir() {
        let cfg = CrawlerConfig::builder()
            .database_path("crawl.db")
            .storage_dir("content")
            .build()
            .unwrap();
        assert!(cfg.database_path().is_absolute());
        assert!(cfg.storage_dir().is_absolute());
    }

    #[test]
    fn builder_rejects_inverted_backoff_bounds() {
        let err = CrawlerConfig::builder()
            .database_path("crawl.db")
            .backoff_bounds_ms(1000, 500)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("backoff_base_ms"));
    }
}
