//! Named default constants for [`super::CrawlerConfigBuilder`].

pub const DEFAULT_USER_AGENT: &str =
    "newsgraph-crawler/0.4 (+https://example.invalid/bot)";

pub const DEFAULT_MAX_GLOBAL_CONCURRENCY: usize = 16;
pub const DEFAULT_MAX_HOST_CONCURRENCY: usize = 2;
pub const DEFAULT_HOST_DELAY_MS: u64 = 500;
pub const DEFAULT_RETRY_BUDGET: u32 = 5;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 60_000;
pub const DEFAULT_MAX_REDIRECTS: u8 = 5;

pub const DEFAULT_INLINE_THRESHOLD_BYTES: usize = 4_096;
pub const DEFAULT_BUCKET_MAX_ENTRIES: u64 = 10_000;
pub const DEFAULT_BUCKET_MAX_BYTES: u64 = 256 * 1024 * 1024;

pub const DEFAULT_QUEUE_WINDOW_SIZE: usize = 10_000;
pub const DEFAULT_ROBOTS_TTL_SECS: u64 = 86_400;
