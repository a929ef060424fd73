use thiserror::Error;

/// Error taxonomy per spec.md §7: transient network, rate-limited, server
/// error, client error, robots-blocked, and parse failure all surface here;
/// the caller decides retriable vs. terminal from the variant.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("transient network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: std::time::Duration },

    #[error("server error: HTTP {0}")]
    ServerError(u16),

    #[error("client error: HTTP {0}")]
    ClientError(u16),

    #[error("disallowed by robots.txt")]
    RobotsBlocked,

    #[error("circuit open for host {0}")]
    CircuitOpen(String),

    #[error("payload not decodable as HTML")]
    ParseFailure,

    #[error("too many redirects ({0})")]
    TooManyRedirects(u8),
}

impl FetchError {
    /// Whether this failure should be retried with backoff, per spec.md §7.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::RateLimited { .. } | FetchError::ServerError(_) => {
                true
            }
            FetchError::ClientError(code) => *code == 408,
            FetchError::InvalidUrl(_)
            | FetchError::RobotsBlocked
            | FetchError::CircuitOpen(_)
            | FetchError::ParseFailure
            | FetchError::TooManyRedirects(_) => false,
        }
    }
}
