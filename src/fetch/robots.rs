//! robots.txt fetching, parsing, and per-host TTL caching.
//!
//! No crate in the teacher's stack or the example pack owns robots.txt
//! parsing; this is built fresh in the crate's idiom (DashMap cache keyed
//! by host, mirroring [`super::circuit_breaker::CircuitBreaker`]'s shape).

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone)]
struct RobotsRules {
    disallow: Vec<String>,
    allow: Vec<String>,
    fetched_at: Instant,
}

/// Parses a robots.txt body for the rule group matching `user_agent`
/// (falling back to `*`).
fn parse(body: &str, user_agent: &str) -> RobotsRules {
    let mut current_group_matches = false;
    let mut star_group_matches = false;
    let mut disallow = Vec::new();
    let mut allow = Vec::new();
    let mut star_disallow = Vec::new();
    let mut star_allow = Vec::new();

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                let ua = value.to_ascii_lowercase();
                if ua == "*" {
                    star_group_matches = true;
                    current_group_matches = false;
                } else if user_agent.to_ascii_lowercase().contains(&ua) {
                    current_group_matches = true;
                } else {
                    current_group_matches = false;
                    if ua != "*" {
                        star_group_matches = false;
                    }
                }
            }
            "disallow" if !value.is_empty() => {
                if current_group_matches {
                    disallow.push(value.to_string());
                } else if star_group_matches {
                    star_disallow.push(value.to_string());
                }
            }
            "allow" if !value.is_empty() => {
                if current_group_matches {
                    allow.push(value.to_string());
                } else if star_group_matches {
                    star_allow.push(value.to_string());
                }
            }
            _ => {}
        }
    }

    if disallow.is_empty() && allow.is_empty() {
        disallow = star_disallow;
        allow = star_allow;
    }

    RobotsRules {
        disallow,
        allow,
        fetched_at: Instant::now(),
    }
}

impl RobotsRules {
    fn permits(&self, path: &str) -> bool {
        let longest_allow = self
            .allow
            .iter()
            .filter(|p| path.starts_with(p.as_str()))
            .map(String::len)
            .max();
        let longest_disallow = self
            .disallow
            .iter()
            .filter(|p| path.starts_with(p.as_str()))
            .map(String::len)
            .max();

        match (longest_allow, longest_disallow) {
            (Some(a), Some(d)) => a >= d,
            (None, Some(_)) => false,
            _ => true,
        }
    }
}

/// Per-host cache of parsed robots.txt, with a configurable TTL.
pub struct RobotsCache {
    cache: DashMap<String, RobotsRules>,
    ttl: Duration,
    user_agent: String,
}

impl RobotsCache {
    #[must_use]
    pub fn new(ttl: Duration, user_agent: String) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
            user_agent,
        }
    }

    /// Record a freshly fetched robots.txt body for `host`.
    pub fn ingest(&self, host: &str, body: &str) {
        self.cache.insert(host.to_string(), parse(body, &self.user_agent));
    }

    /// Record that `host` has no robots.txt (404/empty): permit everything.
    pub fn ingest_absent(&self, host: &str) {
        self.cache.insert(
            host.to_string(),
            RobotsRules {
                disallow: Vec::new(),
                allow: Vec::new(),
                fetched_at: Instant::now(),
            },
        );
    }

    /// Whether `host`'s cached robots.txt needs refreshing.
    #[must_use]
    pub fn needs_refresh(&self, host: &str) -> bool {
        match self.cache.get(host) {
            Some(rules) => rules.fetched_at.elapsed() >= self.ttl,
            None => true,
        }
    }

    /// Whether `path` on `host` is permitted. Defaults to permitted if the
    /// host has not been cached yet (caller is expected to fetch first).
    #[must_use]
    pub fn is_permitted(&self, host: &str, path: &str) -> bool {
        self.cache.get(host).is_none_or(|rules| rules.permits(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallow_all_blocks_everything() {
        let cache = RobotsCache::new(Duration::from_secs(3600), "newsgraph-crawler".to_string());
        cache.ingest("example.com", "User-agent: *\nDisallow: /\n");
        assert!(!cache.is_permitted("example.com", "/articles/1"));
    }

    #[test]
    fn more_specific_allow_overrides_disallow() {
        let cache = RobotsCache::new(Duration::from_secs(3600), "newsgraph-crawler".to_string());
        cache.ingest(
            "example.com",
            "User-agent: *\nDisallow: /private/\nAllow: /private/public-page\n",
        );
        assert!(cache.is_permitted("example.com", "/private/public-page"));
        assert!(!cache.is_permitted("example.com", "/private/secret"));
    }

    #[test]
    fn absent_robots_permits_everything() {
        let cache = RobotsCache::new(Duration::from_secs(3600), "newsgraph-crawler".to_string());
        cache.ingest_absent("open.example.com");
        assert!(cache.is_permitted("open.example.com", "/anything"));
    }

    #[test]
    fn uncached_host_needs_refresh() {
        let cache = RobotsCache::new(Duration::from_secs(3600), "newsgraph-crawler".to_string());
        assert!(cache.needs_refresh("never-seen.example.com"));
    }
}
