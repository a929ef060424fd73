//! Hub discovery: probe templated URLs for each gazetteer place and score
//! the result, spec.md §4.6.

use std::sync::OnceLock;

use regex::Regex;
use sqlx::SqlitePool;

use crate::fetch::{FetchClient, FetchError};

use super::error::PlacesError;
use super::gazetteer::url_slug;
use super::types::Place;

const DEFAULT_TEMPLATES: &[&str] = &["/world/{slug}", "/topics/{slug}", "/places/{slug}"];

const VERIFIED_THRESHOLD: f64 = 0.7;
const CANDIDATE_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubStatus {
    Verified,
    Candidate,
    Rejected,
}

impl HubStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HubStatus::Verified => "verified",
            HubStatus::Candidate => "candidate",
            HubStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HubProbeResult {
    pub url: String,
    pub title_has_place_name: bool,
    pub dated_link_count: usize,
    pub has_article_date_segment: bool,
    pub score: f64,
    pub status: HubStatus,
}

fn date_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/\d{4}/\d{2}(/\d{2})?/").unwrap())
}

fn article_date_segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/\d{4}/\d{2}/\d{2}/[^/]+$").unwrap())
}

pub struct HubDiscovery<'a> {
    client: &'a FetchClient,
    pool: SqlitePool,
    templates: Vec<&'static str>,
}

impl<'a> HubDiscovery<'a> {
    #[must_use]
    pub fn new(client: &'a FetchClient, pool: SqlitePool) -> Self {
        Self {
            client,
            pool,
            templates: DEFAULT_TEMPLATES.to_vec(),
        }
    }

    /// Probe every template URL for `place`'s preferred name on `host`,
    /// persisting a `place_hubs` row for each attempt that produced a
    /// fetchable page.
    pub async fn probe(
        &self,
        host: &str,
        place: &Place,
        preferred_name: &str,
    ) -> Result<Vec<HubProbeResult>, PlacesError> {
        let slug = url_slug(preferred_name);
        let mut results = Vec::new();

        for template in &self.templates {
            let path = template.replace("{slug}", &slug);
            let url = format!("https://{host}{path}");

            let outcome = match self.client.fetch(&url, None, None).await {
                Ok(outcome) => outcome,
                Err(FetchError::RobotsBlocked | FetchError::CircuitOpen(_)) => continue,
                Err(_) => continue,
            };

            let body = String::from_utf8_lossy(&outcome.body).to_string();
            let document = crate::analyzer::ParsedDocument::parse(&body);
            let extracted = document.extract();

            let title_has_place_name = extracted
                .title
                .as_deref()
                .map(|t| t.to_lowercase().contains(&preferred_name.to_lowercase()))
                .unwrap_or(false);
            let dated_link_count = date_link_re().find_iter(&body).count();
            let has_article_date_segment = article_date_segment_re().is_match(&url);

            let score = score_hub(title_has_place_name, dated_link_count, has_article_date_segment);
            let status = classify_score(score);

            self.persist(host, &url, &slug, &place.kind, extracted.title.as_deref(), score, status)
                .await?;

            results.push(HubProbeResult {
                url,
                title_has_place_name,
                dated_link_count,
                has_article_date_segment,
                score,
                status,
            });
        }

        Ok(results)
    }

    async fn persist(
        &self,
        host: &str,
        url: &str,
        slug: &str,
        place_kind: &str,
        title: Option<&str>,
        score: f64,
        status: HubStatus,
    ) -> Result<(), PlacesError> {
        sqlx::query(
            "INSERT INTO place_hubs (host, url, place_slug, place_kind, title, evidence, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(host)
        .bind(url)
        .bind(slug)
        .bind(place_kind)
        .bind(title)
        .bind(format!("score={score:.2}"))
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn score_hub(title_has_place_name: bool, dated_link_count: usize, has_article_date_segment: bool) -> f64 {
    let mut score = 0.0;
    if title_has_place_name {
        score += 0.5;
    }
    score += (dated_link_count.min(10) as f64 / 10.0) * 0.4;
    if !has_article_date_segment {
        score += 0.1;
    }
    score.clamp(0.0, 1.0)
}

fn classify_score(score: f64) -> HubStatus {
    if score >= VERIFIED_THRESHOLD {
        HubStatus::Verified
    } else if score >= CANDIDATE_THRESHOLD {
        HubStatus::Candidate
    } else {
        HubStatus::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_signals_score_as_verified() {
        let score = score_hub(true, 10, false);
        assert_eq!(classify_score(score), HubStatus::Verified);
    }

    #[test]
    fn weak_signals_score_as_rejected() {
        let score = score_hub(false, 0, true);
        assert_eq!(classify_score(score), HubStatus::Rejected);
    }

    #[test]
    fn article_date_segment_is_detected() {
        assert!(article_date_segment_re().is_match("https://example.com/2024/05/01/texas-flooding"));
        assert!(!article_date_segment_re().is_match("https://example.com/world/texas"));
    }
}
