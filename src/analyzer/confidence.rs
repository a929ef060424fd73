//! Extraction confidence scoring, spec.md §4.5 step 5.

use super::dom::ExtractedContent;

const IDEAL_WORD_COUNT: f64 = 500.0;
const MAX_WORD_COUNT: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationTier {
    Accept,
    AcceptWithCaution,
    ReviewNeeded,
    HumanReviewRequired,
}

impl RecommendationTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationTier::Accept => "accept",
            RecommendationTier::AcceptWithCaution => "accept_with_caution",
            RecommendationTier::ReviewNeeded => "review_needed",
            RecommendationTier::HumanReviewRequired => "human_review_required",
        }
    }

    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            RecommendationTier::Accept
        } else if score >= 0.6 {
            RecommendationTier::AcceptWithCaution
        } else if score >= 0.3 {
            RecommendationTier::ReviewNeeded
        } else {
            RecommendationTier::HumanReviewRequired
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScore {
    pub title_quality: f64,
    pub word_count_fit: f64,
    pub metadata_completeness: f64,
    pub readability: f64,
    pub visual: f64,
    pub overall: f64,
    pub recommendation: RecommendationTier,
}

/// Weighted-average confidence score. Visual signals default to 0 — this
/// crate never renders a page, so that 0.15 weight is always spent.
#[must_use]
pub fn score(extracted: &ExtractedContent, visual_signal: Option<f64>) -> ConfidenceScore {
    let title_quality = title_quality_score(extracted.title.as_deref());
    let word_count_fit = word_count_score(extracted.word_count);
    let metadata_completeness = metadata_score(extracted);
    let readability = readability_score(extracted);
    let visual = visual_signal.unwrap_or(0.0).clamp(0.0, 1.0);

    let overall = title_quality * 0.15
        + word_count_fit * 0.25
        + metadata_completeness * 0.20
        + readability * 0.25
        + visual * 0.15;

    ConfidenceScore {
        title_quality,
        word_count_fit,
        metadata_completeness,
        readability,
        visual,
        overall,
        recommendation: RecommendationTier::from_score(overall),
    }
}

fn title_quality_score(title: Option<&str>) -> f64 {
    match title {
        None => 0.0,
        Some(t) => {
            let len = t.trim().chars().count();
            if len == 0 {
                0.0
            } else if len < 10 {
                0.4
            } else if len <= 120 {
                1.0
            } else {
                0.6
            }
        }
    }
}

fn word_count_score(word_count: usize) -> f64 {
    let wc = (word_count as f64).min(MAX_WORD_COUNT);
    if wc <= 0.0 {
        return 0.0;
    }
    let distance = (wc - IDEAL_WORD_COUNT).abs() / IDEAL_WORD_COUNT;
    (1.0 - distance).clamp(0.0, 1.0)
}

fn metadata_score(extracted: &ExtractedContent) -> f64 {
    let mut have = 0.0;
    let mut total = 0.0;

    total += 2.0;
    if extracted.published_at.is_some() {
        have += 2.0;
    }
    total += 1.0;
    if extracted.byline.is_some() {
        have += 1.0;
    }
    total += 1.0;
    if extracted.excerpt.is_some() {
        have += 1.0;
    }

    have / total
}

fn readability_score(extracted: &ExtractedContent) -> f64 {
    let paragraph_count = extracted.primary_text.matches("\n\n").count() + 1;
    let has_structure = paragraph_count >= 2;
    let has_body = !extracted.primary_text.trim().is_empty();
    match (has_body, has_structure) {
        (true, true) => 1.0,
        (true, false) => 0.5,
        (false, _) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(word_count: usize, title: Option<&str>, published_at: Option<&str>) -> ExtractedContent {
        ExtractedContent {
            title: title.map(str::to_string),
            byline: None,
            excerpt: None,
            primary_text: "para one.\n\npara two.".to_string(),
            published_at: published_at.map(str::to_string),
            word_count,
        }
    }

    #[test]
    fn ideal_word_count_scores_highly() {
        let extracted = content(500, Some("A Reasonable Headline"), Some("2024-01-01"));
        let s = score(&extracted, None);
        assert!(s.word_count_fit > 0.99);
        assert_eq!(s.recommendation, RecommendationTier::AcceptWithCaution);
    }

    #[test]
    fn missing_everything_is_human_review_required() {
        let extracted = ExtractedContent::default();
        let s = score(&extracted, None);
        assert_eq!(s.recommendation, RecommendationTier::HumanReviewRequired);
    }
}
