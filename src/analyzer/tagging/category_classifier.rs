//! Rule-based category classification, spec.md §4.5.1.

const PRIMARY_WEIGHT: f64 = 2.0;
const SECONDARY_WEIGHT: f64 = 1.0;
const TITLE_MULTIPLIER: f64 = 3.0;
const SECONDARY_GAP: f64 = 0.5;
const MIN_CONFIDENCE: f64 = 0.1;

struct CategoryKeywords {
    name: &'static str,
    primary: &'static [&'static str],
    secondary: &'static [&'static str],
}

const CATEGORIES: &[CategoryKeywords] = &[
    CategoryKeywords {
        name: "Politics",
        primary: &["election", "senate", "congress", "president", "parliament", "legislation"],
        secondary: &["policy", "government", "vote", "campaign", "minister"],
    },
    CategoryKeywords {
        name: "Technology",
        primary: &["software", "startup", "artificial intelligence", "chip", "app", "algorithm"],
        secondary: &["internet", "device", "data", "cyber", "computing"],
    },
    CategoryKeywords {
        name: "Sports",
        primary: &["championship", "tournament", "coach", "league", "goal", "playoffs"],
        secondary: &["team", "match", "score", "athlete", "season"],
    },
    CategoryKeywords {
        name: "Business",
        primary: &["earnings", "merger", "stock", "market", "revenue", "shares"],
        secondary: &["company", "economy", "investor", "trade", "bank"],
    },
    CategoryKeywords {
        name: "Entertainment",
        primary: &["film", "celebrity", "album", "box office", "premiere", "actor"],
        secondary: &["movie", "music", "show", "streaming", "award"],
    },
    CategoryKeywords {
        name: "Science",
        primary: &["research", "study", "discovery", "telescope", "species", "physics"],
        secondary: &["scientist", "climate", "laboratory", "genome", "experiment"],
    },
    CategoryKeywords {
        name: "Health",
        primary: &["vaccine", "hospital", "disease", "treatment", "outbreak", "diagnosis"],
        secondary: &["patient", "doctor", "medicine", "clinical", "wellness"],
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResult {
    pub primary: String,
    pub secondary: Option<String>,
    pub confidence: f64,
}

pub struct CategoryClassifier;

impl CategoryClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn classify(&self, title: &str, body: &str) -> CategoryResult {
        let title_lower = title.to_lowercase();
        let body_lower = body.to_lowercase();

        let mut scores: Vec<(&'static str, f64)> = CATEGORIES
            .iter()
            .map(|cat| {
                let mut score = 0.0;
                for kw in cat.primary {
                    score += count_occurrences(&body_lower, kw) as f64 * PRIMARY_WEIGHT;
                    score += count_occurrences(&title_lower, kw) as f64 * PRIMARY_WEIGHT * TITLE_MULTIPLIER;
                }
                for kw in cat.secondary {
                    score += count_occurrences(&body_lower, kw) as f64 * SECONDARY_WEIGHT;
                    score += count_occurrences(&title_lower, kw) as f64 * SECONDARY_WEIGHT * TITLE_MULTIPLIER;
                }
                (cat.name, score)
            })
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let total: f64 = scores.iter().map(|(_, s)| s).sum();
        let (top_name, top_score) = scores[0];

        if total <= 0.0 || top_score <= 0.0 {
            return CategoryResult {
                primary: "Uncategorized".to_string(),
                secondary: None,
                confidence: 0.0,
            };
        }

        let confidence = top_score / total;
        if confidence < MIN_CONFIDENCE {
            return CategoryResult {
                primary: "Uncategorized".to_string(),
                secondary: None,
                confidence,
            };
        }

        let secondary = scores.get(1).and_then(|(name, second_score)| {
            if *second_score <= 0.0 {
                return None;
            }
            let gap = 1.0 - (second_score / top_score);
            (gap < SECONDARY_GAP).then(|| (*name).to_string())
        });

        CategoryResult {
            primary: top_name.to_string(),
            secondary,
            confidence,
        }
    }
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sports_article() {
        let classifier = CategoryClassifier::new();
        let result = classifier.classify(
            "Championship Goal Seals Tournament Win",
            "The coach praised the team after a last-minute goal won the championship match.",
        );
        assert_eq!(result.primary, "Sports");
        assert!(result.confidence > MIN_CONFIDENCE);
    }

    #[test]
    fn empty_text_is_uncategorized() {
        let classifier = CategoryClassifier::new();
        let result = classifier.classify("", "");
        assert_eq!(result.primary, "Uncategorized");
    }

    #[test]
    fn ambiguous_text_yields_secondary_category() {
        let classifier = CategoryClassifier::new();
        let result = classifier.classify(
            "Tech Earnings",
            "The startup reported quarterly revenue and shares rose after strong earnings, \
             while the company's software and app updates drove usage.",
        );
        assert!(result.secondary.is_some() || result.primary == "Business" || result.primary == "Technology");
    }
}
