//! Context filter: reject candidate mentions that are not geographic
//! references, spec.md §4.6.
//!
//! The strong-org-suffix set intentionally excludes bare short words like
//! `co`/`tech` from triggering on their own — REDESIGN FLAG in spec.md
//! noted that a blind match over-rejects place names that happen to
//! precede an unrelated capitalized word. Those short suffixes only fire
//! when the following word is itself capitalized in the original text,
//! the same adjacent-capitalization gate `org_suffix` uses for every
//! multi-word suffix.

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use super::error::PlacesError;

const STRONG_ORG_SUFFIXES: &[&str] = &[
    "instruments", "corporation", "airlines", "industries", "motors", "pictures", "records",
    "rangers", "cowboys", "lakers", "rockets", "giants", "jets", "dynamo", "united",
];

/// Short suffixes that only count when paired with a capitalized follower.
const SHORT_ORG_SUFFIXES: &[&str] = &["co", "tech", "labs", "inc"];

const WEAK_ORG_SUFFIXES: &[&str] = &["times", "post", "herald", "tribune", "chronicle", "gazette"];

const PERSON_TITLES: &[&str] = &["mr", "mrs", "ms", "dr", "sen", "rep", "gov", "president"];

const COMMON_GIVEN_NAMES: &[&str] = &[
    "john", "james", "robert", "michael", "david", "mary", "jennifer", "linda", "maria", "susan",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    KnownPattern,
    OrgSuffix,
    PersonalName,
}

impl RejectionReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::KnownPattern => "known_pattern",
            RejectionReason::OrgSuffix => "org_suffix",
            RejectionReason::PersonalName => "personal_name",
        }
    }
}

pub struct ContextFilter {
    known_pattern_index: HashMap<String, Vec<String>>,
    weak_suffix_phrases: Vec<String>,
}

impl ContextFilter {
    pub async fn load(pool: &SqlitePool) -> Result<Self, PlacesError> {
        let rows = sqlx::query(
            "SELECT trigger_word, exclusion_phrase, exclusion_type FROM place_exclusions \
             WHERE active = 1",
        )
        .fetch_all(pool)
        .await?;

        let mut known_pattern_index: HashMap<String, Vec<String>> = HashMap::new();
        let mut weak_suffix_phrases = Vec::new();

        for row in rows {
            let trigger: String = row.get("trigger_word");
            let phrase: String = row.get("exclusion_phrase");
            let kind: String = row.get("exclusion_type");
            match kind.as_str() {
                "weak_suffix" => weak_suffix_phrases.push(phrase.to_lowercase()),
                _ => known_pattern_index
                    .entry(trigger.to_lowercase())
                    .or_default()
                    .push(phrase.to_lowercase()),
            }
        }

        Ok(Self {
            known_pattern_index,
            weak_suffix_phrases,
        })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            known_pattern_index: HashMap::new(),
            weak_suffix_phrases: Vec::new(),
        }
    }

    /// Evaluate a mention found at `[mention_start, mention_end)` in `text`.
    /// Returns `None` when the mention should be accepted, `Some(reason)`
    /// otherwise.
    #[must_use]
    pub fn check(&self, text: &str, mention_start: usize, mention_end: usize) -> Option<RejectionReason> {
        let mention_lower = text[mention_start..mention_end].to_lowercase();

        let tight_start = mention_start.saturating_sub(25);
        let tight_end = (mention_end + 25).min(text.len());
        let tight_context = text[floor_char_boundary(text, tight_start)..ceil_char_boundary(text, tight_end)]
            .to_lowercase();

        if let Some(phrases) = self.known_pattern_index.get(&mention_lower) {
            if phrases.iter().any(|p| tight_context.contains(p.as_str())) {
                return Some(RejectionReason::KnownPattern);
            }
        }

        let after = next_word(text, mention_end);
        if let Some(word) = &after {
            let lower = word.to_lowercase();
            if STRONG_ORG_SUFFIXES.contains(&lower.as_str()) {
                return Some(RejectionReason::OrgSuffix);
            }
            if SHORT_ORG_SUFFIXES.contains(&lower.as_str()) && starts_with_uppercase(word) {
                return Some(RejectionReason::OrgSuffix);
            }
            if WEAK_ORG_SUFFIXES.contains(&lower.as_str()) {
                let combined = format!("{mention_lower} {lower}");
                if self.weak_suffix_phrases.iter().any(|p| p == &combined) {
                    return Some(RejectionReason::OrgSuffix);
                }
            }
        }

        let before = prev_word(text, mention_start);
        if let Some(word) = &before {
            let lower = word.to_lowercase();
            let lower = lower.trim_end_matches('.');
            if PERSON_TITLES.contains(&lower) || COMMON_GIVEN_NAMES.contains(&lower) {
                return Some(RejectionReason::PersonalName);
            }
        }

        None
    }
}

fn next_word(text: &str, from: usize) -> Option<String> {
    let rest = &text[from.min(text.len())..];
    rest.trim_start()
        .split(|c: char| !c.is_alphanumeric())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn prev_word(text: &str, until: usize) -> Option<String> {
    let prefix = &text[..until.min(text.len())];
    prefix
        .trim_end()
        .rsplit(|c: char| !c.is_alphanumeric())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn starts_with_uppercase(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_with_pattern(trigger: &str, phrase: &str) -> ContextFilter {
        let mut index = HashMap::new();
        index.insert(trigger.to_string(), vec![phrase.to_string()]);
        ContextFilter {
            known_pattern_index: index,
            weak_suffix_phrases: Vec::new(),
        }
    }

    #[test]
    fn known_pattern_rejects_texas_instruments() {
        let filter = filter_with_pattern("texas", "texas instruments");
        let text = "Texas Instruments reported earnings today.";
        let start = text.find("Texas").unwrap();
        let end = start + "Texas".len();
        assert_eq!(filter.check(text, start, end), Some(RejectionReason::KnownPattern));
    }

    #[test]
    fn org_suffix_rejects_strong_suffix() {
        let filter = ContextFilter::empty();
        let text = "New England Patriots fans filled the stadium.";
        let start = 0;
        let end = "New".len();
        assert_eq!(filter.check(text, start, end), None);

        let text2 = "Dallas Cowboys clinched the division.";
        let start2 = 0;
        let end2 = "Dallas".len();
        assert_eq!(filter.check(text2, start2, end2), Some(RejectionReason::OrgSuffix));
    }

    #[test]
    fn personal_name_prefix_rejects_titled_mention() {
        let filter = ContextFilter::empty();
        let text = "Dr. Georgia Wallace spoke at the conference.";
        let start = text.find("Georgia").unwrap();
        let end = start + "Georgia".len();
        assert_eq!(filter.check(text, start, end), Some(RejectionReason::PersonalName));
    }

    #[test]
    fn plain_geographic_mention_is_accepted() {
        let filter = ContextFilter::empty();
        let text = "Flooding continued across Georgia this week.";
        let start = text.find("Georgia").unwrap();
        let end = start + "Georgia".len();
        assert_eq!(filter.check(text, start, end), None);
    }
}
