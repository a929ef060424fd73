//! Pattern + known-list entity recognition for PERSON, ORG, GPE, spec.md
//! §4.5.1.

use regex::Regex;
use std::sync::OnceLock;

const KNOWN_ORGS: &[&str] = &[
    "United Nations", "European Union", "World Health Organization", "NATO", "FBI", "CIA",
    "Reuters", "Associated Press", "Google", "Microsoft", "Amazon", "Apple", "Meta",
];

const KNOWN_GPE: &[&str] = &[
    "United States", "United Kingdom", "China", "Russia", "France", "Germany", "Japan", "India",
    "Brazil", "Canada", "Australia", "Mexico", "New York", "London", "Washington",
];

const PERSON_TITLES: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Sen.", "Rep.", "President", "Prime Minister", "Gov.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Person,
    Org,
    Gpe,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Person => "PERSON",
            EntityKind::Org => "ORG",
            EntityKind::Gpe => "GPE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub text: String,
    pub kind: EntityKind,
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
}

fn capitalized_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-zA-Z.'-]*(?:\s+[A-Z][a-zA-Z.'-]*)*\b").unwrap())
}

pub struct EntityRecognizer;

impl EntityRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn recognize(&self, text: &str) -> Vec<Entity> {
        let mut entities = Vec::new();

        for known in KNOWN_ORGS {
            for (start, _) in text.match_indices(known) {
                entities.push(Entity {
                    text: (*known).to_string(),
                    kind: EntityKind::Org,
                    confidence: 0.95,
                    start,
                    end: start + known.len(),
                });
            }
        }
        for known in KNOWN_GPE {
            for (start, _) in text.match_indices(known) {
                entities.push(Entity {
                    text: (*known).to_string(),
                    kind: EntityKind::Gpe,
                    confidence: 0.95,
                    start,
                    end: start + known.len(),
                });
            }
        }

        for m in capitalized_run_re().find_iter(text) {
            let candidate = m.as_str();
            if KNOWN_ORGS.contains(&candidate) || KNOWN_GPE.contains(&candidate) {
                continue;
            }
            if is_preceded_by_title(text, m.start()) {
                entities.push(Entity {
                    text: candidate.to_string(),
                    kind: EntityKind::Person,
                    confidence: 0.75,
                    start: m.start(),
                    end: m.end(),
                });
                continue;
            }
            if candidate.split_whitespace().count() >= 2 && !candidate.ends_with('.') {
                entities.push(Entity {
                    text: candidate.to_string(),
                    kind: EntityKind::Person,
                    confidence: 0.4,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        dedup_overlaps(entities)
    }
}

impl Default for EntityRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_preceded_by_title(text: &str, start: usize) -> bool {
    let prefix = &text[..start];
    PERSON_TITLES
        .iter()
        .any(|title| prefix.trim_end().ends_with(title))
}

fn dedup_overlaps(mut entities: Vec<Entity>) -> Vec<Entity> {
    entities.sort_by(|a, b| a.start.cmp(&b.start).then(b.confidence.partial_cmp(&a.confidence).unwrap()));
    let mut result: Vec<Entity> = Vec::new();
    for entity in entities {
        if let Some(last) = result.last() {
            if entity.start < last.end {
                continue;
            }
        }
        result.push(entity);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_organization() {
        let recognizer = EntityRecognizer::new();
        let entities = recognizer.recognize("The United Nations issued a statement today.");
        assert!(entities.iter().any(|e| e.text == "United Nations" && e.kind == EntityKind::Org));
    }

    #[test]
    fn recognizes_known_place() {
        let recognizer = EntityRecognizer::new();
        let entities = recognizer.recognize("Officials in London met with Washington delegates.");
        assert!(entities.iter().any(|e| e.text == "London" && e.kind == EntityKind::Gpe));
    }

    #[test]
    fn recognizes_titled_person() {
        let recognizer = EntityRecognizer::new();
        let entities = recognizer.recognize("Dr. Jane Smith announced the results.");
        assert!(entities
            .iter()
            .any(|e| e.kind == EntityKind::Person && e.text.contains("Jane Smith")));
    }
}
