//! TF-IDF keyword extraction with a persistent, incrementally-updated
//! document-frequency corpus, per spec.md §4.5.1.

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use crate::analyzer::error::AnalyzerError;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "of", "to", "in", "on", "for", "with", "as", "is", "are",
    "was", "were", "be", "been", "being", "at", "by", "from", "that", "this", "it", "its", "has",
    "have", "had", "not", "no", "we", "you", "they", "he", "she", "his", "her", "their", "our",
    "will", "would", "can", "could", "said", "says",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub term: String,
    pub score: f64,
}

/// Owns the shared document-frequency corpus in `keyword_document_frequency`
/// / `keyword_corpus_stats`. One extraction call both scores the given text
/// against the corpus as it stood before this call, and folds the text's
/// terms into the corpus for future calls.
pub struct KeywordExtractor {
    pool: SqlitePool,
    top_n: usize,
}

impl KeywordExtractor {
    #[must_use]
    pub fn new(pool: SqlitePool, top_n: usize) -> Self {
        Self { pool, top_n }
    }

    pub async fn extract(&self, text: &str) -> Result<Vec<Keyword>, AnalyzerError> {
        let term_counts = tokenize_and_count(text);
        if term_counts.is_empty() {
            return Ok(Vec::new());
        }
        let total_terms: usize = term_counts.values().sum();
        let total_documents = self.total_documents().await?;

        let mut scored = Vec::with_capacity(term_counts.len());
        for (term, count) in &term_counts {
            let df = self.document_frequency(term).await?;
            let idf = ((total_documents as f64 + 1.0) / (df as f64 + 1.0)).ln() + 1.0;
            let tf = *count as f64 / total_terms as f64;
            scored.push(Keyword {
                term: term.clone(),
                score: tf * idf,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.top_n);

        self.record_document(term_counts.keys()).await?;

        Ok(scored)
    }

    async fn total_documents(&self) -> Result<i64, AnalyzerError> {
        let row = sqlx::query("SELECT total_documents FROM keyword_corpus_stats WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("total_documents")).unwrap_or(0))
    }

    async fn document_frequency(&self, term: &str) -> Result<i64, AnalyzerError> {
        let row = sqlx::query("SELECT document_count FROM keyword_document_frequency WHERE term = ?1")
            .bind(term)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("document_count")).unwrap_or(0))
    }

    async fn record_document<'a>(
        &self,
        terms: impl Iterator<Item = &'a String>,
    ) -> Result<(), AnalyzerError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO keyword_corpus_stats (id, total_documents) VALUES (1, 1) \
             ON CONFLICT(id) DO UPDATE SET total_documents = total_documents + 1",
        )
        .execute(&mut *tx)
        .await?;

        for term in terms {
            sqlx::query(
                "INSERT INTO keyword_document_frequency (term, document_count) VALUES (?1, 1) \
                 ON CONFLICT(term) DO UPDATE SET document_count = document_count + 1",
            )
            .bind(term)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn tokenize_and_count(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.len() < 3 {
            continue;
        }
        let lower = word.to_lowercase();
        if STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        *counts.entry(lower).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn extractor() -> (KeywordExtractor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open(&dir.path().join("crawl.db")).await.unwrap();
        (KeywordExtractor::new(pool, 10), dir)
    }

    #[tokio::test]
    async fn extracts_frequent_non_stopword_terms() {
        let (extractor, _dir) = extractor().await;
        let keywords = extractor
            .extract("tariffs tariffs tariffs trade policy trade the a an of")
            .await
            .unwrap();
        assert_eq!(keywords.first().unwrap().term, "tariffs");
    }

    #[tokio::test]
    async fn repeated_terms_lower_future_idf() {
        let (extractor, _dir) = extractor().await;
        extractor.extract("election election election ballots").await.unwrap();
        let second = extractor
            .extract("election results announced today across ballots")
            .await
            .unwrap();
        let election_score = second.iter().find(|k| k.term == "election").unwrap().score;
        let fresh_score = second.iter().find(|k| k.term == "announced").unwrap().score;
        assert!(election_score < fresh_score);
    }
}
