use sqlx::{Row, SqlitePool};

use super::charset;
use super::confidence::{self, ConfidenceScore};
use super::dom::ParsedDocument;
use super::error::AnalyzerError;
use super::tagging::{CategoryClassifier, Entity, EntityRecognizer, Keyword, KeywordExtractor};

/// Full single-pass result of analyzing one stored payload, spec.md §4.5.
#[derive(Debug, Clone)]
pub struct ContentAnalysisResult {
    pub content_id: i64,
    pub analysis_version: i64,
    pub title: Option<String>,
    pub byline: Option<String>,
    pub excerpt: Option<String>,
    pub published_at: Option<String>,
    pub word_count: usize,
    pub category: String,
    pub secondary_category: Option<String>,
    pub keywords: Vec<Keyword>,
    pub entities: Vec<Entity>,
    pub confidence: ConfidenceScore,
    pub skeleton_structure: String,
    pub skeleton_template: String,
}

/// Ties charset decoding, DOM extraction, confidence scoring and tagging
/// into the single-pass pipeline of spec.md §4.5, persisting the outcome to
/// `content_analysis`.
pub struct ContentAnalyzer {
    pool: SqlitePool,
    keyword_extractor: KeywordExtractor,
    category_classifier: CategoryClassifier,
    entity_recognizer: EntityRecognizer,
}

impl ContentAnalyzer {
    #[must_use]
    pub fn new(pool: SqlitePool, keyword_top_n: usize) -> Self {
        let keyword_extractor = KeywordExtractor::new(pool.clone(), keyword_top_n);
        Self {
            pool,
            keyword_extractor,
            category_classifier: CategoryClassifier::new(),
            entity_recognizer: EntityRecognizer::new(),
        }
    }

    pub async fn analyze(
        &self,
        content_id: i64,
        body: &[u8],
        content_type_header: Option<&str>,
    ) -> Result<ContentAnalysisResult, AnalyzerError> {
        if body.is_empty() {
            return Err(AnalyzerError::EmptyDocument);
        }

        let (markup, _encoding) = charset::decode(body, content_type_header);
        let document = ParsedDocument::parse(&markup);
        let extracted = document.extract();
        let confidence = confidence::score(&extracted, None);

        let combined_text = format!(
            "{} {}",
            extracted.title.clone().unwrap_or_default(),
            extracted.primary_text
        );
        let category = self
            .category_classifier
            .classify(extracted.title.as_deref().unwrap_or_default(), &extracted.primary_text);
        let keywords = self.keyword_extractor.extract(&combined_text).await?;
        let entities = self.entity_recognizer.recognize(&combined_text);

        let analysis_version = self.next_version(content_id).await?;

        let result = ContentAnalysisResult {
            content_id,
            analysis_version,
            title: extracted.title,
            byline: extracted.byline,
            excerpt: extracted.excerpt,
            published_at: extracted.published_at,
            word_count: extracted.word_count,
            category: category.primary,
            secondary_category: category.secondary,
            keywords,
            entities,
            confidence,
            skeleton_structure: document.skeleton_hash_structure(),
            skeleton_template: document.skeleton_hash_template(),
        };

        self.persist(&result).await?;
        Ok(result)
    }

    async fn next_version(&self, content_id: i64) -> Result<i64, AnalyzerError> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(analysis_version), 0) AS v FROM content_analysis WHERE content_id = ?1",
        )
        .bind(content_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("v") + 1)
    }

    async fn persist(&self, result: &ContentAnalysisResult) -> Result<(), AnalyzerError> {
        let analysis_json = serde_json::json!({
            "secondary_category": result.secondary_category,
            "keywords": result.keywords.iter().map(|k| (&k.term, k.score)).collect::<Vec<_>>(),
            "entities": result.entities.iter().map(|e| serde_json::json!({
                "text": e.text,
                "kind": e.kind.as_str(),
                "confidence": e.confidence,
                "start": e.start,
                "end": e.end,
            })).collect::<Vec<_>>(),
            "confidence": {
                "title_quality": result.confidence.title_quality,
                "word_count_fit": result.confidence.word_count_fit,
                "metadata_completeness": result.confidence.metadata_completeness,
                "readability": result.confidence.readability,
                "visual": result.confidence.visual,
                "overall": result.confidence.overall,
                "recommendation": result.confidence.recommendation.as_str(),
            },
            "skeleton_structure": result.skeleton_structure,
            "skeleton_template": result.skeleton_template,
            "byline": result.byline,
            "excerpt": result.excerpt,
        });

        sqlx::query(
            "INSERT INTO content_analysis \
             (content_id, analysis_version, classification, title, date, section, word_count, \
              language, analysis_json, analyzed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(result.content_id)
        .bind(result.analysis_version)
        .bind(&result.category)
        .bind(&result.title)
        .bind(&result.published_at)
        .bind(&result.category)
        .bind(result.word_count as i64)
        .bind(Option::<String>::None)
        .bind(analysis_json.to_string())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn analyzer() -> (ContentAnalyzer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open(&dir.path().join("crawl.db")).await.unwrap();
        sqlx::query(
            "INSERT INTO content_storage \
             (storage_type, content_sha256, uncompressed_size, created_at) \
             VALUES ('inline', 'deadbeef', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        (ContentAnalyzer::new(pool, 10), dir)
    }

    #[tokio::test]
    async fn analyzes_and_persists_a_document() {
        let (analyzer, _dir) = analyzer().await;
        let markup = br#"<html><head><title>Championship Win Secures Title</title>
            <meta property="article:published_time" content="2024-03-01T00:00:00Z"></head>
            <body><p>The coach celebrated after the team's goal sealed the championship.</p>
            <p>Fans across the league praised the tournament performance.</p></body></html>"#;

        let result = analyzer.analyze(1, markup, Some("text/html; charset=utf-8")).await.unwrap();
        assert_eq!(result.category, "Sports");
        assert_eq!(result.analysis_version, 1);
        assert!(result.word_count > 0);

        let second = analyzer.analyze(1, markup, None).await.unwrap();
        assert_eq!(second.analysis_version, 2);
    }

    #[tokio::test]
    async fn rejects_empty_body() {
        let (analyzer, _dir) = analyzer().await;
        let err = analyzer.analyze(1, b"", None).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::EmptyDocument));
    }
}
