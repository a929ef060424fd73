//! Content Analyzer: charset detection, DOM extraction, skeleton hashing,
//! confidence scoring and tagging, spec.md §4.5.

mod analysis;
pub mod charset;
pub mod confidence;
pub mod dom;
mod error;
pub mod tagging;

pub use analysis::{ContentAnalysisResult, ContentAnalyzer};
pub use confidence::{ConfidenceScore, RecommendationTier};
pub use dom::{ExtractedContent, ParsedDocument};
pub use error::AnalyzerError;
pub use tagging::{CategoryClassifier, CategoryResult, Entity, EntityKind, EntityRecognizer, Keyword, KeywordExtractor};
