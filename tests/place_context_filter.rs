//! End-to-end place-context-filter scenarios (spec.md §8 scenarios 3 & 4),
//! using the literal example texts from the spec and a `place_exclusions`
//! row loaded the way `ContextFilter::load` expects.

use newsgraph_crawler::places::{ContextFilter, RejectionReason};

async fn filter_with_texas_instruments_pattern() -> ContextFilter {
    let dir = tempfile::tempdir().unwrap();
    let pool = newsgraph_crawler::db::open(&dir.path().join("crawl.db"))
        .await
        .unwrap();

    sqlx::query(
        "INSERT INTO place_exclusions (trigger_word, exclusion_phrase, exclusion_type, active) \
         VALUES ('texas', 'texas instruments', 'known_pattern', 1)",
    )
    .execute(&pool)
    .await
    .unwrap();

    ContextFilter::load(&pool).await.unwrap()
}

#[tokio::test]
async fn texas_instruments_is_a_known_pattern_false_positive() {
    let filter = filter_with_texas_instruments_pattern().await;

    let text = "Texas Instruments announced record earnings this quarter.";
    let start = text.find("Texas").unwrap();
    let end = start + "Texas".len();

    assert_eq!(
        filter.check(text, start, end),
        Some(RejectionReason::KnownPattern)
    );
}

#[tokio::test]
async fn weather_in_texas_is_accepted() {
    let filter = filter_with_texas_instruments_pattern().await;

    let text = "The weather in Texas is hot.";
    let start = text.find("Texas").unwrap();
    let end = start + "Texas".len();

    assert_eq!(filter.check(text, start, end), None);
}
