//! End-to-end Wikidata dedup scenario (spec.md §8 scenario 6): ingesting a
//! place with a QID already held by an existing row does not insert a new
//! row, and the existing row's missing fields are filled from the
//! candidate.

use newsgraph_crawler::places::{GazetteerIngestor, PlaceCandidate};

fn candidate(population: Option<i64>) -> PlaceCandidate {
    PlaceCandidate {
        kind: "city".to_string(),
        place_type: "city".to_string(),
        country_code: Some("FR".to_string()),
        wikidata_qid: Some("Q90".to_string()),
        osm_type: None,
        osm_id: None,
        external_source: None,
        external_id: None,
        lat: Some(48.8566),
        lng: Some(2.3522),
        population,
        name: "Paris".to_string(),
    }
}

#[tokio::test]
async fn ingesting_duplicate_qid_merges_instead_of_inserting() {
    let dir = tempfile::tempdir().unwrap();
    let pool = newsgraph_crawler::db::open(&dir.path().join("crawl.db"))
        .await
        .unwrap();
    let ingestor = GazetteerIngestor::new(pool.clone());

    let p1 = candidate(None);
    let id1 = ingestor.upsert(&p1).await.unwrap();

    let p2 = candidate(Some(2_100_000));
    let id2 = ingestor.upsert(&p2).await.unwrap();

    assert_eq!(id1, id2, "re-ingesting the same QID must return the same place id");

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM places WHERE wikidata_qid = 'Q90'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}
