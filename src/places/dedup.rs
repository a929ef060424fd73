//! Gazetteer duplicate detection and ingestion, spec.md §4.6.
//!
//! Concurrent ingestion of the same Wikidata QID races on insert; the
//! `UNIQUE(wikidata_qid)` partial index in the schema turns that race into
//! a constraint violation, which [`GazetteerIngestor::upsert`] catches and
//! resolves by re-reading the winning row inside the same transaction.

use sqlx::{Row, SqlitePool};

use super::error::PlacesError;
use super::gazetteer::normalize_name;
use super::types::{Place, PlaceCandidate};

const DEFAULT_COORDINATE_PROXIMITY_DEGREES: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DuplicateReason {
    WikidataQid,
    OsmId,
    ExternalId,
    NormalizedNameCountryKind,
    CoordinateProximity,
}

/// Check whether `candidate` duplicates `existing`, per the a>b>c>d>e
/// priority order. Returns the highest-priority reason that matches.
#[must_use]
pub fn find_duplicate_reason(
    candidate: &PlaceCandidate,
    existing: &Place,
    existing_normalized_name: &str,
    existing_external_ids: &[(String, String)],
    coordinate_proximity_degrees: Option<f64>,
) -> Option<DuplicateReason> {
    if let (Some(a), Some(b)) = (&candidate.wikidata_qid, &existing.wikidata_qid) {
        if a == b {
            return Some(DuplicateReason::WikidataQid);
        }
    }

    if let (Some(ct), Some(ci), Some(et), Some(ei)) = (
        &candidate.osm_type,
        candidate.osm_id,
        &existing.osm_type,
        existing.osm_id,
    ) {
        if ct == et && ci == ei {
            return Some(DuplicateReason::OsmId);
        }
    }

    if let (Some(source), Some(ext_id)) = (&candidate.external_source, &candidate.external_id) {
        if existing_external_ids
            .iter()
            .any(|(s, id)| s == source && id == ext_id)
        {
            return Some(DuplicateReason::ExternalId);
        }
    }

    let candidate_normalized = normalize_name(&candidate.name);
    if candidate_normalized == existing_normalized_name
        && candidate.country_code == existing.country_code
        && candidate.kind == existing.kind
    {
        return Some(DuplicateReason::NormalizedNameCountryKind);
    }

    let threshold = coordinate_proximity_degrees.unwrap_or(DEFAULT_COORDINATE_PROXIMITY_DEGREES);
    if let (Some(clat), Some(clng), Some(elat), Some(elng)) =
        (candidate.lat, candidate.lng, existing.lat, existing.lng)
    {
        let same_kind_country =
            candidate.kind == existing.kind && candidate.country_code == existing.country_code;
        if same_kind_country && (clat - elat).abs() <= threshold && (clng - elng).abs() <= threshold {
            return Some(DuplicateReason::CoordinateProximity);
        }
    }

    None
}

pub struct GazetteerIngestor {
    pool: SqlitePool,
}

impl GazetteerIngestor {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get-or-create a place for `candidate`, keyed on Wikidata QID when
    /// present. Runs inside a transaction so a concurrent insert of the
    /// same QID is resolved by re-reading the winner rather than erroring.
    pub async fn upsert(&self, candidate: &PlaceCandidate) -> Result<i64, PlacesError> {
        let mut tx = self.pool.begin().await?;
        let now_extra = "{}";

        if let Some(qid) = &candidate.wikidata_qid {
            if let Some(row) = sqlx::query("SELECT id FROM places WHERE wikidata_qid = ?1")
                .bind(qid)
                .fetch_optional(&mut *tx)
                .await?
            {
                let id: i64 = row.get("id");
                Self::merge_missing_fields(&mut tx, id, candidate).await?;
                tx.commit().await?;
                return Ok(id);
            }
        }

        let insert = sqlx::query(
            "INSERT INTO places \
             (kind, place_type, country_code, wikidata_qid, osm_type, osm_id, lat, lng, \
              population, status, extra_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'active', ?10) \
             ON CONFLICT(wikidata_qid) WHERE wikidata_qid IS NOT NULL DO NOTHING",
        )
        .bind(&candidate.kind)
        .bind(&candidate.place_type)
        .bind(&candidate.country_code)
        .bind(&candidate.wikidata_qid)
        .bind(&candidate.osm_type)
        .bind(candidate.osm_id)
        .bind(candidate.lat)
        .bind(candidate.lng)
        .bind(candidate.population)
        .bind(now_extra)
        .execute(&mut *tx)
        .await?;

        let place_id = if insert.rows_affected() == 0 {
            let qid = candidate
                .wikidata_qid
                .as_ref()
                .expect("conflict only possible when qid is set");
            let row = sqlx::query("SELECT id FROM places WHERE wikidata_qid = ?1")
                .bind(qid)
                .fetch_one(&mut *tx)
                .await?;
            let id: i64 = row.get("id");
            Self::merge_missing_fields(&mut tx, id, candidate).await?;
            id
        } else {
            insert.last_insert_rowid()
        };

        let normalized = normalize_name(&candidate.name);
        sqlx::query(
            "INSERT INTO place_names (place_id, name, normalized, name_kind, is_preferred) \
             VALUES (?1, ?2, ?3, 'common', 1) \
             ON CONFLICT DO NOTHING",
        )
        .bind(place_id)
        .bind(&candidate.name)
        .bind(&normalized)
        .execute(&mut *tx)
        .await
        .ok();

        if let (Some(source), Some(ext_id)) = (&candidate.external_source, &candidate.external_id) {
            sqlx::query(
                "INSERT INTO place_external_ids (place_id, source, ext_id) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(source, ext_id) DO NOTHING",
            )
            .bind(place_id)
            .bind(source)
            .bind(ext_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(place_id)
    }

    /// Fill any column on the existing row that is `NULL` with the
    /// candidate's value, per spec.md §8 scenario 6 ("P1's attributes are
    /// merged, missing fields filled from P2"). Never overwrites a
    /// non-null existing value.
    async fn merge_missing_fields(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        place_id: i64,
        candidate: &PlaceCandidate,
    ) -> Result<(), PlacesError> {
        sqlx::query(
            "UPDATE places SET \
               place_type = COALESCE(place_type, ?2), \
               country_code = COALESCE(country_code, ?3), \
               osm_type = COALESCE(osm_type, ?4), \
               osm_id = COALESCE(osm_id, ?5), \
               lat = COALESCE(lat, ?6), \
               lng = COALESCE(lng, ?7), \
               population = COALESCE(population, ?8) \
             WHERE id = ?1",
        )
        .bind(place_id)
        .bind(&candidate.place_type)
        .bind(&candidate.country_code)
        .bind(&candidate.osm_type)
        .bind(candidate.osm_id)
        .bind(candidate.lat)
        .bind(candidate.lng)
        .bind(candidate.population)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(qid: Option<&str>, osm: Option<(&str, i64)>, lat: f64, lng: f64) -> Place {
        Place {
            id: 1,
            kind: "city".to_string(),
            place_type: "city".to_string(),
            country_code: Some("US".to_string()),
            wikidata_qid: qid.map(str::to_string),
            osm_type: osm.map(|(t, _)| t.to_string()),
            osm_id: osm.map(|(_, i)| i),
            lat: Some(lat),
            lng: Some(lng),
            population: Some(100_000),
        }
    }

    fn candidate(qid: Option<&str>, name: &str, lat: f64, lng: f64) -> PlaceCandidate {
        PlaceCandidate {
            kind: "city".to_string(),
            place_type: "city".to_string(),
            country_code: Some("US".to_string()),
            wikidata_qid: qid.map(str::to_string),
            osm_type: None,
            osm_id: None,
            external_source: None,
            external_id: None,
            lat: Some(lat),
            lng: Some(lng),
            population: Some(50_000),
            name: name.to_string(),
        }
    }

    #[test]
    fn wikidata_qid_match_wins_over_coordinates() {
        let existing = place(Some("Q123"), None, 10.0, 20.0);
        let cand = candidate(Some("Q123"), "Example City", 50.0, 60.0);
        assert_eq!(
            find_duplicate_reason(&cand, &existing, "example city", &[], None),
            Some(DuplicateReason::WikidataQid)
        );
    }

    #[test]
    fn coordinate_proximity_matches_within_threshold() {
        let existing = place(None, None, 10.0, 20.0);
        let cand = candidate(None, "Other Name", 10.01, 20.01);
        assert_eq!(
            find_duplicate_reason(&cand, &existing, "other name", &[], None),
            Some(DuplicateReason::CoordinateProximity)
        );
    }

    #[test]
    fn distinct_places_are_not_duplicates() {
        let existing = place(None, None, 10.0, 20.0);
        let cand = candidate(None, "Far Away City", 80.0, -120.0);
        assert_eq!(
            find_duplicate_reason(&cand, &existing, "far away city", &[], None),
            None
        );
    }

    #[tokio::test]
    async fn re_ingesting_same_qid_merges_missing_fields_without_new_row() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::db::open(&dir.path().join("crawl.db")).await.unwrap();
        let ingestor = GazetteerIngestor::new(pool.clone());

        let mut p1 = candidate(Some("Q90"), "Paris", 48.85, 2.35);
        p1.population = None;
        let id1 = ingestor.upsert(&p1).await.unwrap();

        let p2 = candidate(Some("Q90"), "Paris", 48.85, 2.35);
        let id2 = ingestor.upsert(&p2).await.unwrap();

        assert_eq!(id1, id2);
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM places WHERE wikidata_qid = 'Q90'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);

        let population: Option<i64> = sqlx::query("SELECT population FROM places WHERE id = ?1")
            .bind(id1)
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("population");
        assert_eq!(population, Some(50_000));
    }
}
