//! In-memory gazetteer, spec.md §4.6: three lookup tables built from the
//! `places`/`place_names` tables at startup.

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};
use unicode_normalization::UnicodeNormalization;

use super::error::PlacesError;
use super::types::Place;

pub struct Gazetteer {
    by_normalized_name: HashMap<String, Vec<Place>>,
    by_url_slug: HashMap<String, Vec<Place>>,
    by_place_id: HashMap<i64, Place>,
}

impl Gazetteer {
    pub async fn load(pool: &SqlitePool) -> Result<Self, PlacesError> {
        let place_rows = sqlx::query(
            "SELECT id, kind, place_type, country_code, wikidata_qid, osm_type, osm_id, \
             lat, lng, population FROM places WHERE status = 'active'",
        )
        .fetch_all(pool)
        .await?;

        let mut by_place_id = HashMap::with_capacity(place_rows.len());
        for row in &place_rows {
            let place = Place {
                id: row.get("id"),
                kind: row.get("kind"),
                place_type: row.get("place_type"),
                country_code: row.get("country_code"),
                wikidata_qid: row.get("wikidata_qid"),
                osm_type: row.get("osm_type"),
                osm_id: row.get("osm_id"),
                lat: row.get("lat"),
                lng: row.get("lng"),
                population: row.get("population"),
            };
            by_place_id.insert(place.id, place);
        }

        let name_rows = sqlx::query("SELECT place_id, name, normalized FROM place_names")
            .fetch_all(pool)
            .await?;

        let mut by_normalized_name: HashMap<String, Vec<Place>> = HashMap::new();
        let mut by_url_slug: HashMap<String, Vec<Place>> = HashMap::new();

        for row in &name_rows {
            let place_id: i64 = row.get("place_id");
            let Some(place) = by_place_id.get(&place_id).cloned() else {
                continue;
            };
            let normalized: String = row.get("normalized");
            let name: String = row.get("name");

            by_normalized_name
                .entry(normalized)
                .or_default()
                .push(place.clone());

            let slug = url_slug(&name);
            by_url_slug.entry(slug).or_default().push(place);
        }

        for places in by_normalized_name.values_mut().chain(by_url_slug.values_mut()) {
            places.sort_by(|a, b| b.population.unwrap_or(0).cmp(&a.population.unwrap_or(0)));
            places.dedup_by_key(|p| p.id);
        }

        Ok(Self {
            by_normalized_name,
            by_url_slug,
            by_place_id,
        })
    }

    #[must_use]
    pub fn lookup_name(&self, normalized_name: &str) -> &[Place] {
        self.by_normalized_name
            .get(normalized_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn lookup_slug(&self, slug: &str) -> &[Place] {
        self.by_url_slug.get(slug).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn lookup_id(&self, place_id: i64) -> Option<&Place> {
        self.by_place_id.get(&place_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_place_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_place_id.is_empty()
    }
}

/// NFD-normalize, strip diacritics, lowercase, replace non-alphanumerics
/// with `-`, collapse and trim.
#[must_use]
pub fn url_slug(name: &str) -> String {
    let decomposed: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = decomposed.to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    let mut last_was_dash = true;
    for c in lowered.chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[must_use]
pub fn normalize_name(name: &str) -> String {
    let decomposed: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();
    decomposed.to_lowercase().trim().to_string()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_strips_diacritics_and_punctuation() {
        assert_eq!(url_slug("São Paulo"), "sao-paulo");
        assert_eq!(url_slug("Côte d'Ivoire"), "cote-d-ivoire");
    }

    #[test]
    fn slug_collapses_and_trims_separators() {
        assert_eq!(url_slug("  New   York, NY  "), "new-york-ny");
    }
}
