#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub id: i64,
    pub kind: String,
    pub place_type: String,
    pub country_code: Option<String>,
    pub wikidata_qid: Option<String>,
    pub osm_type: Option<String>,
    pub osm_id: Option<i64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub population: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceName {
    pub place_id: i64,
    pub name: String,
    pub normalized: String,
    pub is_preferred: bool,
}

/// Candidate place data for gazetteer ingestion, prior to reconciliation.
#[derive(Debug, Clone)]
pub struct PlaceCandidate {
    pub kind: String,
    pub place_type: String,
    pub country_code: Option<String>,
    pub wikidata_qid: Option<String>,
    pub osm_type: Option<String>,
    pub osm_id: Option<i64>,
    pub external_source: Option<String>,
    pub external_id: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub population: Option<i64>,
    pub name: String,
}
