//! Place Resolver: gazetteer, context filter, duplicate reconciliation and
//! hub discovery, spec.md §4.6.

mod context_filter;
mod dedup;
mod error;
mod gazetteer;
mod hub_discovery;
mod types;

pub use context_filter::{ContextFilter, RejectionReason};
pub use dedup::{find_duplicate_reason, DuplicateReason, GazetteerIngestor};
pub use error::PlacesError;
pub use gazetteer::{normalize_name, url_slug, Gazetteer};
pub use hub_discovery::{HubDiscovery, HubProbeResult, HubStatus};
pub use types::{Place, PlaceCandidate, PlaceName};
