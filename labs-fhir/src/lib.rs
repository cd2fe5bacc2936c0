//! Upstream record parsing and result tree assembly.
//!
//! Observations come from FHIR R4 `Observation` searches (category `laboratory`),
//! concept definitions from the concept dictionary REST API. Nothing here does I/O.

pub mod concept;
pub mod observation;
pub mod query;
pub mod tree;

pub use concept::{parse_concept, parse_concept_str};
pub use observation::{
    distinct_concept_ids, latest_observation_id, parse_bundle_str, parse_observation,
    parse_observation_bundle, ObservationPage, ObservationRecord,
};
pub use query::{concept_path, ObservationQuery};
pub use tree::build_patient_results;
