//! Concept dictionary documents.

use labs_core::{Concept, LabsError};
use serde_json::Value;

/// Parse a full concept representation.
///
/// Schema mismatches report the path of the failing field (e.g. `conceptClass.name`).
pub fn parse_concept(value: &Value) -> Result<Concept, LabsError> {
    serde_path_to_error::deserialize::<_, Concept>(value).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>"
        } else {
            path.as_str()
        };
        LabsError::Schema(format!("concept schema mismatch at {path}: {source}"))
    })
}

pub fn parse_concept_str(concept_json: &str) -> Result<Concept, LabsError> {
    let value: Value =
        serde_json::from_str(concept_json).map_err(|err| LabsError::Parse(err.to_string()))?;
    parse_concept(&value)
}
