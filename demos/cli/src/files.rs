//! File-backed sources serving a single patient's fixture data.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use labs_core::LabsError;
use labs_fhir::ObservationQuery;
use labs_loader::{ConceptSource, ObservationSource};
use serde_json::{json, Value};

/// Pages through the entries of one searchset bundle.
pub struct FileObservations {
    patient_id: String,
    entries: Vec<Value>,
}

impl FileObservations {
    pub fn load(path: &Path, patient_id: &str) -> anyhow::Result<Self> {
        let bundle = read_json(path)?;
        let entries = bundle
            .get("entry")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(Self {
            patient_id: patient_id.to_string(),
            entries,
        })
    }
}

#[async_trait]
impl ObservationSource for FileObservations {
    async fn search(&self, query: &ObservationQuery) -> Result<Value, LabsError> {
        tracing::trace!(query = %query.to_query_string(), "Observation search");

        let entries: &[Value] = if query.patient_id == self.patient_id {
            &self.entries
        } else {
            &[]
        };
        let page: Vec<&Value> = entries.iter().skip(query.offset).take(query.count).collect();

        Ok(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "total": entries.len(),
            "entry": page,
        }))
    }
}

/// Concept documents keyed by uuid.
pub struct FileConcepts {
    concepts: HashMap<String, Value>,
}

impl FileConcepts {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let value = read_json(path)?;
        let list = value
            .as_array()
            .with_context(|| format!("{} must hold a JSON array of concepts", path.display()))?;

        let concepts = list
            .iter()
            .filter_map(|concept| {
                let uuid = concept.get("uuid").and_then(Value::as_str)?;
                Some((uuid.to_string(), concept.clone()))
            })
            .collect();

        Ok(Self { concepts })
    }
}

#[async_trait]
impl ConceptSource for FileConcepts {
    async fn concept(&self, concept_id: &str) -> Result<Value, LabsError> {
        tracing::trace!(path = %labs_fhir::concept_path(concept_id), "concept lookup");
        self.concepts
            .get(concept_id)
            .cloned()
            .ok_or_else(|| LabsError::Source(format!("concept {concept_id} not found")))
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {:?}", path))?;
    serde_json::from_str(&data).with_context(|| format!("invalid JSON in {:?}", path))
}
