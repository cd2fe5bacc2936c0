//! Collaborators the loader talks to. Transport is left to the implementor.

use async_trait::async_trait;
use labs_core::LabsError;
use labs_fhir::ObservationQuery;
use serde_json::Value;

/// FHIR `Observation` search endpoint.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Run a search and return the raw searchset bundle.
    async fn search(&self, query: &ObservationQuery) -> Result<Value, LabsError>;
}

/// Concept dictionary lookup.
#[async_trait]
pub trait ConceptSource: Send + Sync {
    /// Full representation of one concept.
    async fn concept(&self, concept_id: &str) -> Result<Value, LabsError>;
}
