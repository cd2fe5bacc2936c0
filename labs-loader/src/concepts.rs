//! Process-lifetime memo of concept definitions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::try_join_all;
use labs_core::{Concept, LabsError};
use labs_fhir::{distinct_concept_ids, parse_concept, ObservationRecord};
use tokio::sync::OnceCell;

use crate::source::ConceptSource;

type Slot = Arc<OnceCell<Arc<Concept>>>;

/// Concept lookups memoized by id.
///
/// The slot for an id is registered before the first await, so concurrent
/// callers asking for the same id share a single upstream request. A failed
/// request leaves the slot empty and the next caller retries.
pub struct ConceptCache {
    source: Arc<dyn ConceptSource>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ConceptCache {
    pub fn new(source: Arc<dyn ConceptSource>) -> Self {
        Self {
            source,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Definitions for `concept_ids`, in the same order.
    pub async fn resolve(&self, concept_ids: &[String]) -> Result<Vec<Arc<Concept>>, LabsError> {
        let slots: Vec<(&str, Slot)> = {
            let mut registry = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            concept_ids
                .iter()
                .map(|id| (id.as_str(), registry.entry(id.clone()).or_default().clone()))
                .collect()
        };

        try_join_all(slots.into_iter().map(|(id, slot)| async move {
            slot.get_or_try_init(|| self.fetch(id)).await.cloned()
        }))
        .await
    }

    /// Definitions for every distinct concept referenced by `records`.
    pub async fn load_present_concepts(
        &self,
        records: &[ObservationRecord],
    ) -> Result<Vec<Arc<Concept>>, LabsError> {
        self.resolve(&distinct_concept_ids(records)).await
    }

    /// Number of concepts resolved so far.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn fetch(&self, concept_id: &str) -> Result<Arc<Concept>, LabsError> {
        tracing::debug!(concept_id, "fetching concept");
        let value = self.source.concept(concept_id).await?;
        parse_concept(&value).map(Arc::new)
    }
}
