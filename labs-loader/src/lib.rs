//! Loads, assembles and caches a patient's laboratory results.
//!
//! [`LabsLoader`] is constructed once at startup with its collaborators and
//! shared by reference; it owns the concept memo and the patient result cache.

use std::sync::Arc;

use labs_core::{Concept, LabsConfig, LabsError, PatientResults};
use labs_fhir::{build_patient_results, ObservationRecord};

pub mod cache;
pub mod concepts;
pub mod fetch;
pub mod source;

pub use cache::{CacheEntry, CacheState, InMemoryStateStore, PatientResultCache, StateStore};
pub use concepts::ConceptCache;
pub use fetch::fetch_observations;
pub use source::{ConceptSource, ObservationSource};

pub struct LabsLoader {
    observations: Arc<dyn ObservationSource>,
    concepts: ConceptCache,
    cache: PatientResultCache,
    config: LabsConfig,
}

impl LabsLoader {
    /// Loader with an in-memory result cache.
    pub fn new(
        observations: Arc<dyn ObservationSource>,
        concepts: Arc<dyn ConceptSource>,
        config: LabsConfig,
    ) -> Result<Self, LabsError> {
        Self::with_store(
            observations,
            concepts,
            Arc::new(InMemoryStateStore::default()),
            config,
        )
    }

    pub fn with_store(
        observations: Arc<dyn ObservationSource>,
        concepts: Arc<dyn ConceptSource>,
        store: Arc<dyn StateStore>,
        config: LabsConfig,
    ) -> Result<Self, LabsError> {
        config.validate()?;
        Ok(Self {
            observations,
            concepts: ConceptCache::new(concepts),
            cache: PatientResultCache::new(store, config.cache_capacity),
            config,
        })
    }

    pub fn config(&self) -> &LabsConfig {
        &self.config
    }

    pub fn cache(&self) -> &PatientResultCache {
        &self.cache
    }

    pub fn concept_cache(&self) -> &ConceptCache {
        &self.concepts
    }

    /// Lab results for `patient_id`, from cache when still current.
    ///
    /// Any failed request fails the whole load and nothing is cached.
    pub async fn load_patient_data(
        &self,
        patient_id: &str,
    ) -> Result<Arc<PatientResults>, LabsError> {
        if let Some(cached) = self.cache.get(self.observations.as_ref(), patient_id).await? {
            return Ok(cached);
        }

        let records =
            fetch_observations(self.observations.as_ref(), patient_id, &self.config).await?;
        // Upstream sorts newest first.
        let freshness_token = records.first().map(|record| record.id.clone());
        let record_count = records.len();

        let concepts = self.concepts.load_present_concepts(&records).await?;
        let results = Arc::new(build_patient_results(records, &concepts, &self.config));

        match freshness_token {
            Some(token) => self.cache.put(patient_id, Arc::clone(&results), token),
            None => tracing::debug!(patient_id, "no lab observations, result not cached"),
        }

        tracing::info!(
            patient_id,
            observations = record_count,
            groups = results.len(),
            "loaded lab results"
        );

        Ok(results)
    }

    /// Concept definitions for every concept referenced by `records`.
    pub async fn load_present_concepts(
        &self,
        records: &[ObservationRecord],
    ) -> Result<Vec<Arc<Concept>>, LabsError> {
        self.concepts.load_present_concepts(records).await
    }
}
