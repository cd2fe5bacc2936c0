//! Bounded per-patient result cache validated by a freshness token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use labs_core::{LabsError, PatientResults};
use labs_fhir::{latest_observation_id, ObservationQuery};

use crate::source::ObservationSource;

/// Assembled results for one patient plus what is needed to validate and evict them.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub results: Arc<PatientResults>,
    pub inserted_at: DateTime<Utc>,
    /// Breaks ties between entries inserted at the same instant.
    pub sequence: u64,
    /// Id of the patient's most recent observation when the entry was written.
    pub freshness_token: String,
}

/// Cache entries keyed by patient id.
pub type CacheState = HashMap<String, CacheEntry>;

/// Whole-state get/replace store backing the patient cache.
pub trait StateStore: Send + Sync {
    fn get_state(&self) -> CacheState;
    fn set_state(&self, state: CacheState);
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    state: RwLock<CacheState>,
}

impl StateStore for InMemoryStateStore {
    fn get_state(&self) -> CacheState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_state(&self, state: CacheState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Keeps the results of the most recently inserted patients.
///
/// Entries are never expired by age. A cached entry is served only while the
/// patient's newest observation id still equals the stored token.
pub struct PatientResultCache {
    store: Arc<dyn StateStore>,
    capacity: usize,
    sequence: AtomicU64,
    // Held across each read-modify-write of the store.
    write_lock: Mutex<()>,
}

impl PatientResultCache {
    pub fn new(store: Arc<dyn StateStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            sequence: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// Cached results for `patient_id` if they are still current.
    ///
    /// Without a cached entry no request is made at all.
    pub async fn get(
        &self,
        source: &dyn ObservationSource,
        patient_id: &str,
    ) -> Result<Option<Arc<PatientResults>>, LabsError> {
        let Some(entry) = self.store.get_state().remove(patient_id) else {
            tracing::debug!(patient_id, "result cache miss");
            return Ok(None);
        };

        let bundle = source.search(&ObservationQuery::latest(patient_id)).await?;
        let latest = latest_observation_id(&bundle);

        if latest.as_deref() == Some(entry.freshness_token.as_str()) {
            tracing::debug!(patient_id, "result cache hit");
            Ok(Some(entry.results))
        } else {
            tracing::debug!(
                patient_id,
                cached = %entry.freshness_token,
                latest = ?latest,
                "cached results are stale"
            );
            Ok(None)
        }
    }

    /// Insert or overwrite the entry for `patient_id`, then evict down to capacity.
    pub fn put(&self, patient_id: &str, results: Arc<PatientResults>, freshness_token: String) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.store.get_state();
        state.insert(
            patient_id.to_string(),
            CacheEntry {
                results,
                inserted_at: Utc::now(),
                sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
                freshness_token,
            },
        );

        if state.len() > self.capacity {
            let mut entries: Vec<(String, CacheEntry)> = state.into_iter().collect();
            entries.sort_by(|(_, a), (_, b)| {
                (b.inserted_at, b.sequence).cmp(&(a.inserted_at, a.sequence))
            });
            for (evicted, _) in entries.iter().skip(self.capacity) {
                tracing::debug!(patient_id = %evicted, "evicting cached results");
            }
            entries.truncate(self.capacity);
            state = entries.into_iter().collect();
        }

        self.store.set_state(state);
    }

    pub fn contains(&self, patient_id: &str) -> bool {
        self.store.get_state().contains_key(patient_id)
    }

    pub fn len(&self) -> usize {
        self.store.get_state().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
