#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use labs_core::LabsError;
use labs_fhir::ObservationQuery;
use labs_loader::{ConceptSource, ObservationSource};
use serde_json::{json, Value};

/// Serves canned observations per patient, newest first.
#[derive(Default)]
pub struct FakeObservations {
    resources: Mutex<HashMap<String, Vec<Value>>>,
    page_calls: AtomicUsize,
    latest_calls: AtomicUsize,
    fail_at_offset: Option<usize>,
    staggered: bool,
}

impl FakeObservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patient(self, patient_id: &str, resources: Vec<Value>) -> Self {
        self.resources
            .lock()
            .unwrap()
            .insert(patient_id.to_string(), resources);
        self
    }

    pub fn failing_at(mut self, offset: usize) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }

    /// Later pages answer sooner than earlier ones.
    pub fn staggered(mut self) -> Self {
        self.staggered = true;
        self
    }

    pub fn prepend(&self, patient_id: &str, resource: Value) {
        self.resources
            .lock()
            .unwrap()
            .entry(patient_id.to_string())
            .or_default()
            .insert(0, resource);
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObservationSource for FakeObservations {
    async fn search(&self, query: &ObservationQuery) -> Result<Value, LabsError> {
        if query.count == 1 {
            self.latest_calls.fetch_add(1, Ordering::SeqCst);
        } else {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
        }

        if query.count > 1 && self.fail_at_offset == Some(query.offset) {
            return Err(LabsError::Source(format!(
                "page at offset {} unavailable",
                query.offset
            )));
        }

        if self.staggered {
            let index = (query.offset / query.count.max(1)).min(20);
            tokio::time::sleep(Duration::from_millis((20 - index) as u64 * 2)).await;
        }

        let (total, page) = {
            let resources = self.resources.lock().unwrap();
            let all = resources.get(&query.patient_id).cloned().unwrap_or_default();
            let page: Vec<Value> = all
                .iter()
                .skip(query.offset)
                .take(query.count)
                .map(|resource| json!({ "resource": resource }))
                .collect();
            (all.len(), page)
        };

        Ok(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "total": total,
            "entry": page,
        }))
    }
}

/// Serves concept documents and counts lookups per id.
pub struct FakeConcepts {
    concepts: Mutex<HashMap<String, Value>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
}

impl FakeConcepts {
    pub fn new(concepts: Vec<Value>) -> Self {
        let fake = Self {
            concepts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            delay: Duration::from_millis(5),
        };
        for concept in concepts {
            fake.insert(concept);
        }
        fake
    }

    pub fn insert(&self, concept: Value) {
        let uuid = concept["uuid"].as_str().unwrap().to_string();
        self.concepts.lock().unwrap().insert(uuid, concept);
    }

    pub fn calls(&self, concept_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(concept_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ConceptSource for FakeConcepts {
    async fn concept(&self, concept_id: &str) -> Result<Value, LabsError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(concept_id.to_string())
            .or_default() += 1;

        tokio::time::sleep(self.delay).await;

        self.concepts
            .lock()
            .unwrap()
            .get(concept_id)
            .cloned()
            .ok_or_else(|| LabsError::Source(format!("unknown concept {concept_id}")))
    }
}

pub fn lab(id: &str, concept: &str, day: u32, value: f64) -> Value {
    json!({
        "resourceType": "Observation",
        "id": id,
        "code": { "coding": [{ "code": concept }] },
        "effectiveDateTime": format!("2024-05-{day:02}T08:00:00+00:00"),
        "valueQuantity": { "value": value }
    })
}

pub fn panel(id: &str, concept: &str, day: u32, members: &[&str]) -> Value {
    json!({
        "resourceType": "Observation",
        "id": id,
        "code": { "coding": [{ "code": concept }] },
        "effectiveDateTime": format!("2024-05-{day:02}T08:00:00+00:00"),
        "hasMember": members
            .iter()
            .map(|member| json!({ "reference": format!("Observation/{member}") }))
            .collect::<Vec<_>>()
    })
}

/// `count` hemoglobin results with ids `obs-0`, `obs-1`, ...
pub fn numbered(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| lab(&format!("obs-{i}"), "hgb", 1 + (i % 28) as u32, 13.0))
        .collect()
}

pub fn standard_concepts() -> Vec<Value> {
    vec![
        json!({
            "uuid": "hgb",
            "display": "Hemoglobin",
            "conceptClass": { "name": "Test", "display": "Test" },
            "hiNormal": 16.0,
            "lowNormal": 12.0,
            "units": "g/dL",
            "datatype": { "display": "Numeric" }
        }),
        json!({
            "uuid": "wbc",
            "display": "White Blood Cells",
            "conceptClass": { "name": "Test", "display": "Test" },
            "hiNormal": 11.0,
            "lowNormal": 4.0,
            "datatype": { "display": "Numeric" }
        }),
        json!({
            "uuid": "cbc",
            "display": "Complete Blood Count",
            "conceptClass": { "name": "LabSet", "display": "LabSet" },
            "datatype": { "display": "N/A" }
        }),
        json!({
            "uuid": "wt",
            "display": "Weight",
            "conceptClass": { "name": "Finding", "display": "Finding" },
            "datatype": { "display": "Numeric" }
        }),
    ]
}

/// A panel with two members, a standalone result and a non-lab finding.
pub fn blood_count_history() -> Vec<Value> {
    vec![
        panel("cbc-1", "cbc", 10, &["hgb-1", "wbc-1"]),
        lab("hgb-1", "hgb", 10, 13.5),
        lab("wbc-1", "wbc", 10, 12.0),
        lab("wt-1", "wt", 9, 70.0),
        lab("hgb-0", "hgb", 2, 11.0),
    ]
}
