//! Core types for assembling a patient's laboratory results.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod range;

pub use range::{Interpretation, ReferenceRange};

/// Runtime knobs resolved once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabsConfig {
    /// Records requested per observation page.
    pub page_size: usize,
    /// Pages requested concurrently before the total count is known.
    pub prefetch_pages: usize,
    /// Patients kept in the result cache.
    pub cache_capacity: usize,
    /// Concept class names eligible to appear in the results.
    pub test_concept_classes: Vec<String>,
}

impl Default for LabsConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            prefetch_pages: 6,
            cache_capacity: 3,
            test_concept_classes: vec!["Test".to_string(), "LabSet".to_string()],
        }
    }
}

impl LabsConfig {
    /// Reject zero sizes and an empty test class list.
    pub fn validate(&self) -> Result<(), LabsError> {
        if self.page_size == 0 {
            return Err(LabsError::InvalidConfig("page_size must be positive".into()));
        }
        if self.prefetch_pages == 0 {
            return Err(LabsError::InvalidConfig(
                "prefetch_pages must be positive".into(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(LabsError::InvalidConfig(
                "cache_capacity must be positive".into(),
            ));
        }
        if self.test_concept_classes.is_empty() {
            return Err(LabsError::InvalidConfig(
                "test_concept_classes cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// Number of pages needed to hold `total` records.
    pub fn pages_for(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }
}

/// Class a concept belongs to, e.g. `Test`, `LabSet` or `Finding`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConceptClass {
    pub name: String,
    #[serde(default)]
    pub display: Option<String>,
}

/// Value datatype of a concept, e.g. `Numeric` or `Coded`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Datatype {
    #[serde(default)]
    pub display: Option<String>,
}

/// Concept definition as served by the concept dictionary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub uuid: String,
    pub display: String,
    pub concept_class: ConceptClass,
    #[serde(flatten)]
    pub range: ReferenceRange,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub datatype: Option<Datatype>,
}

impl Concept {
    /// Whether the concept's class is one of `classes`.
    pub fn is_test_concept(&self, classes: &[String]) -> bool {
        classes.iter().any(|class| *class == self.concept_class.name)
    }

    /// Display name of the concept class, falling back to its name.
    pub fn type_name(&self) -> &str {
        self.concept_class
            .display
            .as_deref()
            .unwrap_or(&self.concept_class.name)
    }

    /// Range, units and datatype attached to each result of this concept.
    pub fn reference_metadata(&self) -> ReferenceMetadata {
        ReferenceMetadata {
            range: self.range,
            units: self.units.clone(),
            datatype: self.datatype.as_ref().and_then(|dt| dt.display.clone()),
            display_range: self.range.display_range(),
        }
    }
}

/// Interpretation inputs derived from a concept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceMetadata {
    #[serde(flatten)]
    pub range: ReferenceRange,
    pub units: Option<String>,
    pub datatype: Option<String>,
    #[serde(rename = "range")]
    pub display_range: Option<String>,
}

impl ReferenceMetadata {
    pub fn assess(&self, value: f64) -> Interpretation {
        self.range.assess(value)
    }
}

/// One assembled result: a single test or a panel with its members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabObservation {
    pub id: String,
    pub concept_class: String,
    pub name: String,
    pub effective_date_time: Option<DateTime<Utc>>,
    pub value: Option<f64>,
    pub value_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<LabObservation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Arc<ReferenceMetadata>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<Interpretation>,
}

impl LabObservation {
    pub fn is_panel(&self) -> bool {
        !self.members.is_empty()
    }
}

/// Results for one concept, most recent entry first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultGroup {
    pub entries: Vec<LabObservation>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub uuid: String,
}

/// A patient's results keyed by concept display name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct PatientResults {
    groups: BTreeMap<String, ResultGroup>,
}

impl PatientResults {
    pub fn new(groups: BTreeMap<String, ResultGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &BTreeMap<String, ResultGroup> {
        &self.groups
    }

    pub fn get(&self, name: &str) -> Option<&ResultGroup> {
        self.groups.get(name)
    }

    /// Most recent entry recorded under `name`.
    pub fn latest(&self, name: &str) -> Option<&LabObservation> {
        self.groups.get(name).and_then(|group| group.entries.first())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Errors raised while loading lab results.
#[derive(Debug, thiserror::Error)]
pub enum LabsError {
    #[error("upstream request failed: {0}")]
    Source(String),
    #[error("{resource} is missing required field `{field}`")]
    MissingField {
        resource: &'static str,
        field: &'static str,
    },
    #[error("{resource} has invalid field `{field}`: {reason}")]
    InvalidField {
        resource: &'static str,
        field: &'static str,
        reason: String,
    },
    #[error("schema mismatch: {0}")]
    Schema(String),
    #[error("could not read data: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
