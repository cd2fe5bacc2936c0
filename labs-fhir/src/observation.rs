//! FHIR `Observation` search bundles to typed records.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use labs_core::LabsError;
use serde_json::Value;

const OBSERVATION: &str = "Observation";
const BUNDLE: &str = "Bundle";

/// An observation as delivered upstream, before tree assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub id: String,
    pub concept_class: String,
    pub effective_date_time: Option<DateTime<Utc>>,
    pub value: Option<f64>,
    pub value_text: Option<String>,
    /// Ids of member observations, in declared order. Non-empty for panels.
    pub member_ids: Vec<String>,
}

impl ObservationRecord {
    pub fn is_panel(&self) -> bool {
        !self.member_ids.is_empty()
    }
}

/// One page of a search result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationPage {
    pub total: usize,
    pub records: Vec<ObservationRecord>,
}

/// Parse a bundle from a JSON string.
pub fn parse_bundle_str(bundle_json: &str) -> Result<ObservationPage, LabsError> {
    let value: Value =
        serde_json::from_str(bundle_json).map_err(|err| LabsError::Parse(err.to_string()))?;
    parse_observation_bundle(&value)
}

/// Parse a searchset bundle. A missing `entry` array is an empty page.
pub fn parse_observation_bundle(bundle: &Value) -> Result<ObservationPage, LabsError> {
    if let Some(bundle_type) = bundle.get("resourceType").and_then(Value::as_str) {
        if bundle_type != BUNDLE {
            return Err(LabsError::InvalidField {
                resource: BUNDLE,
                field: "resourceType",
                reason: format!("expected Bundle, received {bundle_type}"),
            });
        }
    }

    let total = bundle
        .get("total")
        .ok_or(LabsError::MissingField {
            resource: BUNDLE,
            field: "total",
        })?
        .as_u64()
        .ok_or_else(|| LabsError::InvalidField {
            resource: BUNDLE,
            field: "total",
            reason: "expected a non-negative integer".into(),
        })? as usize;

    let records = match bundle.get("entry") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| {
                entry
                    .get("resource")
                    .ok_or(LabsError::MissingField {
                        resource: BUNDLE,
                        field: "entry.resource",
                    })
                    .and_then(parse_observation)
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(LabsError::InvalidField {
                resource: BUNDLE,
                field: "entry",
                reason: "expected an array".into(),
            })
        }
    };

    Ok(ObservationPage { total, records })
}

/// Id of the first entry of a bundle, if any.
pub fn latest_observation_id(bundle: &Value) -> Option<String> {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .and_then(|entries| entries.first())
        .and_then(|entry| entry.get("resource"))
        .and_then(|resource| resource.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Parse one `Observation` resource.
pub fn parse_observation(resource: &Value) -> Result<ObservationRecord, LabsError> {
    if let Some(resource_type) = resource.get("resourceType").and_then(Value::as_str) {
        if resource_type != OBSERVATION {
            return Err(LabsError::InvalidField {
                resource: OBSERVATION,
                field: "resourceType",
                reason: format!("expected Observation, received {resource_type}"),
            });
        }
    }

    let id = resource
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(LabsError::MissingField {
            resource: OBSERVATION,
            field: "id",
        })?
        .to_string();

    let concept_class = resource
        .get("code")
        .and_then(|code| code.get("coding"))
        .and_then(Value::as_array)
        .and_then(|codings| codings.first())
        .and_then(|coding| coding.get("code"))
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())
        .ok_or(LabsError::MissingField {
            resource: OBSERVATION,
            field: "code.coding[0].code",
        })?
        .to_string();

    Ok(ObservationRecord {
        id,
        concept_class,
        effective_date_time: extract_observation_timestamp(resource),
        value: resource
            .get("valueQuantity")
            .and_then(|quantity| quantity.get("value"))
            .and_then(Value::as_f64),
        value_text: observation_value_text(resource),
        member_ids: member_ids(resource)?,
    })
}

/// Distinct concept ids in first-seen order.
pub fn distinct_concept_ids(records: &[ObservationRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| seen.insert(record.concept_class.as_str()))
        .map(|record| record.concept_class.clone())
        .collect()
}

fn member_ids(resource: &Value) -> Result<Vec<String>, LabsError> {
    let Some(members) = resource.get("hasMember").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    members
        .iter()
        .map(|member| {
            let reference = member
                .get("reference")
                .and_then(Value::as_str)
                .ok_or(LabsError::MissingField {
                    resource: OBSERVATION,
                    field: "hasMember.reference",
                })?;

            // "Observation/<id>"
            reference
                .split('/')
                .nth(1)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .ok_or_else(|| LabsError::InvalidField {
                    resource: OBSERVATION,
                    field: "hasMember.reference",
                    reason: format!("cannot read an id from `{reference}`"),
                })
        })
        .collect()
}

fn observation_value_text(resource: &Value) -> Option<String> {
    if let Some(value) = resource.get("valueString").and_then(Value::as_str) {
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    resource
        .get("valueCodeableConcept")
        .and_then(extract_codeable_text)
}

fn extract_codeable_text(value: &Value) -> Option<String> {
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.trim().to_string());
        }
    }

    value
        .get("coding")
        .and_then(Value::as_array)?
        .iter()
        .find_map(|coding| {
            coding
                .get("display")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|display| !display.is_empty())
                .map(str::to_string)
        })
}

fn extract_observation_timestamp(resource: &Value) -> Option<DateTime<Utc>> {
    for field in ["effectiveDateTime", "effectiveInstant", "effectivePeriod", "issued"] {
        let Some(value) = resource.get(field) else {
            continue;
        };

        if let Some(dt) = value.as_str().and_then(parse_datetime) {
            return Some(dt);
        }

        if let Some(obj) = value.as_object() {
            if let Some(dt) = obj.get("start").and_then(Value::as_str).and_then(parse_datetime) {
                return Some(dt);
            }
        }
    }
    None
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
