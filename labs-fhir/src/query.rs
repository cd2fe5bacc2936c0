//! Request descriptions for the observation search and concept lookup endpoints.

/// One page of a patient's laboratory observations, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationQuery {
    pub patient_id: String,
    pub offset: usize,
    pub count: usize,
}

impl ObservationQuery {
    /// Page `index` of size `page_size`.
    pub fn page(patient_id: &str, index: usize, page_size: usize) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            offset: index * page_size,
            count: page_size,
        }
    }

    /// Single most recent observation, used as a freshness probe.
    pub fn latest(patient_id: &str) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            offset: 0,
            count: 1,
        }
    }

    /// Search parameters for `Observation?...`.
    pub fn to_query_string(&self) -> String {
        let mut query = format!(
            "patient={}&category=laboratory&_sort=-_date&_summary=data&_format=json&_count={}",
            self.patient_id, self.count
        );
        if self.offset > 0 {
            query.push_str(&format!("&_getpagesoffset={}", self.offset));
        }
        query
    }
}

/// Path of the full concept representation, relative to the REST root.
pub fn concept_path(concept_id: &str) -> String {
    format!("concept/{concept_id}?v=full")
}
