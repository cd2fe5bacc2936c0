//! Paginated retrieval of a patient's laboratory observations.

use std::ops::Range;

use futures::future::try_join_all;
use labs_core::{LabsConfig, LabsError};
use labs_fhir::{parse_observation_bundle, ObservationPage, ObservationQuery, ObservationRecord};

use crate::source::ObservationSource;

/// Fetch every laboratory observation of a patient.
///
/// The first `prefetch_pages` pages are requested concurrently before the total
/// is known; any further pages follow in a second concurrent batch. Pages are
/// recombined by index, so records keep the upstream (newest first) order.
pub async fn fetch_observations(
    source: &dyn ObservationSource,
    patient_id: &str,
    config: &LabsConfig,
) -> Result<Vec<ObservationRecord>, LabsError> {
    let mut pages = fetch_pages(source, patient_id, 0..config.prefetch_pages, config).await?;

    let total = pages.first().map(|page| page.total).unwrap_or_default();
    let needed = config.pages_for(total);

    if needed > pages.len() {
        tracing::debug!(
            patient_id,
            total,
            pages = needed,
            "fetching observation pages beyond the prefetch window"
        );
        let rest = fetch_pages(source, patient_id, pages.len()..needed, config).await?;
        pages.extend(rest);
    }

    pages.truncate(needed);

    Ok(pages.into_iter().flat_map(|page| page.records).collect())
}

async fn fetch_pages(
    source: &dyn ObservationSource,
    patient_id: &str,
    indices: Range<usize>,
    config: &LabsConfig,
) -> Result<Vec<ObservationPage>, LabsError> {
    let page_size = config.page_size;
    try_join_all(indices.map(|index| async move {
        let query = ObservationQuery::page(patient_id, index, page_size);
        let bundle = source.search(&query).await?;
        parse_observation_bundle(&bundle)
    }))
    .await
}
