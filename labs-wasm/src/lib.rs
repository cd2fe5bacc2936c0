//! WASM <-> JavaScript bridge for result assembly on data the host already fetched.

use std::sync::Arc;

use labs_core::{LabsConfig, LabsError, PatientResults, ReferenceRange};
use labs_fhir::{build_patient_results, parse_concept, parse_observation_bundle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsLabsConfig {
    #[serde(default)]
    page_size: Option<usize>,
    #[serde(default)]
    prefetch_pages: Option<usize>,
    #[serde(default)]
    cache_capacity: Option<usize>,
    #[serde(default)]
    test_concept_classes: Option<Vec<String>>,
}

impl From<JsLabsConfig> for LabsConfig {
    fn from(cfg: JsLabsConfig) -> Self {
        let mut base = LabsConfig::default();
        if let Some(page_size) = cfg.page_size {
            base.page_size = page_size;
        }
        if let Some(prefetch_pages) = cfg.prefetch_pages {
            base.prefetch_pages = prefetch_pages;
        }
        if let Some(capacity) = cfg.cache_capacity {
            base.cache_capacity = capacity;
        }
        if let Some(classes) = cfg.test_concept_classes {
            base.test_concept_classes = classes;
        }
        base
    }
}

/// Build the result tree from observation search bundles and concept documents.
#[wasm_bindgen(js_name = assembleResults)]
pub fn assemble_results(
    observation_bundles: JsValue,
    concepts: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let bundles = from_value::<Vec<Value>>(observation_bundles)
        .map_err(|err| JsValue::from_str(&format!("cannot read observation bundles: {err}")))?;
    let concepts = from_value::<Vec<Value>>(concepts)
        .map_err(|err| JsValue::from_str(&format!("cannot read concepts: {err}")))?;

    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsLabsConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("cannot read config: {err}")))?;
            LabsConfig::from(cfg)
        }
        None => LabsConfig::default(),
    };

    let results = assemble_from_values(&bundles, &concepts, &cfg)
        .map_err(|err| JsValue::from_str(&format_labs_error(err)))?;

    results
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("cannot serialize results: {err}")))
}

/// Interpretation of `value` against a threshold object such as `{ hiNormal, lowNormal }`.
#[wasm_bindgen(js_name = assessValue)]
pub fn assess_value(range: JsValue, value: f64) -> Result<String, JsValue> {
    let range: ReferenceRange = from_value(range)
        .map_err(|err| JsValue::from_str(&format!("cannot read reference range: {err}")))?;
    Ok(range.assess(value).to_string())
}

fn assemble_from_values(
    bundles: &[Value],
    concepts: &[Value],
    config: &LabsConfig,
) -> Result<PatientResults, LabsError> {
    config.validate()?;

    let mut records = Vec::new();
    for bundle in bundles {
        records.extend(parse_observation_bundle(bundle)?.records);
    }

    let concepts = concepts
        .iter()
        .map(|concept| parse_concept(concept).map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(build_patient_results(records, &concepts, config))
}

fn format_labs_error(err: LabsError) -> String {
    format!("Lab results error: {err}")
}
