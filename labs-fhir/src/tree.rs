//! Panel/member tree assembly.
//!
//! Panels only reference their members by id and records arrive in any order,
//! so assembly runs in two passes over an arena of panels:
//! pass 1 records, for every referenced member id, the panel and slot it
//! belongs to; pass 2 moves each leaf into its slot or files it as a
//! standalone result.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use labs_core::{
    Concept, LabObservation, LabsConfig, PatientResults, ReferenceMetadata, ResultGroup,
};

use crate::observation::ObservationRecord;

struct PanelSlots {
    panel: LabObservation,
    slots: Vec<Option<LabObservation>>,
}

#[derive(Clone, Copy)]
struct SlotRef {
    panel: usize,
    slot: usize,
}

/// Assemble the per-concept result groups for one patient.
pub fn build_patient_results(
    records: Vec<ObservationRecord>,
    concepts: &[Arc<Concept>],
    config: &LabsConfig,
) -> PatientResults {
    let test_concepts: HashMap<&str, &Concept> = concepts
        .iter()
        .filter(|concept| concept.is_test_concept(&config.test_concept_classes))
        .map(|concept| (concept.uuid.as_str(), concept.as_ref()))
        .collect();

    let metadata: HashMap<&str, Arc<ReferenceMetadata>> = test_concepts
        .iter()
        .map(|(uuid, concept)| (*uuid, Arc::new(concept.reference_metadata())))
        .collect();

    let mut panels: Vec<PanelSlots> = Vec::new();
    let mut member_slots: HashMap<String, SlotRef> = HashMap::new();
    let mut leaves: Vec<LabObservation> = Vec::new();
    // Members of panels that were discarded with their panel.
    let mut discarded_members: HashSet<String> = HashSet::new();

    for record in records {
        let Some(concept) = test_concepts.get(record.concept_class.as_str()) else {
            discarded_members.extend(record.member_ids);
            continue;
        };

        let member_ids = record.member_ids;
        let mut observation = LabObservation {
            id: record.id,
            concept_class: record.concept_class,
            name: concept.display.clone(),
            effective_date_time: record.effective_date_time,
            value: record.value,
            value_text: record.value_text,
            members: Vec::new(),
            meta: None,
            interpretation: None,
        };

        if member_ids.is_empty() {
            observation.meta = metadata.get(observation.concept_class.as_str()).cloned();
            observation.interpretation = match (&observation.meta, observation.value) {
                (Some(meta), Some(value)) => Some(meta.assess(value)),
                _ => None,
            };
            leaves.push(observation);
            continue;
        }

        let panel = panels.len();
        for (slot, member_id) in member_ids.iter().enumerate() {
            member_slots.insert(member_id.clone(), SlotRef { panel, slot });
        }
        panels.push(PanelSlots {
            panel: observation,
            slots: vec![None; member_ids.len()],
        });
    }

    let mut standalone: Vec<LabObservation> = Vec::new();
    for leaf in leaves {
        if let Some(slot_ref) = member_slots.get(&leaf.id).copied() {
            panels[slot_ref.panel].slots[slot_ref.slot] = Some(leaf);
        } else if discarded_members.contains(&leaf.id) {
            tracing::debug!(id = %leaf.id, "dropping member of a non-test panel");
        } else {
            standalone.push(leaf);
        }
    }

    // Panels precede standalone results so equal timestamps keep that order.
    let mut by_concept: BTreeMap<String, Vec<LabObservation>> = BTreeMap::new();
    for PanelSlots { mut panel, slots } in panels {
        let declared = slots.len();
        panel.members = slots.into_iter().flatten().collect();
        if panel.members.len() < declared {
            tracing::debug!(
                id = %panel.id,
                declared,
                resolved = panel.members.len(),
                "panel has unresolved member references"
            );
        }
        by_concept
            .entry(panel.concept_class.clone())
            .or_default()
            .push(panel);
    }
    for leaf in standalone {
        by_concept
            .entry(leaf.concept_class.clone())
            .or_default()
            .push(leaf);
    }

    let mut groups = BTreeMap::new();
    for (uuid, mut entries) in by_concept {
        let Some(concept) = test_concepts.get(uuid.as_str()) else {
            continue;
        };
        entries.sort_by(|a, b| b.effective_date_time.cmp(&a.effective_date_time));
        groups.insert(
            concept.display.clone(),
            ResultGroup {
                entries,
                type_name: concept.type_name().to_string(),
                uuid,
            },
        );
    }

    PatientResults::new(groups)
}
