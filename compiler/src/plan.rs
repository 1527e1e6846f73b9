// plan.rs — Index planning for resource-argument rearrangement
//
// Decides whether a type list needs its resource slots moved to the end and
// computes the permutation. The permutation is stable: values keep their
// relative order within the resource and non-resource classes.
//
// Preconditions: none.
// Postconditions: `plan_inputs` returns a bijection over `0..len`; after
//                 shuffling, every resource slot follows every other slot.
// Failure modes: a mapping shorter than the list it shuffles →
//                `MappingOutOfRange`.
// Side effects: none.

use std::collections::BTreeMap;

use crate::error::{RearrangeError, Result};
use crate::types::DataType;

/// Permutation where position `i` holds the new slot of original slot `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMapping(Vec<usize>);

impl IndexMapping {
    pub fn identity(len: usize) -> Self {
        IndexMapping((0..len).collect())
    }

    pub fn from_vec(slots: Vec<usize>) -> Self {
        IndexMapping(slots)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// New slot of original slot `index`.
    pub fn get(&self, index: usize) -> Result<usize> {
        self.0
            .get(index)
            .copied()
            .ok_or(RearrangeError::MappingOutOfRange {
                index,
                len: self.0.len(),
            })
    }

    pub fn is_bijection(&self) -> bool {
        let mut seen = vec![false; self.0.len()];
        for &slot in &self.0 {
            match seen.get_mut(slot) {
                Some(s) if !*s => *s = true,
                _ => return false,
            }
        }
        true
    }

    /// Mapping from new slot back to original slot.
    pub fn inverse(&self) -> IndexMapping {
        let mut inv = vec![0; self.0.len()];
        for (old, &new) in self.0.iter().enumerate() {
            if let Some(slot) = inv.get_mut(new) {
                *slot = old;
            }
        }
        IndexMapping(inv)
    }
}

/// Outcome of planning one input type list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPlan {
    pub needs_rewrite: bool,
    pub resource_count: usize,
    /// Identity when `needs_rewrite` is false.
    pub mapping: IndexMapping,
}

impl InputPlan {
    /// Slots below this bound hold non-resource values after rearrangement.
    pub fn retained(&self) -> usize {
        self.mapping.len() - self.resource_count
    }
}

/// Plan the rearrangement of `types` so every resource lands at the end.
pub fn plan_inputs(types: &[DataType]) -> InputPlan {
    let resource_count = types.iter().filter(|t| t.is_resource()).count();
    let needs_rewrite = match types.iter().position(|t| t.is_resource()) {
        Some(first) => types[first + 1..].iter().any(|t| !t.is_resource()),
        None => false,
    };
    if !needs_rewrite {
        return InputPlan {
            needs_rewrite,
            resource_count,
            mapping: IndexMapping::identity(types.len()),
        };
    }

    let mut next_value = 0;
    let mut next_resource = types.len() - resource_count;
    let slots = types
        .iter()
        .map(|t| {
            let counter = if t.is_resource() {
                &mut next_resource
            } else {
                &mut next_value
            };
            let slot = *counter;
            *counter += 1;
            slot
        })
        .collect();
    InputPlan {
        needs_rewrite,
        resource_count,
        mapping: IndexMapping(slots),
    }
}

/// Reorder `types` according to `mapping`.
pub fn shuffle_input_types(types: &[DataType], mapping: &IndexMapping) -> Result<Vec<DataType>> {
    let mut result = vec![DataType::Float; mapping.len()];
    for (i, ty) in types.iter().enumerate() {
        let slot = mapping.get(i)?;
        *result
            .get_mut(slot)
            .ok_or(RearrangeError::MappingOutOfRange {
                index: slot,
                len: mapping.len(),
            })? = *ty;
    }
    Ok(result)
}

// ── Return-side plan ────────────────────────────────────────────────────────

/// How a function's returns are rearranged once resource returns are
/// dropped: surviving returns are renumbered densely, and each dropped
/// resource return records the argument it forwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetvalPlan {
    /// Original return slot → new return slot, non-resource returns only.
    pub retval_index_mapping: BTreeMap<usize, usize>,
    /// Original return slot → argument index, resource returns only.
    pub resource_retval_to_arg: BTreeMap<usize, usize>,
}

/// Output types with dropped returns removed and survivors renumbered.
pub fn shuffle_output_types(
    types: &[DataType],
    mapping: &BTreeMap<usize, usize>,
) -> Result<Vec<DataType>> {
    let mut result = vec![DataType::Float; mapping.len()];
    for (i, ty) in types.iter().enumerate() {
        if let Some(&slot) = mapping.get(&i) {
            *result
                .get_mut(slot)
                .ok_or(RearrangeError::MappingOutOfRange {
                    index: slot,
                    len: mapping.len(),
                })? = *ty;
        }
    }
    Ok(result)
}
