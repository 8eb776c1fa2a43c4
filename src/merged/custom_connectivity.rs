//! Per-synapse arrays a connectivity update keeps consistent.
//!
//! Structural row mutation moves every array stored with the connectivity,
//! including ones the update never names (dependent variables). Members of
//! one merged group may declare those in different orders, so they are
//! canonicalised by a sub-hash over type and batch duplication.

use crate::error::{Error, Result};
use crate::model::{dependent_var_hash, CustomConnectivityUpdate, SynapseVar};
use crate::types::{ResolvedType, TypeContext};

use super::GroupMerged;

/// One per-synapse array of a merged connectivity update.
#[derive(Clone, Debug, PartialEq)]
pub struct SynapseArray {
    /// Name row update code uses; `None` for dependent variables.
    pub binding: Option<String>,
    /// Struct field holding the array pointer.
    pub field: String,
    /// Element type.
    pub ty: ResolvedType,
    /// One copy per batch.
    pub duplicated: bool,
    pub read_only: bool,
    /// Device array of each member.
    pub values: Vec<String>,
}

impl SynapseArray {
    /// Whether `add_synapse` takes a value for this array.
    pub fn is_argument(&self) -> bool {
        self.binding.is_some()
    }
}

/// Dependent variables of `update` in canonical order.
pub fn sorted_dependent_vars(update: &CustomConnectivityUpdate) -> Vec<SynapseVar> {
    let mut vars = update.dependent_vars();
    vars.sort_by_cached_key(dependent_var_hash);
    vars
}

pub fn resolve_type(context: &TypeContext, ty: &str) -> Result<ResolvedType> {
    context
        .parse_type(ty)
        .ok_or_else(|| Error::UnknownType(ty.to_string()))
}

/// Every per-synapse array: own variables, variable references, then
/// dependent variables.
pub fn synapse_arrays(
    merged: &GroupMerged<'_, CustomConnectivityUpdate>,
    context: &TypeContext,
) -> Result<Vec<SynapseArray>> {
    let archetype = merged.archetype();
    let members = merged.groups();
    let mut arrays = Vec::new();

    for var in &archetype.model.vars {
        arrays.push(SynapseArray {
            binding: Some(var.name.clone()),
            field: var.name.clone(),
            ty: resolve_type(context, &var.ty)?,
            duplicated: false,
            read_only: var.access.is_read_only(),
            values: members
                .iter()
                .map(|m| format!("d_{}{}", var.name, m.name))
                .collect(),
        });
    }

    for decl in &archetype.model.var_refs {
        let mut values = Vec::with_capacity(members.len());
        let mut duplicated = false;
        for member in members {
            let reference = member.var_references.get(&decl.name).ok_or_else(|| {
                Error::InconsistentGroup {
                    group: member.name.clone(),
                    message: format!("variable reference '{}' is not bound", decl.name),
                }
            })?;
            duplicated |= reference.duplicated;
            values.push(reference.device_name());
        }
        arrays.push(SynapseArray {
            binding: Some(decl.name.clone()),
            field: decl.name.clone(),
            ty: resolve_type(context, &decl.ty)?,
            duplicated,
            read_only: decl.read_only,
            values,
        });
    }

    let sorted: Vec<Vec<SynapseVar>> = members.iter().map(|m| sorted_dependent_vars(m)).collect();
    let count = sorted[0].len();
    if let Some(i) = sorted.iter().position(|vars| vars.len() != count) {
        return Err(Error::InconsistentGroup {
            group: members[i].name.clone(),
            message: format!("expected {} dependent variables, found {}", count, sorted[i].len()),
        });
    }
    for i in 0..count {
        let var = &sorted[0][i];
        arrays.push(SynapseArray {
            binding: None,
            field: format!("_dependentVar{}", i),
            ty: resolve_type(context, &var.ty)?,
            duplicated: var.duplicated,
            read_only: false,
            values: sorted.iter().map(|vars| vars[i].device_name()).collect(),
        });
    }
    Ok(arrays)
}
