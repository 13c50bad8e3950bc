//! Schema validation for cost structures

use thiserror::Error;

use crate::models::CostStructure;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must not be negative (got {value})")]
    Negative { field: String, value: f64 },

    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    #[error("no procedure selected")]
    MissingProcedure,

    #[error("{kind} line {line} has no catalog id")]
    MissingCatalogId { kind: &'static str, line: String },

    #[error("equipment line {line} has a price but no useful life")]
    MissingUsefulLife { line: String },
}

/// Check a structure before it is saved or reported.
///
/// Amount constraints are already enforced by the field wrappers; this covers
/// the rules that span fields.
pub fn validate(structure: &CostStructure) -> Result<(), ValidationError> {
    if structure.procedure.is_none() {
        return Err(ValidationError::MissingProcedure);
    }

    let ids = structure
        .infrastructures
        .iter()
        .map(|l| ("infrastructure", l.id, l.infrastructure_id.as_str()))
        .chain(
            structure
                .human_resources
                .iter()
                .map(|l| ("human resource", l.id, l.human_resource_id.as_str())),
        )
        .chain(
            structure
                .equipment
                .iter()
                .map(|l| ("equipment", l.id, l.equipment_id.as_str())),
        )
        .chain(
            structure
                .supplies
                .iter()
                .map(|l| ("supply", l.id, l.supply_id.as_str())),
        );
    for (kind, line, catalog_id) in ids {
        if catalog_id.trim().is_empty() {
            return Err(ValidationError::MissingCatalogId {
                kind,
                line: line.to_string(),
            });
        }
    }

    for line in &structure.equipment {
        if line.price.value() > 0.0 && line.useful_years.value() <= 0.0 {
            return Err(ValidationError::MissingUsefulLife {
                line: line.id.to_string(),
            });
        }
    }

    Ok(())
}
