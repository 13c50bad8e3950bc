//! Line-by-line editing of a cost structure
//!
//! Edits never mutate the structure they are given; `apply` returns the
//! next state. Lines are addressed by their `LineId`, so removing an
//! infrastructure line takes its public-service consumption with it.

use thiserror::Error;

use crate::models::{
    AnnualServiceCost, CostStructure, EquipmentLine, HumanResourceLine, InfrastructureLine,
    LineId, Procedure, SupplyLine,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("no {kind} line with id {id}")]
    UnknownLine { kind: &'static str, id: LineId },
}

/// A single user edit. Line payloads carry a placeholder id on `Add*`,
/// which `apply` replaces with a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    SetProcedure(Option<Procedure>),
    SetAnnualCosts(AnnualServiceCost),

    AddInfrastructure(InfrastructureLine),
    UpdateInfrastructure(InfrastructureLine),
    RemoveInfrastructure(LineId),

    AddHumanResource(HumanResourceLine),
    UpdateHumanResource(HumanResourceLine),
    RemoveHumanResource(LineId),

    AddEquipment(EquipmentLine),
    UpdateEquipment(EquipmentLine),
    RemoveEquipment(LineId),

    AddSupply(SupplyLine),
    UpdateSupply(SupplyLine),
    RemoveSupply(LineId),
}

trait Line {
    const KIND: &'static str;
    fn id(&self) -> LineId;
    fn set_id(&mut self, id: LineId);
}

macro_rules! impl_line {
    ($ty:ty, $kind:literal) => {
        impl Line for $ty {
            const KIND: &'static str = $kind;
            fn id(&self) -> LineId {
                self.id
            }
            fn set_id(&mut self, id: LineId) {
                self.id = id;
            }
        }
    };
}

impl_line!(InfrastructureLine, "infrastructure");
impl_line!(HumanResourceLine, "human resource");
impl_line!(EquipmentLine, "equipment");
impl_line!(SupplyLine, "supply");

/// Apply an edit and return the resulting structure
pub fn apply(structure: &CostStructure, edit: Edit) -> Result<CostStructure, EditError> {
    let mut next = structure.clone();

    match edit {
        Edit::SetProcedure(procedure) => next.procedure = procedure,
        Edit::SetAnnualCosts(costs) => next.annual_services_cost = costs,

        Edit::AddInfrastructure(line) => {
            let id = allocate_id(&mut next);
            add(&mut next.infrastructures, line, id);
        }
        Edit::UpdateInfrastructure(line) => update(&mut next.infrastructures, line)?,
        Edit::RemoveInfrastructure(id) => remove(&mut next.infrastructures, id)?,

        Edit::AddHumanResource(line) => {
            let id = allocate_id(&mut next);
            add(&mut next.human_resources, line, id);
        }
        Edit::UpdateHumanResource(line) => update(&mut next.human_resources, line)?,
        Edit::RemoveHumanResource(id) => remove(&mut next.human_resources, id)?,

        Edit::AddEquipment(line) => {
            let id = allocate_id(&mut next);
            add(&mut next.equipment, line, id);
        }
        Edit::UpdateEquipment(line) => update(&mut next.equipment, line)?,
        Edit::RemoveEquipment(id) => remove(&mut next.equipment, id)?,

        Edit::AddSupply(line) => {
            let id = allocate_id(&mut next);
            add(&mut next.supplies, line, id);
        }
        Edit::UpdateSupply(line) => update(&mut next.supplies, line)?,
        Edit::RemoveSupply(id) => remove(&mut next.supplies, id)?,
    }

    Ok(next)
}

fn allocate_id(structure: &mut CostStructure) -> LineId {
    let id = LineId(structure.next_line_id);
    structure.next_line_id += 1;
    id
}

fn add<L: Line>(lines: &mut Vec<L>, mut line: L, id: LineId) {
    line.set_id(id);
    lines.push(line);
}

fn update<L: Line>(lines: &mut [L], line: L) -> Result<(), EditError> {
    let id = line.id();
    let slot = lines
        .iter_mut()
        .find(|l| l.id() == id)
        .ok_or(EditError::UnknownLine { kind: L::KIND, id })?;
    *slot = line;
    Ok(())
}

fn remove<L: Line>(lines: &mut Vec<L>, id: LineId) -> Result<(), EditError> {
    let index = lines
        .iter()
        .position(|l| l.id() == id)
        .ok_or(EditError::UnknownLine { kind: L::KIND, id })?;
    lines.remove(index);
    Ok(())
}
