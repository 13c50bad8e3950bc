//! Data models for procedure cost structures and the reference catalog

use std::fmt;

use crate::validation::ValidationError;

/// A finite amount that is never negative (prices, quantities, areas, minutes)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct NonNegative(f64);

impl NonNegative {
    pub const ZERO: NonNegative = NonNegative(0.0);

    pub fn new(field: &str, value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NotFinite {
                field: field.to_string(),
            });
        }
        if value < 0.0 {
            return Err(ValidationError::Negative {
                field: field.to_string(),
                value,
            });
        }
        Ok(NonNegative(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for NonNegative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A finite amount of either sign.
///
/// Used for supply `equivalence` and stored `unit_cost`, which the form
/// accepts without a sign constraint.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Signed(f64);

impl Signed {
    pub fn new(field: &str, value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NotFinite {
                field: field.to_string(),
            });
        }
        Ok(Signed(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Stable identifier of a line inside one cost structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(pub u32);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    pub concept_id: String,
    pub name_full: String,
    pub code: String,
}

/// One UPSS used by the procedure, together with its public-service consumption
#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureLine {
    pub id: LineId,
    pub infrastructure_id: String,
    pub name: String,
    pub area_m2: NonNegative,
    pub construction_cost: NonNegative, // per m2
    pub useful_years: NonNegative,
    pub time_performance_minutes: NonNegative,
    pub energy_consumption: NonNegative,
    pub water_consumption: NonNegative,
    pub phone_net_consumption: NonNegative,
    /// Projected annual count of procedures performed at this UPSS
    pub production_projected: NonNegative,
}

/// Shared annual costs, one set per cost structure
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnnualServiceCost {
    pub energy: NonNegative,
    pub water: NonNegative,
    pub phone_net: NonNegative,
    pub administrative: NonNegative,
    pub general: NonNegative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HumanResourceLine {
    pub id: LineId,
    pub human_resource_id: String,
    pub name: String,
    pub quantity: NonNegative,
    pub time_minutes: NonNegative,
    pub price_month: NonNegative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentLine {
    pub id: LineId,
    pub equipment_id: String,
    pub name: String,
    pub quantity: NonNegative,
    pub price: NonNegative,
    pub useful_years: NonNegative,
    pub time_minutes: NonNegative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupplyLine {
    pub id: LineId,
    pub supply_id: String,
    pub name: String,
    pub supply_type: String,
    pub unit_acquisition: String,
    pub unit_consumption: String,
    pub adquisition_price: NonNegative,
    pub quantity_used: NonNegative,
    /// Consumption units per acquisition unit
    pub equivalence: Signed,
    /// None for supplies consumed per occurrence
    pub time_minutes: Option<NonNegative>,
    pub unit_cost: Signed,
}

/// Aggregate root for one procedure costing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CostStructure {
    pub procedure: Option<Procedure>,
    pub infrastructures: Vec<InfrastructureLine>,
    pub annual_services_cost: AnnualServiceCost,
    pub human_resources: Vec<HumanResourceLine>,
    pub equipment: Vec<EquipmentLine>,
    pub supplies: Vec<SupplyLine>,
    pub next_line_id: u32,
}

// --- Reference catalog entries ---

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogInfrastructure {
    pub id: String,
    pub name: String,
    pub useful_years: Option<f64>,
    pub construction_cost_m2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEquipment {
    pub id: String,
    pub name: String,
    pub useful_years: Option<f64>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogHumanResource {
    pub id: String,
    pub name: String,
    pub price_month: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSupply {
    pub id: String,
    pub name: String,
    pub supply_type: Option<String>,
    pub unit_acquisition: Option<String>,
    pub unit_consumption: Option<String>,
    pub adquisition_price: Option<f64>,
    pub equivalence: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_negative_rejects_negative_and_non_finite() {
        assert_eq!(NonNegative::new("area", 12.5).unwrap().value(), 12.5);
        assert_eq!(NonNegative::new("area", 0.0).unwrap(), NonNegative::ZERO);
        assert_eq!(
            NonNegative::new("area", -1.0),
            Err(ValidationError::Negative {
                field: "area".to_string(),
                value: -1.0
            })
        );
        assert!(matches!(
            NonNegative::new("area", f64::INFINITY),
            Err(ValidationError::NotFinite { .. })
        ));
    }

    #[test]
    fn test_signed_accepts_negative() {
        assert_eq!(Signed::new("equivalence", -3.0).unwrap().value(), -3.0);
        assert!(Signed::new("equivalence", f64::NAN).is_err());
    }

    #[test]
    fn test_empty_structure() {
        let structure = CostStructure::default();
        assert!(structure.procedure.is_none());
        assert!(structure.infrastructures.is_empty());
        assert_eq!(structure.annual_services_cost.energy.value(), 0.0);
    }
}
