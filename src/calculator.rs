//! Cost-structure calculator logic

use std::fmt;

use crate::formulas::{
    assigned_cost, assigned_cost_by_area, cost_per_minute_from_monthly_salary,
    depreciation_per_minute, inductor, line_cost, not_computable_as_zero, total_construction_value,
    total_inductor, unit_cost, unit_cost_from_acquisition, DEFAULT_SUPPLY_MINUTES,
};
use crate::models::{CostStructure, LineId};

/// Derived values for one infrastructure line
#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureCost {
    pub line: LineId,
    pub name: String,
    pub construction_value: f64,
    pub depreciation_per_minute: f64,
    pub depreciation_cost: f64,
    pub energy_inductor: f64,
    pub water_inductor: f64,
    pub phone_net_inductor: f64,
    pub energy_cost: f64,
    pub water_cost: f64,
    pub phone_net_cost: f64,
    pub administrative_cost: f64,
    pub general_cost: f64,
    /// Annual amount allocated to this UPSS
    pub total_allocated: f64,
    /// `total_allocated` spread over the projected production
    pub overhead_per_procedure: f64,
}

/// Derived values for a direct-resource line (human resource, equipment, supply)
#[derive(Debug, Clone, PartialEq)]
pub struct DirectCost {
    pub line: LineId,
    pub name: String,
    /// Cost per minute, depreciation per minute or cost per consumption unit
    pub rate: f64,
    pub standard_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    pub procedure: String,
    pub infrastructures: Vec<InfrastructureCost>,
    pub human_resources: Vec<DirectCost>,
    pub equipment: Vec<DirectCost>,
    pub supplies: Vec<DirectCost>,
    pub total_depreciation: f64,
    pub total_overhead: f64,
    pub total_human_resources: f64,
    pub total_equipment: f64,
    pub total_supplies: f64,
    /// Costo Estandar (S/.)
    pub standard_cost: f64,
}

/// Compute every derived value of a cost structure from scratch
pub fn calculate(structure: &CostStructure) -> CostBreakdown {
    let infrastructures = calculate_infrastructures(structure);

    let human_resources: Vec<DirectCost> = structure
        .human_resources
        .iter()
        .map(|l| {
            let rate = cost_per_minute_from_monthly_salary(l.price_month.value());
            DirectCost {
                line: l.id,
                name: l.name.clone(),
                rate,
                standard_cost: line_cost(rate, l.quantity.value(), l.time_minutes.value()),
            }
        })
        .collect();

    let equipment: Vec<DirectCost> = structure
        .equipment
        .iter()
        .map(|l| {
            let rate = depreciation_per_minute(l.useful_years.value(), l.price.value());
            DirectCost {
                line: l.id,
                name: l.name.clone(),
                rate,
                standard_cost: line_cost(rate, l.quantity.value(), l.time_minutes.value()),
            }
        })
        .collect();

    let supplies: Vec<DirectCost> = structure
        .supplies
        .iter()
        .map(|l| {
            let rate =
                unit_cost_from_acquisition(l.adquisition_price.value(), l.equivalence.value());
            let minutes = l
                .time_minutes
                .map_or(DEFAULT_SUPPLY_MINUTES, |t| t.value());
            DirectCost {
                line: l.id,
                name: l.name.clone(),
                rate,
                standard_cost: line_cost(rate, l.quantity_used.value(), minutes),
            }
        })
        .collect();

    let total_depreciation: f64 = infrastructures.iter().map(|i| i.depreciation_cost).sum();
    let total_overhead: f64 = infrastructures
        .iter()
        .map(|i| i.overhead_per_procedure)
        .sum();
    let total_human_resources = sum_standard(&human_resources);
    let total_equipment = sum_standard(&equipment);
    let total_supplies = sum_standard(&supplies);

    let standard_cost = total_supplies
        + total_equipment
        + total_human_resources
        + total_depreciation
        + total_overhead;

    let procedure = structure
        .procedure
        .as_ref()
        .map(|p| format!("{} {}", p.code, p.name_full))
        .unwrap_or_else(|| "(no procedure)".to_string());

    CostBreakdown {
        procedure,
        infrastructures,
        human_resources,
        equipment,
        supplies,
        total_depreciation,
        total_overhead,
        total_human_resources,
        total_equipment,
        total_supplies,
        standard_cost,
    }
}

fn sum_standard(lines: &[DirectCost]) -> f64 {
    lines.iter().map(|l| l.standard_cost).sum()
}

fn calculate_infrastructures(structure: &CostStructure) -> Vec<InfrastructureCost> {
    let lines = &structure.infrastructures;
    let annual = &structure.annual_services_cost;

    let total_area: f64 = lines.iter().map(|l| l.area_m2.value()).sum();

    let energy: Vec<f64> = lines
        .iter()
        .map(|l| inductor(l.energy_consumption.value(), total_area))
        .collect();
    let water: Vec<f64> = lines
        .iter()
        .map(|l| inductor(l.water_consumption.value(), total_area))
        .collect();
    let phone_net: Vec<f64> = lines
        .iter()
        .map(|l| inductor(l.phone_net_consumption.value(), total_area))
        .collect();

    let total_energy = total_inductor(&energy);
    let total_water = total_inductor(&water);
    let total_phone_net = total_inductor(&phone_net);

    lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let construction_value =
                total_construction_value(l.area_m2.value(), l.construction_cost.value());
            let dpm = depreciation_per_minute(l.useful_years.value(), construction_value);

            let energy_cost = assigned_cost(annual.energy.value(), total_energy, energy[i]);
            let water_cost = assigned_cost(annual.water.value(), total_water, water[i]);
            let phone_net_cost =
                assigned_cost(annual.phone_net.value(), total_phone_net, phone_net[i]);
            let administrative_cost = assigned_cost_by_area(
                annual.administrative.value(),
                total_area,
                l.area_m2.value(),
            );
            let general_cost =
                assigned_cost_by_area(annual.general.value(), total_area, l.area_m2.value());

            let total_allocated =
                energy_cost + water_cost + phone_net_cost + administrative_cost + general_cost;

            InfrastructureCost {
                line: l.id,
                name: l.name.clone(),
                construction_value,
                depreciation_per_minute: dpm,
                depreciation_cost: dpm * l.time_performance_minutes.value(),
                energy_inductor: energy[i],
                water_inductor: water[i],
                phone_net_inductor: phone_net[i],
                energy_cost,
                water_cost,
                phone_net_cost,
                administrative_cost,
                general_cost,
                total_allocated,
                overhead_per_procedure: not_computable_as_zero(unit_cost(
                    total_allocated,
                    l.production_projected.value(),
                )),
            }
        })
        .collect()
}

/// Format a breakdown line by line
pub fn format_breakdown(breakdown: &CostBreakdown) -> String {
    let mut output = String::new();

    if !breakdown.infrastructures.is_empty() {
        output.push_str("Infrastructure (UPSS):\n");
        for i in &breakdown.infrastructures {
            output.push_str(&format!(
                "  {} {}: value {:.2}, depreciation {:.8}/min -> {:.4}\n",
                i.line, i.name, i.construction_value, i.depreciation_per_minute, i.depreciation_cost
            ));
            output.push_str(&format!(
                "    inductors: energy {:.2}, water {:.2}, phone/net {:.2}\n",
                i.energy_inductor, i.water_inductor, i.phone_net_inductor
            ));
            output.push_str(&format!(
                "    allocated: energy {:.2}, water {:.2}, phone/net {:.2}, admin {:.2}, general {:.2} = {:.2}/year\n",
                i.energy_cost,
                i.water_cost,
                i.phone_net_cost,
                i.administrative_cost,
                i.general_cost,
                i.total_allocated
            ));
            output.push_str(&format!(
                "    overhead per procedure: {:.4}\n",
                i.overhead_per_procedure
            ));
        }
    }

    for (title, unit, lines) in [
        ("Human resources", "/min", &breakdown.human_resources),
        ("Equipment", "/min", &breakdown.equipment),
        ("Supplies", "/unit", &breakdown.supplies),
    ] {
        if lines.is_empty() {
            continue;
        }
        output.push_str(&format!("{}:\n", title));
        for l in lines {
            output.push_str(&format!(
                "  {} {}: {:.6}{} -> {:.4}\n",
                l.line, l.name, l.rate, unit, l.standard_cost
            ));
        }
    }

    output
}

impl fmt::Display for CostBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Cost Structure Summary ===")?;
        writeln!(f, "Procedure: {}", self.procedure)?;
        writeln!(f)?;

        writeln!(f, "Direct costs:")?;
        writeln!(f, "  Supplies:        {:.4}", self.total_supplies)?;
        writeln!(f, "  Equipment:       {:.4}", self.total_equipment)?;
        writeln!(f, "  Human resources: {:.4}", self.total_human_resources)?;
        writeln!(f)?;

        writeln!(f, "Infrastructure:")?;
        writeln!(f, "  Depreciation:    {:.4}", self.total_depreciation)?;
        writeln!(f, "  Overhead:        {:.4}", self.total_overhead)?;
        writeln!(f)?;

        writeln!(f, "Costo Estandar (S/.): {:.2}", self.standard_cost)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AnnualServiceCost, EquipmentLine, HumanResourceLine, InfrastructureLine, NonNegative,
        Procedure, Signed, SupplyLine,
    };

    fn nn(value: f64) -> NonNegative {
        NonNegative::new("test", value).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    fn infrastructure(id: u32, area: f64, energy: f64, production: f64) -> InfrastructureLine {
        InfrastructureLine {
            id: LineId(id),
            infrastructure_id: format!("UPSS-{}", id),
            name: format!("UPSS {}", id),
            area_m2: nn(area),
            construction_cost: nn(500.0),
            useful_years: nn(50.0),
            time_performance_minutes: nn(30.0),
            energy_consumption: nn(energy),
            water_consumption: nn(0.0),
            phone_net_consumption: nn(0.0),
            production_projected: nn(production),
        }
    }

    fn scenario() -> CostStructure {
        CostStructure {
            procedure: Some(Procedure {
                concept_id: "1234".to_string(),
                name_full: "Consulta externa".to_string(),
                code: "99203".to_string(),
            }),
            infrastructures: vec![
                infrastructure(0, 100.0, 10.0, 1000.0),
                infrastructure(1, 100.0, 30.0, 2000.0),
            ],
            annual_services_cost: AnnualServiceCost {
                energy: nn(8000.0),
                administrative: nn(10_000.0),
                ..AnnualServiceCost::default()
            },
            human_resources: vec![HumanResourceLine {
                id: LineId(2),
                human_resource_id: "MED-01".to_string(),
                name: "Physician".to_string(),
                quantity: nn(1.0),
                time_minutes: nn(20.0),
                price_month: nn(9000.0),
            }],
            equipment: vec![EquipmentLine {
                id: LineId(3),
                equipment_id: "EQ-ECG".to_string(),
                name: "ECG".to_string(),
                quantity: nn(2.0),
                price: nn(52_560.0),
                useful_years: nn(10.0),
                time_minutes: nn(15.0),
            }],
            supplies: vec![SupplyLine {
                id: LineId(4),
                supply_id: "SUP-GAUZE".to_string(),
                name: "Gauze".to_string(),
                supply_type: "material".to_string(),
                unit_acquisition: "box".to_string(),
                unit_consumption: "unit".to_string(),
                adquisition_price: nn(50.0),
                quantity_used: nn(3.0),
                equivalence: Signed::new("equivalence", 10.0).unwrap(),
                time_minutes: None,
                unit_cost: Signed::default(),
            }],
            next_line_id: 5,
        }
    }

    #[test]
    fn test_infrastructure_allocation() {
        let breakdown = calculate(&scenario());
        let [a, b] = &breakdown.infrastructures[..] else {
            panic!("expected two infrastructure lines");
        };

        // Total area is 200 m2 for both inductors
        assert_eq!(a.energy_inductor, 2000.0);
        assert_eq!(b.energy_inductor, 6000.0);
        assert_eq!(a.energy_cost, 2000.0);
        assert_eq!(b.energy_cost, 6000.0);

        assert_eq!(a.administrative_cost, 5000.0);
        assert_eq!(b.administrative_cost, 5000.0);
        assert_eq!(a.water_cost, 0.0);

        assert_eq!(a.total_allocated, 7000.0);
        assert_eq!(a.overhead_per_procedure, 7.0);
        assert_eq!(b.overhead_per_procedure, 5.5);

        assert_eq!(a.construction_value, 50_000.0);
        assert!((a.depreciation_cost - 0.057_077_63).abs() < 1e-8);
    }

    #[test]
    fn test_direct_costs() {
        let breakdown = calculate(&scenario());

        assert_eq!(breakdown.human_resources[0].rate, 1.0);
        assert_eq!(breakdown.total_human_resources, 20.0);

        // 52560 over 10 years is 0.01 per minute
        assert!(close(breakdown.equipment[0].rate, 0.01));
        assert!(close(breakdown.total_equipment, 0.3));

        assert_eq!(breakdown.supplies[0].rate, 5.0);
        assert_eq!(breakdown.total_supplies, 15.0);
    }

    #[test]
    fn test_standard_cost_sums_components() {
        let b = calculate(&scenario());
        let expected = b.total_supplies
            + b.total_equipment
            + b.total_human_resources
            + b.total_depreciation
            + b.total_overhead;
        assert_eq!(b.standard_cost, expected);
        assert!(close(b.total_overhead, 12.5));
        assert!(close(b.standard_cost, 15.0 + 0.3 + 20.0 + 2.0 * 0.057_077_625_570_776_25 + 12.5));
    }

    #[test]
    fn test_supply_time_is_used_when_present() {
        let mut structure = scenario();
        structure.supplies[0].time_minutes = Some(nn(4.0));
        assert_eq!(calculate(&structure).total_supplies, 60.0);
    }

    #[test]
    fn test_zero_production_renders_zero() {
        let mut structure = scenario();
        structure.infrastructures[0].production_projected = NonNegative::ZERO;
        let b = calculate(&structure);
        assert_eq!(b.infrastructures[0].overhead_per_procedure, 0.0);
        assert!(b.standard_cost.is_finite());
    }

    #[test]
    fn test_empty_structure_costs_nothing() {
        let b = calculate(&CostStructure::default());
        assert_eq!(b.standard_cost, 0.0);
        assert_eq!(b.procedure, "(no procedure)");
        assert_eq!(format_breakdown(&b), "");
    }

    #[test]
    fn test_equipment_without_useful_life_costs_nothing() {
        let mut structure = scenario();
        structure.equipment[0].useful_years = NonNegative::ZERO;
        assert_eq!(calculate(&structure).total_equipment, 0.0);
    }

    #[test]
    fn test_calculation_is_idempotent() {
        let structure = scenario();
        assert_eq!(calculate(&structure), calculate(&structure));
    }

    #[test]
    fn test_summary_display() {
        let text = calculate(&scenario()).to_string();
        assert!(text.contains("Procedure: 99203 Consulta externa"));
        assert!(text.contains("Supplies:        15.0000"));
        assert!(text.contains("Costo Estandar (S/.): 47.91"));
    }

    #[test]
    fn test_format_breakdown_lists_lines() {
        let text = format_breakdown(&calculate(&scenario()));
        assert!(text.contains("Infrastructure (UPSS):"));
        assert!(text.contains("#4 Gauze: 5.000000/unit -> 15.0000"));
        assert!(text.contains("overhead per procedure: 5.5000"));
    }
}
