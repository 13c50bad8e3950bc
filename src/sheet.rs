//! Cost sheet parsing
//!
//! A cost sheet is a plain-text description of one procedure costing, one
//! record per line:
//!
//! ```text
//! procedure: code=99203
//! annual: energy=8000 administrative=20000
//! infrastructure: id=UPSS-CE area=100 minutes=30 energy=10 production=1000
//! supply: id=SUP-GAUZE used=3
//! ```
//!
//! Attributes a sheet leaves out (names, useful life, prices, units) are
//! seeded from the reference catalog entry with the same id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use thiserror::Error;
use walkdir::WalkDir;

use crate::calculator;
use crate::db;
use crate::editor::{self, Edit};
use crate::formulas::unit_cost_from_acquisition;
use crate::models::{
    AnnualServiceCost, CostStructure, EquipmentLine, HumanResourceLine, InfrastructureLine,
    LineId, NonNegative, Procedure, Signed, SupplyLine,
};
use crate::validation::{self, ValidationError};

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("line {line}: cannot read record: {text}")]
    Malformed { line: usize, text: String },

    #[error("line {line}: unknown record '{record}'")]
    UnknownRecord { line: usize, record: String },

    #[error("line {line}: '{record}' may only appear once")]
    Duplicate { line: usize, record: String },

    #[error("line {line}: unknown field '{field}'")]
    UnknownField { line: usize, field: String },

    #[error("line {line}: missing field '{field}'")]
    MissingField { line: usize, field: String },

    #[error("line {line}: '{value}' is not a number ({field})")]
    InvalidNumber {
        line: usize,
        field: String,
        value: String,
    },

    #[error("line {line}: {source}")]
    InvalidAmount {
        line: usize,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

const PROCEDURE_FIELDS: &[&str] = &["concept", "code", "name"];
const ANNUAL_FIELDS: &[&str] = &["energy", "water", "phone", "administrative", "general"];
const INFRASTRUCTURE_FIELDS: &[&str] = &[
    "id",
    "name",
    "area",
    "construction",
    "useful_years",
    "minutes",
    "energy",
    "water",
    "phone",
    "production",
];
const HUMAN_RESOURCE_FIELDS: &[&str] = &["id", "name", "quantity", "minutes", "month"];
const EQUIPMENT_FIELDS: &[&str] = &["id", "name", "quantity", "price", "useful_years", "minutes"];
const SUPPLY_FIELDS: &[&str] = &[
    "id",
    "name",
    "type",
    "unit_acquisition",
    "unit_consumption",
    "price",
    "equivalence",
    "used",
    "minutes",
    "unit_cost",
];

/// One `name: key=value ...` line of a sheet
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub line: usize,
    pub fields: HashMap<String, String>,
}

impl Record {
    fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn required_text(&self, key: &str) -> Result<&str, SheetError> {
        self.text(key).ok_or_else(|| SheetError::MissingField {
            line: self.line,
            field: key.to_string(),
        })
    }

    fn number(&self, key: &str) -> Result<Option<f64>, SheetError> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| SheetError::InvalidNumber {
                    line: self.line,
                    field: key.to_string(),
                    value: raw.clone(),
                }),
        }
    }

    /// Amount from the sheet, else from the catalog, else an error
    fn amount(&self, key: &str, catalog: Option<f64>) -> Result<NonNegative, SheetError> {
        let value = self
            .number(key)?
            .or(catalog)
            .ok_or_else(|| SheetError::MissingField {
                line: self.line,
                field: key.to_string(),
            })?;
        self.checked(key, value)
    }

    fn amount_or(&self, key: &str, default: f64) -> Result<NonNegative, SheetError> {
        let value = self.number(key)?.unwrap_or(default);
        self.checked(key, value)
    }

    fn checked(&self, key: &str, value: f64) -> Result<NonNegative, SheetError> {
        NonNegative::new(key, value).map_err(|source| SheetError::InvalidAmount {
            line: self.line,
            source,
        })
    }

    fn signed(&self, key: &str, value: f64) -> Result<Signed, SheetError> {
        Signed::new(key, value).map_err(|source| SheetError::InvalidAmount {
            line: self.line,
            source,
        })
    }
}

/// A parsed sheet whose lines have not been resolved against the catalog yet
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetDraft {
    pub procedure: Option<Record>,
    pub annual: Option<Record>,
    pub infrastructures: Vec<Record>,
    pub human_resources: Vec<Record>,
    pub equipment: Vec<Record>,
    pub supplies: Vec<Record>,
}

/// Parse sheet text into records
pub fn parse_sheet(content: &str) -> Result<SheetDraft, SheetError> {
    let record_re = Regex::new(r"^([a-z_]+)\s*:(.*)$")?;
    // key=value or key="quoted value"
    let field_re = Regex::new(r#"^\s*([a-z_]+)\s*=\s*(?:"([^"]*)"|([^\s"]+))"#)?;

    let mut draft = SheetDraft::default();

    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let cap = record_re.captures(text).ok_or_else(|| SheetError::Malformed {
            line,
            text: text.to_string(),
        })?;
        let name = cap[1].to_string();
        let mut rest = cap.get(2).map_or("", |m| m.as_str());

        let mut record = Record {
            line,
            fields: HashMap::new(),
        };
        while !rest.trim().is_empty() {
            let field = field_re.captures(rest).ok_or_else(|| SheetError::Malformed {
                line,
                text: rest.trim().to_string(),
            })?;
            let value = field
                .get(2)
                .or_else(|| field.get(3))
                .map_or("", |m| m.as_str());
            record.fields.insert(field[1].to_string(), value.to_string());
            rest = &rest[field[0].len()..];
        }

        let allowed = match name.as_str() {
            "procedure" => PROCEDURE_FIELDS,
            "annual" => ANNUAL_FIELDS,
            "infrastructure" => INFRASTRUCTURE_FIELDS,
            "human_resource" => HUMAN_RESOURCE_FIELDS,
            "equipment" => EQUIPMENT_FIELDS,
            "supply" => SUPPLY_FIELDS,
            _ => return Err(SheetError::UnknownRecord { line, record: name.clone() }),
        };
        if let Some(unknown) = record.fields.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(SheetError::UnknownField {
                line,
                field: unknown.clone(),
            });
        }

        match name.as_str() {
            "procedure" | "annual" => {
                let slot = if name == "procedure" {
                    &mut draft.procedure
                } else {
                    &mut draft.annual
                };
                if slot.is_some() {
                    return Err(SheetError::Duplicate { line, record: name.clone() });
                }
                *slot = Some(record);
            }
            "infrastructure" => draft.infrastructures.push(record),
            "human_resource" => draft.human_resources.push(record),
            "equipment" => draft.equipment.push(record),
            _ => draft.supplies.push(record),
        }
    }

    Ok(draft)
}

/// Build a cost structure from a draft, seeding omitted attributes from the catalog
pub fn resolve(conn: &Connection, draft: &SheetDraft) -> Result<CostStructure> {
    let mut structure = CostStructure::default();

    if let Some(record) = &draft.procedure {
        let key = record
            .text("concept")
            .or_else(|| record.text("code"))
            .ok_or_else(|| SheetError::MissingField {
                line: record.line,
                field: "code".to_string(),
            })?;
        let catalog = db::get_procedure(conn, key)?;

        let concept_id = match (record.text("concept"), &catalog) {
            (Some(concept), _) => concept.to_string(),
            (None, Some(entry)) => entry.concept_id.clone(),
            (None, None) => String::new(),
        };
        let code = match (record.text("code"), &catalog) {
            (Some(code), _) => code.to_string(),
            (None, Some(entry)) => entry.code.clone(),
            (None, None) => record.required_text("code")?.to_string(),
        };
        let name_full = match (record.text("name"), &catalog) {
            (Some(name), _) => name.to_string(),
            (None, Some(entry)) => entry.name_full.clone(),
            (None, None) => record.required_text("name")?.to_string(),
        };

        structure = editor::apply(
            &structure,
            Edit::SetProcedure(Some(Procedure {
                concept_id,
                name_full,
                code,
            })),
        )?;
    }

    if let Some(record) = &draft.annual {
        let costs = AnnualServiceCost {
            energy: record.amount_or("energy", 0.0)?,
            water: record.amount_or("water", 0.0)?,
            phone_net: record.amount_or("phone", 0.0)?,
            administrative: record.amount_or("administrative", 0.0)?,
            general: record.amount_or("general", 0.0)?,
        };
        structure = editor::apply(&structure, Edit::SetAnnualCosts(costs))?;
    }

    for record in &draft.infrastructures {
        let id = record.required_text("id")?;
        let catalog = db::get_infrastructure(conn, id)?;
        let line = InfrastructureLine {
            id: LineId(0),
            infrastructure_id: id.to_string(),
            name: line_name(record, catalog.as_ref().map(|c| c.name.as_str()), id),
            area_m2: record.amount("area", None)?,
            construction_cost: record.amount(
                "construction",
                catalog.as_ref().and_then(|c| c.construction_cost_m2),
            )?,
            useful_years: record
                .amount("useful_years", catalog.as_ref().and_then(|c| c.useful_years))?,
            time_performance_minutes: record.amount_or("minutes", 0.0)?,
            energy_consumption: record.amount_or("energy", 0.0)?,
            water_consumption: record.amount_or("water", 0.0)?,
            phone_net_consumption: record.amount_or("phone", 0.0)?,
            production_projected: record.amount_or("production", 0.0)?,
        };
        structure = editor::apply(&structure, Edit::AddInfrastructure(line))?;
    }

    for record in &draft.human_resources {
        let id = record.required_text("id")?;
        let catalog = db::get_human_resource(conn, id)?;
        let line = HumanResourceLine {
            id: LineId(0),
            human_resource_id: id.to_string(),
            name: line_name(record, catalog.as_ref().map(|c| c.name.as_str()), id),
            quantity: record.amount_or("quantity", 1.0)?,
            time_minutes: record.amount("minutes", None)?,
            price_month: record.amount("month", catalog.as_ref().and_then(|c| c.price_month))?,
        };
        structure = editor::apply(&structure, Edit::AddHumanResource(line))?;
    }

    for record in &draft.equipment {
        let id = record.required_text("id")?;
        let catalog = db::get_equipment(conn, id)?;
        let line = EquipmentLine {
            id: LineId(0),
            equipment_id: id.to_string(),
            name: line_name(record, catalog.as_ref().map(|c| c.name.as_str()), id),
            quantity: record.amount_or("quantity", 1.0)?,
            price: record.amount("price", catalog.as_ref().and_then(|c| c.price))?,
            useful_years: record
                .amount("useful_years", catalog.as_ref().and_then(|c| c.useful_years))?,
            time_minutes: record.amount("minutes", None)?,
        };
        structure = editor::apply(&structure, Edit::AddEquipment(line))?;
    }

    for record in &draft.supplies {
        let id = record.required_text("id")?;
        let catalog = db::get_supply(conn, id)?;
        let equivalence = record
            .number("equivalence")?
            .or(catalog.as_ref().and_then(|c| c.equivalence))
            .ok_or_else(|| SheetError::MissingField {
                line: record.line,
                field: "equivalence".to_string(),
            })?;
        let adquisition_price = record
            .amount("price", catalog.as_ref().and_then(|c| c.adquisition_price))?;
        let unit_cost = match record.number("unit_cost")? {
            Some(stored) => stored,
            None => unit_cost_from_acquisition(adquisition_price.value(), equivalence),
        };
        let time_minutes = match record.number("minutes")? {
            Some(minutes) => Some(record.checked("minutes", minutes)?),
            None => None,
        };

        let line = SupplyLine {
            id: LineId(0),
            supply_id: id.to_string(),
            name: line_name(record, catalog.as_ref().map(|c| c.name.as_str()), id),
            supply_type: text_or(
                record,
                "type",
                catalog.as_ref().and_then(|c| c.supply_type.as_deref()),
            ),
            unit_acquisition: text_or(
                record,
                "unit_acquisition",
                catalog.as_ref().and_then(|c| c.unit_acquisition.as_deref()),
            ),
            unit_consumption: text_or(
                record,
                "unit_consumption",
                catalog.as_ref().and_then(|c| c.unit_consumption.as_deref()),
            ),
            adquisition_price,
            quantity_used: record.amount("used", None)?,
            equivalence: record.signed("equivalence", equivalence)?,
            time_minutes,
            unit_cost: record.signed("unit_cost", unit_cost)?,
        };
        structure = editor::apply(&structure, Edit::AddSupply(line))?;
    }

    Ok(structure)
}

fn text_or(record: &Record, key: &str, catalog: Option<&str>) -> String {
    record.text(key).or(catalog).unwrap_or_default().to_string()
}

fn line_name(record: &Record, catalog: Option<&str>, id: &str) -> String {
    record
        .text("name")
        .or(catalog)
        .unwrap_or(id)
        .to_string()
}

/// Read, parse and resolve one sheet file
pub fn load_sheet(conn: &Connection, path: &Path) -> Result<CostStructure> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let draft = parse_sheet(&content).with_context(|| format!("In {}", path.display()))?;
    resolve(conn, &draft).with_context(|| format!("In {}", path.display()))
}

/// Find all *.cost sheets under a directory, sorted by path
pub fn find_sheets(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sheets = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "cost") {
            sheets.push(path.to_path_buf());
        }
    }

    sheets.sort();
    Ok(sheets)
}

/// Calculate every sheet in a directory, reporting each result
pub fn calculate_directory(conn: &Connection, dir: &Path) -> Result<BatchStats> {
    let mut stats = BatchStats::default();

    println!("Scanning {} for cost sheets...", dir.display());
    let sheets = find_sheets(dir)?;
    println!("Found {} cost sheets", sheets.len());

    for path in &sheets {
        let outcome = load_sheet(conn, path).and_then(|structure| {
            validation::validate(&structure)?;
            Ok(calculator::calculate(&structure))
        });

        match outcome {
            Ok(breakdown) => {
                stats.calculated += 1;
                stats.lines += breakdown.infrastructures.len()
                    + breakdown.human_resources.len()
                    + breakdown.equipment.len()
                    + breakdown.supplies.len();
                println!(
                    "  {}: {} -> {:.2}",
                    path.display(),
                    breakdown.procedure,
                    breakdown.standard_cost
                );
            }
            Err(e) => {
                eprintln!("  Error in {}: {:#}", path.display(), e);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

#[derive(Debug, Default, PartialEq)]
pub struct BatchStats {
    pub calculated: usize,
    pub lines: usize,
    pub errors: usize,
}

impl std::fmt::Display for BatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Calculated {} cost structures ({} lines). Errors: {}",
            self.calculated, self.lines, self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogEquipment, CatalogInfrastructure, CatalogSupply};

    const SHEET: &str = r#"
# Outpatient consultation
procedure: concept=1234 code=99203 name="Consulta externa"
annual: energy=8000 administrative=10000

infrastructure: id=UPSS-CE area=100 construction=500 useful_years=50 minutes=30 energy=10 production=1000
infrastructure: id=UPSS-LAB area=100 construction=500 useful_years=50 energy=30 production=2000
human_resource: id=MED-01 name="Medico general" minutes=20 month=9000
equipment: id=EQ-ECG quantity=2 price=52560 useful_years=10 minutes=15
supply: id=SUP-GAUZE name=Gauze price=50 equivalence=10 used=3
"#;

    fn catalog() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        db::upsert_procedure(
            &conn,
            &Procedure {
                concept_id: "1234".to_string(),
                name_full: "Consulta externa".to_string(),
                code: "99203".to_string(),
            },
        )
        .unwrap();
        db::upsert_infrastructure(
            &conn,
            &CatalogInfrastructure {
                id: "UPSS-CE".to_string(),
                name: "Consultorio externo".to_string(),
                useful_years: Some(50.0),
                construction_cost_m2: Some(500.0),
            },
        )
        .unwrap();
        db::upsert_equipment(
            &conn,
            &CatalogEquipment {
                id: "EQ-ECG".to_string(),
                name: "Electrocardiografo".to_string(),
                useful_years: Some(10.0),
                price: Some(52_560.0),
            },
        )
        .unwrap();
        db::upsert_supply(
            &conn,
            &CatalogSupply {
                id: "SUP-GAUZE".to_string(),
                name: "Gasa".to_string(),
                supply_type: Some("material".to_string()),
                unit_acquisition: Some("caja".to_string()),
                unit_consumption: Some("unidad".to_string()),
                adquisition_price: Some(50.0),
                equivalence: Some(10.0),
            },
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_parse_sheet_records() {
        let draft = parse_sheet(SHEET).unwrap();
        assert_eq!(draft.infrastructures.len(), 2);
        assert_eq!(draft.human_resources.len(), 1);
        assert_eq!(draft.equipment.len(), 1);
        assert_eq!(draft.supplies.len(), 1);

        let procedure = draft.procedure.unwrap();
        assert_eq!(procedure.line, 3);
        assert_eq!(procedure.text("name"), Some("Consulta externa"));
        assert_eq!(draft.human_resources[0].text("name"), Some("Medico general"));
    }

    #[test]
    fn test_parse_errors_carry_line_numbers() {
        let err = parse_sheet("procedure: code=1\nbogus: x=1").unwrap_err();
        assert_eq!(err.to_string(), "line 2: unknown record 'bogus'");

        let err = parse_sheet("supply: id=A colour=red").unwrap_err();
        assert_eq!(err.to_string(), "line 1: unknown field 'colour'");

        let err = parse_sheet("annual: energy=1\nannual: water=2").unwrap_err();
        assert_eq!(err.to_string(), "line 2: 'annual' may only appear once");

        let err = parse_sheet("just some words").unwrap_err();
        assert!(matches!(err, SheetError::Malformed { line: 1, .. }));

        let err = parse_sheet("supply: id=A name=\"unterminated").unwrap_err();
        assert!(matches!(err, SheetError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_resolve_full_sheet() {
        let conn = catalog();
        let structure = resolve(&conn, &parse_sheet(SHEET).unwrap()).unwrap();

        assert_eq!(structure.infrastructures.len(), 2);
        assert_eq!(structure.infrastructures[0].name, "Consultorio externo");
        // Not in the catalog, so the id doubles as the name
        assert_eq!(structure.infrastructures[1].name, "UPSS-LAB");
        assert_eq!(structure.supplies[0].name, "Gauze");
        assert_eq!(structure.supplies[0].unit_cost.value(), 5.0);
        assert!(structure.supplies[0].time_minutes.is_none());

        let ids: Vec<u32> = structure
            .infrastructures
            .iter()
            .map(|l| l.id.0)
            .chain(structure.supplies.iter().map(|l| l.id.0))
            .collect();
        assert_eq!(ids, vec![0, 1, 4]);

        validation::validate(&structure).unwrap();
        let breakdown = calculator::calculate(&structure);
        assert_eq!(breakdown.total_overhead, 12.5);
        assert_eq!(breakdown.total_supplies, 15.0);
    }

    #[test]
    fn test_resolve_seeds_from_catalog() {
        let conn = catalog();
        let sheet = "procedure: code=99203\n\
                     infrastructure: id=UPSS-CE area=100 minutes=30\n\
                     equipment: id=EQ-ECG minutes=15\n\
                     supply: id=SUP-GAUZE used=3";
        let structure = resolve(&conn, &parse_sheet(sheet).unwrap()).unwrap();

        let procedure = structure.procedure.as_ref().unwrap();
        assert_eq!(procedure.concept_id, "1234");
        assert_eq!(procedure.name_full, "Consulta externa");

        assert_eq!(structure.infrastructures[0].useful_years.value(), 50.0);
        assert_eq!(structure.infrastructures[0].construction_cost.value(), 500.0);
        assert_eq!(structure.equipment[0].price.value(), 52_560.0);
        assert_eq!(structure.equipment[0].quantity.value(), 1.0);

        let supply = &structure.supplies[0];
        assert_eq!(supply.name, "Gasa");
        assert_eq!(supply.unit_acquisition, "caja");
        assert_eq!(supply.equivalence.value(), 10.0);
        assert_eq!(supply.adquisition_price.value(), 50.0);
    }

    #[test]
    fn test_resolve_reports_missing_attribute() {
        let conn = catalog();
        let sheet = "equipment: id=EQ-UNKNOWN price=100 minutes=5";
        let err = resolve(&conn, &parse_sheet(sheet).unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "line 1: missing field 'useful_years'");
    }

    #[test]
    fn test_resolve_rejects_negative_amount() {
        let conn = catalog();
        let sheet = "human_resource: id=MED-01 minutes=-5 month=9000";
        let err = resolve(&conn, &parse_sheet(sheet).unwrap()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 1: minutes must not be negative (got -5)"
        );

        let sheet = "human_resource: id=MED-01 minutes=abc month=9000";
        let err = resolve(&conn, &parse_sheet(sheet).unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "line 1: 'abc' is not a number (minutes)");
    }

    #[test]
    fn test_negative_equivalence_is_accepted() {
        let conn = catalog();
        let sheet = "supply: id=SUP-X price=10 equivalence=-2 used=1";
        let structure = resolve(&conn, &parse_sheet(sheet).unwrap()).unwrap();
        assert_eq!(structure.supplies[0].equivalence.value(), -2.0);
        assert_eq!(calculator::calculate(&structure).total_supplies, 0.0);
    }

    #[test]
    fn test_calculate_directory() {
        let dir = std::env::temp_dir().join(format!("procedure-costing-{}", std::process::id()));
        let nested = dir.join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.join("consulta.cost"), SHEET).unwrap();
        fs::write(nested.join("broken.cost"), "bogus: x=1").unwrap();
        fs::write(nested.join("notes.txt"), "not a sheet").unwrap();

        let sheets = find_sheets(&dir).unwrap();
        assert_eq!(sheets.len(), 2);

        let conn = catalog();
        let stats = calculate_directory(&conn, &dir).unwrap();
        assert_eq!(
            stats,
            BatchStats {
                calculated: 1,
                lines: 5,
                errors: 1
            }
        );
        assert_eq!(
            stats.to_string(),
            "Calculated 1 cost structures (5 lines). Errors: 1"
        );

        fs::remove_dir_all(&dir).unwrap();
    }
}
