//! Procedure Costing
//!
//! Command-line front end for the procedure cost-structure calculator.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;

use procedure_costing::models::{
    CatalogEquipment, CatalogHumanResource, CatalogInfrastructure, CatalogSupply, Procedure,
};
use procedure_costing::{calculator, db, sheet, validation};

#[derive(Parser)]
#[command(name = "procedure-costing")]
#[command(about = "Cost-structure calculator for clinical procedures")]
struct Cli {
    /// Path to the SQLite reference catalog
    #[arg(short, long, default_value = "costing_catalog.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize an empty catalog
    Init,

    /// Replace the catalog with sample reference data
    LoadSample,

    /// List catalog entries
    Catalog {
        #[arg(value_enum, default_value = "procedures")]
        kind: CatalogKind,
    },

    /// Calculate the standard cost of a procedure from a cost sheet
    Calc {
        /// Path to a .cost sheet
        path: PathBuf,

        /// Show the per-line breakdown
        #[arg(short, long)]
        verbose: bool,
    },

    /// Calculate every .cost sheet under a directory
    Batch {
        /// Directory to scan
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CatalogKind {
    Procedures,
    Infrastructures,
    Equipment,
    HumanResources,
    Supplies,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Catalog initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample catalog loaded successfully!");
        }

        Commands::Catalog { kind } => print_catalog(&conn, kind)?,

        Commands::Calc { path, verbose } => {
            let structure = sheet::load_sheet(&conn, &path)?;
            validation::validate(&structure)
                .with_context(|| format!("{} is not complete", path.display()))?;

            let breakdown = calculator::calculate(&structure);

            if verbose {
                println!("Cost breakdown:\n");
                println!("{}", calculator::format_breakdown(&breakdown));
            }

            println!("{}", breakdown);
        }

        Commands::Batch { dir } => {
            let stats = sheet::calculate_directory(&conn, &dir)?;
            println!("\n{}", stats);
        }
    }

    Ok(())
}

fn print_catalog(conn: &Connection, kind: CatalogKind) -> Result<()> {
    let empty_hint = "Catalog is empty. Run 'load-sample' first.";

    match kind {
        CatalogKind::Procedures => {
            let procedures = db::list_procedures(conn)?;
            if procedures.is_empty() {
                println!("{}", empty_hint);
                return Ok(());
            }
            println!("{:<12} {:<10} {}", "Concept", "Code", "Name");
            println!("{}", "-".repeat(52));
            for p in procedures {
                println!("{:<12} {:<10} {}", p.concept_id, p.code, p.name_full);
            }
        }

        CatalogKind::Infrastructures => {
            let entries = db::list_infrastructures(conn)?;
            if entries.is_empty() {
                println!("{}", empty_hint);
                return Ok(());
            }
            println!("{:<12} {:<30} {:>8} {:>12}", "Id", "Name", "Years", "Cost/m2");
            println!("{}", "-".repeat(65));
            for e in entries {
                println!(
                    "{:<12} {:<30} {:>8} {:>12}",
                    e.id,
                    e.name,
                    optional(e.useful_years),
                    optional(e.construction_cost_m2)
                );
            }
        }

        CatalogKind::Equipment => {
            let entries = db::list_equipment(conn)?;
            if entries.is_empty() {
                println!("{}", empty_hint);
                return Ok(());
            }
            println!("{:<12} {:<30} {:>8} {:>12}", "Id", "Name", "Years", "Price");
            println!("{}", "-".repeat(65));
            for e in entries {
                println!(
                    "{:<12} {:<30} {:>8} {:>12}",
                    e.id,
                    e.name,
                    optional(e.useful_years),
                    optional(e.price)
                );
            }
        }

        CatalogKind::HumanResources => {
            let entries = db::list_human_resources(conn)?;
            if entries.is_empty() {
                println!("{}", empty_hint);
                return Ok(());
            }
            println!("{:<12} {:<30} {:>12}", "Id", "Name", "Month");
            println!("{}", "-".repeat(56));
            for e in entries {
                println!("{:<12} {:<30} {:>12}", e.id, e.name, optional(e.price_month));
            }
        }

        CatalogKind::Supplies => {
            let entries = db::list_supplies(conn)?;
            if entries.is_empty() {
                println!("{}", empty_hint);
                return Ok(());
            }
            println!(
                "{:<12} {:<24} {:>10} {:>6} {}",
                "Id", "Name", "Price", "Equiv", "Units"
            );
            println!("{}", "-".repeat(70));
            for e in entries {
                println!(
                    "{:<12} {:<24} {:>10} {:>6} {} -> {}",
                    e.id,
                    e.name,
                    optional(e.adquisition_price),
                    optional(e.equivalence),
                    e.unit_acquisition.as_deref().unwrap_or("?"),
                    e.unit_consumption.as_deref().unwrap_or("?")
                );
            }
        }
    }

    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Load a sample catalog for trying sheets out
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_catalog(conn)?;

    let procedures = [
        ("1234", "99203", "Consulta ambulatoria para evaluacion de paciente nuevo"),
        ("1301", "59400", "Atencion de parto vaginal"),
        ("1422", "90471", "Administracion de vacuna"),
    ];
    for (concept_id, code, name_full) in procedures {
        db::upsert_procedure(
            conn,
            &Procedure {
                concept_id: concept_id.to_string(),
                name_full: name_full.to_string(),
                code: code.to_string(),
            },
        )?;
    }

    let infrastructures = [
        ("UPSS-CE", "Consulta externa", 50.0, 500.0),
        ("UPSS-CO", "Centro obstetrico", 50.0, 750.0),
        ("UPSS-LAB", "Patologia clinica", 50.0, 620.0),
    ];
    for (id, name, years, cost) in infrastructures {
        db::upsert_infrastructure(
            conn,
            &CatalogInfrastructure {
                id: id.to_string(),
                name: name.to_string(),
                useful_years: Some(years),
                construction_cost_m2: Some(cost),
            },
        )?;
    }

    let equipment = [
        ("EQ-ECG", "Electrocardiografo", 10.0, 12_000.0),
        ("EQ-TENS", "Tensiometro", 5.0, 350.0),
        ("EQ-DOPP", "Doppler fetal", 8.0, 1_800.0),
    ];
    for (id, name, years, price) in equipment {
        db::upsert_equipment(
            conn,
            &CatalogEquipment {
                id: id.to_string(),
                name: name.to_string(),
                useful_years: Some(years),
                price: Some(price),
            },
        )?;
    }

    let human_resources = [
        ("MED-01", "Medico general", 9_000.0),
        ("OBS-01", "Obstetra", 6_300.0),
        ("ENF-01", "Enfermera", 5_400.0),
    ];
    for (id, name, month) in human_resources {
        db::upsert_human_resource(
            conn,
            &CatalogHumanResource {
                id: id.to_string(),
                name: name.to_string(),
                price_month: Some(month),
            },
        )?;
    }

    let supplies = [
        ("SUP-GAUZE", "Gasa esteril", "material", "caja", "unidad", 50.0, 10.0),
        ("SUP-GLOVE", "Guantes de examen", "material", "caja", "par", 32.0, 50.0),
        ("SUP-SYR", "Jeringa 5 ml", "material", "caja", "unidad", 45.0, 100.0),
    ];
    for (id, name, kind, acquisition, consumption, price, equivalence) in supplies {
        db::upsert_supply(
            conn,
            &CatalogSupply {
                id: id.to_string(),
                name: name.to_string(),
                supply_type: Some(kind.to_string()),
                unit_acquisition: Some(acquisition.to_string()),
                unit_consumption: Some(consumption.to_string()),
                adquisition_price: Some(price),
                equivalence: Some(equivalence),
            },
        )?;
    }

    println!(
        "Loaded {} procedures, {} infrastructures, {} equipment, {} human resources, {} supplies",
        procedures.len(),
        infrastructures.len(),
        equipment.len(),
        human_resources.len(),
        supplies.len()
    );
    Ok(())
}
