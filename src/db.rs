//! Reference catalog schema and operations

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::{
    CatalogEquipment, CatalogHumanResource, CatalogInfrastructure, CatalogSupply, Procedure,
};

/// Initialize the catalog schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Procedures that can be costed
        CREATE TABLE IF NOT EXISTS procedures (
            concept_id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name_full TEXT NOT NULL
        );

        -- Health-service production units (UPSS)
        CREATE TABLE IF NOT EXISTS infrastructures (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            useful_years REAL,
            construction_cost_m2 REAL
        );

        CREATE TABLE IF NOT EXISTS equipment (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            useful_years REAL,
            price REAL
        );

        CREATE TABLE IF NOT EXISTS human_resources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            price_month REAL
        );

        -- Supplies, bought in acquisition units and consumed in consumption units
        CREATE TABLE IF NOT EXISTS supplies (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            supply_type TEXT,
            unit_acquisition TEXT,
            unit_consumption TEXT,
            adquisition_price REAL,
            equivalence REAL
        );

        CREATE INDEX IF NOT EXISTS idx_procedures_code ON procedures(code);
        "#,
    )?;
    Ok(())
}

/// Clear the whole catalog (before reloading)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM supplies;
        DELETE FROM human_resources;
        DELETE FROM equipment;
        DELETE FROM infrastructures;
        DELETE FROM procedures;
        "#,
    )?;
    Ok(())
}

pub fn upsert_procedure(conn: &Connection, procedure: &Procedure) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO procedures (concept_id, code, name_full) VALUES (?1, ?2, ?3)",
        (&procedure.concept_id, &procedure.code, &procedure.name_full),
    )?;
    Ok(())
}

pub fn upsert_infrastructure(conn: &Connection, entry: &CatalogInfrastructure) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO infrastructures (id, name, useful_years, construction_cost_m2)
         VALUES (?1, ?2, ?3, ?4)",
        (
            &entry.id,
            &entry.name,
            entry.useful_years,
            entry.construction_cost_m2,
        ),
    )?;
    Ok(())
}

pub fn upsert_equipment(conn: &Connection, entry: &CatalogEquipment) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO equipment (id, name, useful_years, price) VALUES (?1, ?2, ?3, ?4)",
        (&entry.id, &entry.name, entry.useful_years, entry.price),
    )?;
    Ok(())
}

pub fn upsert_human_resource(conn: &Connection, entry: &CatalogHumanResource) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO human_resources (id, name, price_month) VALUES (?1, ?2, ?3)",
        (&entry.id, &entry.name, entry.price_month),
    )?;
    Ok(())
}

pub fn upsert_supply(conn: &Connection, entry: &CatalogSupply) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO supplies
            (id, name, supply_type, unit_acquisition, unit_consumption, adquisition_price, equivalence)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            &entry.id,
            &entry.name,
            &entry.supply_type,
            &entry.unit_acquisition,
            &entry.unit_consumption,
            entry.adquisition_price,
            entry.equivalence,
        ),
    )?;
    Ok(())
}

fn procedure_from_row(row: &Row) -> rusqlite::Result<Procedure> {
    Ok(Procedure {
        concept_id: row.get(0)?,
        code: row.get(1)?,
        name_full: row.get(2)?,
    })
}

fn infrastructure_from_row(row: &Row) -> rusqlite::Result<CatalogInfrastructure> {
    Ok(CatalogInfrastructure {
        id: row.get(0)?,
        name: row.get(1)?,
        useful_years: row.get(2)?,
        construction_cost_m2: row.get(3)?,
    })
}

fn equipment_from_row(row: &Row) -> rusqlite::Result<CatalogEquipment> {
    Ok(CatalogEquipment {
        id: row.get(0)?,
        name: row.get(1)?,
        useful_years: row.get(2)?,
        price: row.get(3)?,
    })
}

fn human_resource_from_row(row: &Row) -> rusqlite::Result<CatalogHumanResource> {
    Ok(CatalogHumanResource {
        id: row.get(0)?,
        name: row.get(1)?,
        price_month: row.get(2)?,
    })
}

fn supply_from_row(row: &Row) -> rusqlite::Result<CatalogSupply> {
    Ok(CatalogSupply {
        id: row.get(0)?,
        name: row.get(1)?,
        supply_type: row.get(2)?,
        unit_acquisition: row.get(3)?,
        unit_consumption: row.get(4)?,
        adquisition_price: row.get(5)?,
        equivalence: row.get(6)?,
    })
}

const PROCEDURE_COLUMNS: &str = "concept_id, code, name_full";
const INFRASTRUCTURE_COLUMNS: &str = "id, name, useful_years, construction_cost_m2";
const EQUIPMENT_COLUMNS: &str = "id, name, useful_years, price";
const HUMAN_RESOURCE_COLUMNS: &str = "id, name, price_month";
const SUPPLY_COLUMNS: &str =
    "id, name, supply_type, unit_acquisition, unit_consumption, adquisition_price, equivalence";

/// Find a procedure by concept id or by code
pub fn get_procedure(conn: &Connection, key: &str) -> Result<Option<Procedure>> {
    let procedure = conn
        .query_row(
            &format!(
                "SELECT {} FROM procedures WHERE concept_id = ?1 OR code = ?1 ORDER BY concept_id = ?1 DESC LIMIT 1",
                PROCEDURE_COLUMNS
            ),
            [key],
            procedure_from_row,
        )
        .optional()?;
    Ok(procedure)
}

pub fn get_infrastructure(conn: &Connection, id: &str) -> Result<Option<CatalogInfrastructure>> {
    let entry = conn
        .query_row(
            &format!("SELECT {} FROM infrastructures WHERE id = ?1", INFRASTRUCTURE_COLUMNS),
            [id],
            infrastructure_from_row,
        )
        .optional()?;
    Ok(entry)
}

pub fn get_equipment(conn: &Connection, id: &str) -> Result<Option<CatalogEquipment>> {
    let entry = conn
        .query_row(
            &format!("SELECT {} FROM equipment WHERE id = ?1", EQUIPMENT_COLUMNS),
            [id],
            equipment_from_row,
        )
        .optional()?;
    Ok(entry)
}

pub fn get_human_resource(conn: &Connection, id: &str) -> Result<Option<CatalogHumanResource>> {
    let entry = conn
        .query_row(
            &format!("SELECT {} FROM human_resources WHERE id = ?1", HUMAN_RESOURCE_COLUMNS),
            [id],
            human_resource_from_row,
        )
        .optional()?;
    Ok(entry)
}

pub fn get_supply(conn: &Connection, id: &str) -> Result<Option<CatalogSupply>> {
    let entry = conn
        .query_row(
            &format!("SELECT {} FROM supplies WHERE id = ?1", SUPPLY_COLUMNS),
            [id],
            supply_from_row,
        )
        .optional()?;
    Ok(entry)
}

fn list<T>(
    conn: &Connection,
    sql: &str,
    from_row: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn list_procedures(conn: &Connection) -> Result<Vec<Procedure>> {
    list(
        conn,
        &format!("SELECT {} FROM procedures ORDER BY code", PROCEDURE_COLUMNS),
        procedure_from_row,
    )
}

pub fn list_infrastructures(conn: &Connection) -> Result<Vec<CatalogInfrastructure>> {
    list(
        conn,
        &format!("SELECT {} FROM infrastructures ORDER BY name", INFRASTRUCTURE_COLUMNS),
        infrastructure_from_row,
    )
}

pub fn list_equipment(conn: &Connection) -> Result<Vec<CatalogEquipment>> {
    list(
        conn,
        &format!("SELECT {} FROM equipment ORDER BY name", EQUIPMENT_COLUMNS),
        equipment_from_row,
    )
}

pub fn list_human_resources(conn: &Connection) -> Result<Vec<CatalogHumanResource>> {
    list(
        conn,
        &format!("SELECT {} FROM human_resources ORDER BY name", HUMAN_RESOURCE_COLUMNS),
        human_resource_from_row,
    )
}

pub fn list_supplies(conn: &Connection) -> Result<Vec<CatalogSupply>> {
    list(
        conn,
        &format!("SELECT {} FROM supplies ORDER BY name", SUPPLY_COLUMNS),
        supply_from_row,
    )
}
