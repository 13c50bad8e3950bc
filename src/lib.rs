//! Procedure cost-structure calculator
//!
//! Computes the fully allocated standard cost of a clinical procedure from
//! its infrastructure, public-service, equipment, human-resource and supply
//! consumption.

pub mod calculator;
pub mod db;
pub mod editor;
pub mod formulas;
pub mod models;
pub mod sheet;
pub mod validation;
