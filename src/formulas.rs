//! Cost formulas
//!
//! Pure arithmetic used by the cost-structure calculator. Every function here
//! always produces a number: an impossible division yields 0, which callers
//! read as "cost not yet computable".

/// Minutes in a 365-day year
pub const MINUTES_PER_YEAR: f64 = 525_600.0;

/// Assumed working minutes per month (150 hours)
pub const MINUTES_PER_WORKING_MONTH: f64 = 9_000.0;

/// Time applied to supplies consumed per occurrence rather than per duration
pub const DEFAULT_SUPPLY_MINUTES: f64 = 1.0;

// --- Depreciation ---

/// Asset value amortized linearly over its useful life, per minute of use
///
/// Returns 0 unless both the useful life and the asset value are positive.
pub fn depreciation_per_minute(useful_years: f64, asset_value: f64) -> f64 {
    if useful_years > 0.0 && asset_value > 0.0 {
        asset_value / (useful_years * MINUTES_PER_YEAR)
    } else {
        0.0
    }
}

/// Total construction value of an infrastructure
pub fn total_construction_value(area_m2: f64, construction_cost_per_m2: f64) -> f64 {
    area_m2 * construction_cost_per_m2
}

// --- Direct resources ---

/// Standard cost of one line item: rate x quantity x time
pub fn line_cost(rate: f64, quantity: f64, time_minutes: f64) -> f64 {
    rate * quantity * time_minutes
}

pub fn cost_per_minute_from_monthly_salary(price_month: f64) -> f64 {
    price_month / MINUTES_PER_WORKING_MONTH
}

/// Cost of one consumption unit given the acquisition price of the
/// acquisition unit and how many consumption units it holds
pub fn unit_cost_from_acquisition(acquisition_price: f64, equivalence: f64) -> f64 {
    if equivalence.is_finite() && equivalence > 0.0 {
        acquisition_price / equivalence
    } else {
        0.0
    }
}

// --- Inductors ---

/// Allocation weight for a consumption figure.
///
/// Multiplies by the total area of every infrastructure line in the
/// structure, not by the area of the line the consumption belongs to.
pub fn inductor(consumption: f64, total_area_m2: f64) -> f64 {
    consumption * total_area_m2
}

pub fn total_inductor(inductors: &[f64]) -> f64 {
    inductors.iter().sum()
}

// --- Allocation ---

/// Share of an annual cost proportional to `this_inductor / total_inductor`
pub fn assigned_cost(annual_cost: f64, total_inductor: f64, this_inductor: f64) -> f64 {
    if total_inductor == 0.0 {
        return 0.0;
    }
    (this_inductor / total_inductor) * annual_cost
}

/// Share of an annual cost proportional to floor area
pub fn assigned_cost_by_area(annual_cost: f64, total_area_m2: f64, this_area_m2: f64) -> f64 {
    if total_area_m2 == 0.0 {
        return 0.0;
    }
    (this_area_m2 / total_area_m2) * annual_cost
}

// --- Finalizer ---

/// Assigned annual cost spread over the projected production.
///
/// Only a negative production short-circuits to 0; a production of exactly
/// 0 still divides.
pub fn unit_cost(assigned_cost: f64, projected_production: f64) -> f64 {
    if projected_production < 0.0 {
        return 0.0;
    }
    assigned_cost / projected_production
}

/// Maps NaN and infinities to 0 for display
pub fn not_computable_as_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
