use serde::{Deserialize, Serialize};

/// One row of the public factor catalogue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorEntry {
    pub key: String,
    pub label: String,
    pub unit: String,
    /// kg CO2e per unit
    pub factor: f64,
}

/// Emission factors grouped by category, in table order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FactorCatalogue {
    pub transport: Vec<FactorEntry>,
    pub food: Vec<FactorEntry>,
    pub energy: Vec<FactorEntry>,
    pub shopping: Vec<FactorEntry>,
}
