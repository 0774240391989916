use crate::error::{AppError, AppResult};
use crate::models::activity::ActivityInput;
use crate::models::emission::{FactorCatalogue, FactorEntry};
use crate::models::round2;

#[derive(Debug, Clone, PartialEq)]
struct Factor {
    key: &'static str,
    label: &'static str,
    /// kg CO2e per unit
    value: f64,
}

const fn factor(key: &'static str, label: &'static str, value: f64) -> Factor {
    Factor { key, label, value }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactorGroup {
    Transport,
    Food,
    Energy,
    Shopping,
}

impl FactorGroup {
    fn as_str(self) -> &'static str {
        match self {
            FactorGroup::Transport => "transport",
            FactorGroup::Food => "food",
            FactorGroup::Energy => "energy",
            FactorGroup::Shopping => "shopping",
        }
    }
}

/// Immutable emission factor table, built once at startup and shared
/// through `AppState`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionFactors {
    transport: Vec<Factor>,
    food: Vec<Factor>,
    energy: Vec<Factor>,
    shopping: Vec<Factor>,
}

impl Default for EmissionFactors {
    fn default() -> Self {
        Self::defra_2024()
    }
}

impl EmissionFactors {
    /// DEFRA 2024 conversion factors
    pub fn defra_2024() -> Self {
        Self {
            transport: vec![
                factor("car_medium_petrol", "Medium petrol car (per km)", 0.18887),
                factor("motorcycle_avg", "Average motorcycle (per km)", 0.11543),
                factor("bus_local", "Local bus (per km)", 0.13783),
                factor("rail_national", "National rail (per km)", 0.03513),
            ],
            food: vec![
                factor("beef_kg", "Beef (per kg)", 60.0),
                factor("chicken_kg", "Chicken (per kg)", 7.5),
                factor("rice_kg", "Rice (per kg)", 2.5),
            ],
            energy: vec![factor("grid_uk", "UK Grid electricity (per kWh)", 0.20709)],
            shopping: vec![
                factor("clothing_item", "Clothing item", 7.6),
                factor("electronics_item", "Electronics item", 15.0),
            ],
        }
    }

    fn table(&self, group: FactorGroup) -> &[Factor] {
        match group {
            FactorGroup::Transport => &self.transport,
            FactorGroup::Food => &self.food,
            FactorGroup::Energy => &self.energy,
            FactorGroup::Shopping => &self.shopping,
        }
    }

    fn lookup(&self, group: FactorGroup, key: &str) -> AppResult<f64> {
        self.table(group)
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value)
            .ok_or_else(|| {
                AppError::invalid_input(format!(
                    "Invalid emission type: {} for category: {}",
                    key,
                    group.as_str()
                ))
            })
    }

    /// kg CO2e for one activity, rounded to two decimals
    pub fn calculate(&self, input: &ActivityInput) -> AppResult<f64> {
        let (group, key, quantity, what) = match input {
            ActivityInput::Transportation {
                distance,
                vehicle_type,
            } => (FactorGroup::Transport, vehicle_type, *distance, "Distance"),
            ActivityInput::Food { weight, food_type } => {
                (FactorGroup::Food, food_type, *weight, "Weight")
            }
            ActivityInput::Energy {
                energy_consumption,
                energy_type,
            } => (
                FactorGroup::Energy,
                energy_type,
                *energy_consumption,
                "Energy consumption",
            ),
            ActivityInput::Shopping {
                quantity,
                item_type,
            } => (FactorGroup::Shopping, item_type, *quantity, "Quantity"),
        };

        if !quantity.is_finite() || quantity < 0.0 {
            return Err(AppError::invalid_input(format!(
                "{} must be a non-negative number",
                what
            )));
        }

        let factor = self.lookup(group, key)?;
        Ok(round2(quantity * factor))
    }

    pub fn catalogue(&self) -> FactorCatalogue {
        fn entries(table: &[Factor], unit: &str) -> Vec<FactorEntry> {
            table
                .iter()
                .map(|f| FactorEntry {
                    key: f.key.to_string(),
                    label: f.label.to_string(),
                    unit: unit.to_string(),
                    factor: f.value,
                })
                .collect()
        }

        FactorCatalogue {
            transport: entries(&self.transport, "km"),
            food: entries(&self.food, "kg"),
            energy: entries(&self.energy, "kWh"),
            shopping: entries(&self.shopping, "item"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ride(distance: f64, vehicle: &str) -> ActivityInput {
        ActivityInput::Transportation {
            distance,
            vehicle_type: vehicle.to_string(),
        }
    }

    #[test]
    fn test_car_commute() {
        let factors = EmissionFactors::defra_2024();
        assert_eq!(factors.calculate(&ride(15.0, "car_medium_petrol")).unwrap(), 2.83);
    }

    #[test]
    fn test_each_category() {
        let factors = EmissionFactors::defra_2024();

        let beef = ActivityInput::Food {
            weight: 0.5,
            food_type: "beef_kg".to_string(),
        };
        assert_eq!(factors.calculate(&beef).unwrap(), 30.0);

        let power = ActivityInput::Energy {
            energy_consumption: 120.0,
            energy_type: "grid_uk".to_string(),
        };
        assert_eq!(factors.calculate(&power).unwrap(), 24.85);

        let clothes = ActivityInput::Shopping {
            quantity: 2.0,
            item_type: "clothing_item".to_string(),
        };
        assert_eq!(factors.calculate(&clothes).unwrap(), 15.2);
    }

    #[test]
    fn test_deterministic() {
        let factors = EmissionFactors::defra_2024();
        let input = ride(42.7, "bus_local");
        assert_eq!(
            factors.calculate(&input).unwrap(),
            factors.calculate(&input).unwrap()
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let factors = EmissionFactors::defra_2024();
        let err = factors.calculate(&ride(10.0, "rocket")).unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(
            err.to_string(),
            "Invalid emission type: rocket for category: transport"
        );
    }

    #[test]
    fn test_key_from_another_category_is_rejected() {
        let factors = EmissionFactors::defra_2024();

        let shopping_as_food = ActivityInput::Food {
            weight: 1.0,
            food_type: "clothing_item".to_string(),
        };
        assert_eq!(
            factors.calculate(&shopping_as_food).unwrap_err().to_string(),
            "Invalid emission type: clothing_item for category: food"
        );

        let food_as_shopping = ActivityInput::Shopping {
            quantity: 1.0,
            item_type: "beef_kg".to_string(),
        };
        assert_eq!(
            factors.calculate(&food_as_shopping).unwrap_err().to_string(),
            "Invalid emission type: beef_kg for category: shopping"
        );

        for group in [
            FactorGroup::Transport,
            FactorGroup::Food,
            FactorGroup::Energy,
            FactorGroup::Shopping,
        ] {
            assert!(factors.lookup(group, "rocket").is_err());
        }
    }

    #[test]
    fn test_negative_or_nan_quantity_is_rejected() {
        let factors = EmissionFactors::defra_2024();
        assert!(factors.calculate(&ride(-1.0, "car_medium_petrol")).is_err());
        assert!(factors
            .calculate(&ride(f64::NAN, "car_medium_petrol"))
            .is_err());
        assert_eq!(factors.calculate(&ride(0.0, "bus_local")).unwrap(), 0.0);
    }

    #[test]
    fn test_catalogue_keeps_table_order() {
        let catalogue = EmissionFactors::defra_2024().catalogue();

        let keys: Vec<&str> = catalogue.transport.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(
            keys,
            ["car_medium_petrol", "motorcycle_avg", "bus_local", "rail_national"]
        );
        assert_eq!(catalogue.energy[0].unit, "kWh");
        assert_eq!(catalogue.shopping[1].label, "Electronics item");
    }
}
