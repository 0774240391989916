use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_datetime_as_chrono;

/// Activity categories a user can log
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActivityCategory {
    Transportation,
    Food,
    Energy,
    Shopping,
}

impl ActivityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::Transportation => "Transportation",
            ActivityCategory::Food => "Food",
            ActivityCategory::Energy => "Energy",
            ActivityCategory::Shopping => "Shopping",
        }
    }
}

fn default_energy_type() -> String {
    "grid_uk".to_string()
}

/// Category-specific payload. The variant decides the category, so a payload
/// can never disagree with the category it is filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum ActivityInput {
    Transportation {
        /// km
        distance: f64,
        vehicle_type: String,
    },
    Food {
        /// kg
        weight: f64,
        food_type: String,
    },
    Energy {
        /// kWh
        energy_consumption: f64,
        #[serde(default = "default_energy_type")]
        energy_type: String,
    },
    Shopping {
        /// item count
        quantity: f64,
        item_type: String,
    },
}

impl ActivityInput {
    pub fn category(&self) -> ActivityCategory {
        match self {
            ActivityInput::Transportation { .. } => ActivityCategory::Transportation,
            ActivityInput::Food { .. } => ActivityCategory::Food,
            ActivityInput::Energy { .. } => ActivityCategory::Energy,
            ActivityInput::Shopping { .. } => ActivityCategory::Shopping,
        }
    }

    /// Human-readable summary stored alongside the activity
    pub fn details(&self) -> String {
        match self {
            ActivityInput::Transportation {
                distance,
                vehicle_type,
            } => format!("{} ({} km)", vehicle_type, distance),
            ActivityInput::Food { weight, food_type } => format!("{} ({} kg)", food_type, weight),
            ActivityInput::Energy {
                energy_consumption,
                energy_type,
            } => format!("{} ({} kWh)", energy_type, energy_consumption),
            ActivityInput::Shopping {
                quantity,
                item_type,
            } => {
                let unit = if *quantity > 1.0 { "items" } else { "item" };
                format!("{} ({} {})", item_type, quantity, unit)
            }
        }
    }
}

/// Activity stored in MongoDB "activities" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user: ObjectId,
    pub category: ActivityCategory,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// kg CO2e, always computed from `input`
    pub emission: f64,
    #[serde(with = "bson_datetime_as_chrono")]
    pub date: DateTime<Utc>,
    pub input: ActivityInput,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LogActivityRequest {
    #[serde(flatten)]
    pub input: ActivityInput,

    #[validate(length(max = 500, message = "Note cannot exceed 500 characters"))]
    pub note: Option<String>,

    /// Defaults to now
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateActivityRequest {
    pub input: Option<ActivityInput>,

    #[validate(length(max = 500, message = "Note cannot exceed 500 characters"))]
    pub note: Option<String>,

    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub id: String,
    pub category: ActivityCategory,
    pub details: String,
    pub note: Option<String>,
    pub emission: f64,
    pub date: DateTime<Utc>,
    pub input: ActivityInput,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Activity> for ActivityResponse {
    fn from(activity: Activity) -> Self {
        ActivityResponse {
            id: activity.id.to_hex(),
            category: activity.category,
            details: activity.details,
            note: activity.note,
            emission: activity.emission,
            date: activity.date,
            input: activity.input,
            created_at: activity.created_at,
            updated_at: activity.updated_at,
        }
    }
}
