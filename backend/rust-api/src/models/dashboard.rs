use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::{ActivityCategory, ActivityResponse};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DashboardPeriod {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub period: DashboardPeriod,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryBreakdown {
    pub category: ActivityCategory,
    pub total: f64,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub emission: f64,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub period: DashboardPeriod,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_emission: f64,
    pub daily_average: f64,
    pub target_emission: f64,
    pub activity_count: usize,
    pub breakdown: Vec<CategoryBreakdown>,
    pub chart: Vec<ChartPoint>,
    pub recent_activities: Vec<ActivityResponse>,
    /// Awarded trees plus this month's provisional savings trees
    pub total_trees: u32,
    pub trees_this_month: u32,
}

/// Outcome of settling the previous month's savings trees
#[derive(Debug, Serialize)]
pub struct TreeSettlement {
    pub month: String,
    pub target_emission: f64,
    pub actual_emission: f64,
    pub trees_awarded: u32,
    pub already_settled: bool,
    pub total_trees: u32,
    pub message: String,
}
