use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use mongodb::bson::oid::ObjectId;

use super::tree_calculator::{
    monthly_trees_from_savings, tree_earning_message, validate_tree_inputs, TreeReason,
};
use crate::error::{AppError, AppResult};
use crate::metrics::TREES_AWARDED_TOTAL;
use crate::models::activity::{Activity, ActivityCategory, ActivityResponse};
use crate::models::dashboard::{
    CategoryBreakdown, ChartPoint, DashboardPeriod, DashboardSummary, TreeSettlement,
};
use crate::models::round2;
use crate::models::user::User;
use crate::store::{ActivityStore, UserStore};
use crate::utils::time::{ceil_days, days_in_month, previous_month, start_of_month, start_of_year};

const RECENT_ACTIVITIES: usize = 5;
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn period_start(period: DashboardPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        DashboardPeriod::Weekly => now - Duration::days(7),
        DashboardPeriod::Monthly => start_of_month(now),
        DashboardPeriod::Yearly => start_of_year(now),
    }
}

/// Per-category totals, largest first
pub fn category_breakdown(activities: &[Activity], total: f64) -> Vec<CategoryBreakdown> {
    let mut grouped: HashMap<ActivityCategory, (f64, usize)> = HashMap::new();
    for activity in activities {
        let entry = grouped.entry(activity.category).or_insert((0.0, 0));
        entry.0 += activity.emission;
        entry.1 += 1;
    }

    let mut breakdown: Vec<CategoryBreakdown> = grouped
        .into_iter()
        .map(|(category, (sum, count))| CategoryBreakdown {
            category,
            total: round2(sum),
            count,
            percentage: if total > 0.0 {
                round2(sum / total * 100.0)
            } else {
                0.0
            },
        })
        .collect();

    breakdown.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });
    breakdown
}

fn day_label(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Daily series for weekly/monthly views, one point per month for yearly
pub fn chart_series(
    activities: &[Activity],
    period: DashboardPeriod,
    now: DateTime<Utc>,
) -> Vec<ChartPoint> {
    let labels: Vec<String> = match period {
        DashboardPeriod::Weekly => (0..7)
            .rev()
            .map(|i| day_label(now - Duration::days(i)))
            .collect(),
        DashboardPeriod::Monthly => {
            let first = start_of_month(now);
            (0..days_in_month(now.year(), now.month()))
                .map(|offset| day_label(first + Duration::days(i64::from(offset))))
                .collect()
        }
        DashboardPeriod::Yearly => MONTH_NAMES.iter().map(|m| m.to_string()).collect(),
    };

    let mut sums: HashMap<String, f64> = HashMap::new();
    for activity in activities {
        let label = match period {
            DashboardPeriod::Yearly => MONTH_NAMES[activity.date.month0() as usize].to_string(),
            _ => day_label(activity.date),
        };
        *sums.entry(label).or_insert(0.0) += activity.emission;
    }

    labels
        .into_iter()
        .map(|label| {
            let emission = round2(sums.get(&label).copied().unwrap_or(0.0));
            ChartPoint { label, emission }
        })
        .collect()
}

/// Savings trees for a month, rejecting negative or non-finite inputs
fn savings_trees(target: f64, actual: f64) -> AppResult<u32> {
    validate_tree_inputs(target, actual)?;
    Ok(monthly_trees_from_savings(target, actual))
}

pub struct DashboardService {
    activities: Arc<dyn ActivityStore>,
    users: Arc<dyn UserStore>,
}

impl DashboardService {
    pub fn new(activities: Arc<dyn ActivityStore>, users: Arc<dyn UserStore>) -> Self {
        Self { activities, users }
    }

    async fn load_user(&self, id: &ObjectId) -> AppResult<User> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn summary(
        &self,
        user_id: &ObjectId,
        period: DashboardPeriod,
        now: DateTime<Utc>,
    ) -> AppResult<DashboardSummary> {
        let user = self.load_user(user_id).await?;
        let start = period_start(period, now);
        let activities = self.activities.between(user_id, start, now).await?;

        let total_emission = round2(activities.iter().map(|a| a.emission).sum());
        let period_days = ceil_days(now - start);
        let daily_average = if period_days > 0 {
            round2(total_emission / period_days as f64)
        } else {
            0.0
        };

        let trees_this_month = if period == DashboardPeriod::Monthly && user.target_emission > 0.0
        {
            savings_trees(user.target_emission, total_emission).unwrap_or(0)
        } else {
            0
        };

        let breakdown = category_breakdown(&activities, total_emission);
        let chart = chart_series(&activities, period, now);
        let recent_activities = activities
            .iter()
            .rev()
            .take(RECENT_ACTIVITIES)
            .cloned()
            .map(ActivityResponse::from)
            .collect();

        Ok(DashboardSummary {
            period,
            start,
            end: now,
            total_emission,
            daily_average,
            target_emission: user.target_emission,
            activity_count: activities.len(),
            breakdown,
            chart,
            recent_activities,
            total_trees: user.total_trees + trees_this_month,
            trees_this_month,
        })
    }

    /// Awards last calendar month's savings trees. Settling the same month
    /// again awards nothing.
    pub async fn settle_month_trees(
        &self,
        user_id: &ObjectId,
        now: DateTime<Utc>,
    ) -> AppResult<TreeSettlement> {
        let user = self.load_user(user_id).await?;
        let (month, start, end) = previous_month(now);

        let actual_emission = round2(
            self.activities
                .between(user_id, start, end)
                .await?
                .iter()
                .map(|a| a.emission)
                .sum(),
        );
        let trees = savings_trees(user.target_emission, actual_emission)?;

        let awarded = if user.trees_awarded_through.as_deref() == Some(month.as_str()) {
            false
        } else {
            self.users.award_trees(user_id, trees, &month).await?
        };

        let trees_awarded = if awarded { trees } else { 0 };
        if trees_awarded > 0 {
            TREES_AWARDED_TOTAL
                .with_label_values(&["savings"])
                .inc_by(u64::from(trees_awarded));
        }

        let total_trees = self.load_user(user_id).await?.total_trees;
        let message = tree_earning_message(trees_awarded, TreeReason::Savings).unwrap_or_else(|| {
            if awarded {
                format!("No trees earned for {}. Stay under your target to earn trees.", month)
            } else {
                format!("Trees for {} were already settled.", month)
            }
        });

        tracing::info!(
            user_id = %user_id,
            month = %month,
            trees_awarded,
            already_settled = !awarded,
            "Monthly trees settled"
        );

        Ok(TreeSettlement {
            month,
            target_emission: user.target_emission,
            actual_emission,
            trees_awarded,
            already_settled: !awarded,
            total_trees,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::ActivityInput;
    use chrono::TimeZone;

    fn activity(category_input: ActivityInput, emission: f64, date: DateTime<Utc>) -> Activity {
        Activity {
            id: ObjectId::new(),
            user: ObjectId::new(),
            category: category_input.category(),
            details: category_input.details(),
            note: None,
            emission,
            date,
            input: category_input,
            created_at: date,
            updated_at: date,
        }
    }

    fn food(kg: f64) -> ActivityInput {
        ActivityInput::Food {
            weight: kg,
            food_type: "beef_kg".to_string(),
        }
    }

    fn bus(km: f64) -> ActivityInput {
        ActivityInput::Transportation {
            distance: km,
            vehicle_type: "bus_local".to_string(),
        }
    }

    #[test]
    fn test_period_start() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 9, 30, 0).unwrap();
        assert_eq!(
            period_start(DashboardPeriod::Monthly, now),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            period_start(DashboardPeriod::Weekly, now),
            now - Duration::days(7)
        );
    }

    #[test]
    fn test_breakdown_sorted_with_percentages() {
        let now = Utc::now();
        let activities = vec![
            activity(food(0.5), 30.0, now),
            activity(bus(10.0), 1.38, now),
            activity(bus(20.0), 2.76, now),
        ];

        let breakdown = category_breakdown(&activities, 34.14);
        assert_eq!(breakdown[0].category, ActivityCategory::Food);
        assert_eq!(breakdown[0].count, 1);
        assert_eq!(breakdown[1].total, 4.14);
        assert_eq!(breakdown[1].count, 2);
        assert_eq!(breakdown[1].percentage, 12.13);
    }

    #[test]
    fn test_chart_labels() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let activities = vec![activity(food(0.1), 6.0, now - Duration::days(1))];

        let weekly = chart_series(&activities, DashboardPeriod::Weekly, now);
        assert_eq!(weekly.len(), 7);
        assert_eq!(weekly[6].label, "2026-02-10");
        assert_eq!(weekly[5].emission, 6.0);

        let monthly = chart_series(&activities, DashboardPeriod::Monthly, now);
        assert_eq!(monthly.len(), 28);
        assert_eq!(monthly[0].label, "2026-02-01");

        let yearly = chart_series(&activities, DashboardPeriod::Yearly, now);
        assert_eq!(yearly.len(), 12);
        assert_eq!(yearly[1].label, "Feb");
        assert_eq!(yearly[1].emission, 6.0);
    }
}
