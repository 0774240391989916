use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use validator::Validate;

use super::emission_calculator::EmissionFactors;
use crate::error::{AppError, AppResult};
use crate::metrics::record_activity_logged;
use crate::models::activity::{Activity, LogActivityRequest, UpdateActivityRequest};
use crate::models::round2;
use crate::store::{ActivityStore, UserStore};

/// Records activities. Emission is always computed here, never taken from
/// the caller, and the owner's running total follows every change.
pub struct ActivityService {
    activities: Arc<dyn ActivityStore>,
    users: Arc<dyn UserStore>,
    factors: Arc<EmissionFactors>,
}

impl ActivityService {
    pub fn new(
        activities: Arc<dyn ActivityStore>,
        users: Arc<dyn UserStore>,
        factors: Arc<EmissionFactors>,
    ) -> Self {
        Self {
            activities,
            users,
            factors,
        }
    }

    pub async fn log(
        &self,
        user: ObjectId,
        req: LogActivityRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Activity> {
        req.validate()?;
        let emission = self.factors.calculate(&req.input)?;

        let activity = Activity {
            id: ObjectId::new(),
            user,
            category: req.input.category(),
            details: req.input.details(),
            note: req.note,
            emission,
            date: req.date.unwrap_or(now),
            input: req.input,
            created_at: now,
            updated_at: now,
        };

        self.activities.insert_activity(&activity).await?;
        self.users.adjust_total_emission(&user, emission).await?;

        record_activity_logged(activity.category.as_str(), emission);
        tracing::info!(
            user_id = %user,
            activity_id = %activity.id,
            category = activity.category.as_str(),
            emission,
            "Activity logged"
        );
        Ok(activity)
    }

    pub async fn get(&self, user: &ObjectId, id: &ObjectId) -> AppResult<Activity> {
        self.activities
            .find_activity(user, id)
            .await?
            .ok_or_else(|| AppError::not_found("Activity not found"))
    }

    pub async fn update(
        &self,
        user: &ObjectId,
        id: &ObjectId,
        req: UpdateActivityRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Activity> {
        req.validate()?;
        let mut activity = self.get(user, id).await?;
        let previous_emission = activity.emission;

        if let Some(input) = req.input {
            activity.emission = self.factors.calculate(&input)?;
            activity.category = input.category();
            activity.details = input.details();
            activity.input = input;
        }
        if let Some(note) = req.note {
            activity.note = Some(note);
        }
        if let Some(date) = req.date {
            activity.date = date;
        }
        activity.updated_at = now;

        self.activities.replace_activity(&activity).await?;

        let delta = round2(activity.emission - previous_emission);
        if delta != 0.0 {
            self.users.adjust_total_emission(user, delta).await?;
        }

        tracing::debug!(activity_id = %id, delta, "Activity updated");
        Ok(activity)
    }

    pub async fn delete(&self, user: &ObjectId, id: &ObjectId) -> AppResult<()> {
        let removed = self
            .activities
            .delete_activity(user, id)
            .await?
            .ok_or_else(|| AppError::not_found("Activity not found"))?;

        self.users
            .adjust_total_emission(user, -removed.emission)
            .await?;

        tracing::info!(activity_id = %id, "Activity deleted");
        Ok(())
    }
}
