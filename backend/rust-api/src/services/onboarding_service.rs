use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::user::{CompleteStepRequest, OnboardingStatus, OnboardingStep, User};
use crate::store::UserStore;

pub struct OnboardingService {
    users: Arc<dyn UserStore>,
}

impl OnboardingService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    async fn load_user(&self, id: &ObjectId) -> AppResult<User> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn status(&self, user_id: &ObjectId) -> AppResult<OnboardingStatus> {
        let user = self.load_user(user_id).await?;
        Ok(OnboardingStatus::for_user(&user))
    }

    /// Records a step. Repeating a completed step changes nothing.
    pub async fn complete_step(
        &self,
        user_id: &ObjectId,
        raw_step: &str,
        req: CompleteStepRequest,
        now: DateTime<Utc>,
    ) -> AppResult<OnboardingStatus> {
        let step = OnboardingStep::parse(raw_step)
            .ok_or_else(|| AppError::invalid_input("Invalid step ID"))?;
        req.validate()?;
        self.load_user(user_id).await?;

        if step == OnboardingStep::SetTarget {
            if let Some(target) = req.target_emission {
                self.users.set_target_emission(user_id, target).await?;
            }
        }

        let added = self.users.push_onboarding_step(user_id, step, now).await?;

        let mut user = self.load_user(user_id).await?;
        let all_done = OnboardingStep::ALL
            .into_iter()
            .all(|s| user.has_completed_step(s));
        if all_done && !user.onboarding_completed {
            self.users.mark_onboarding_completed(user_id).await?;
            user.onboarding_completed = true;
            tracing::info!(user_id = %user_id, "Onboarding completed");
        }

        tracing::debug!(user_id = %user_id, step = step.as_str(), added, "Onboarding step recorded");
        Ok(OnboardingStatus::for_user(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn setup() -> (OnboardingService, Arc<MemoryStore>, ObjectId) {
        let store = Arc::new(MemoryStore::new());
        let user = User::new("Grace", "grace@example.com", Utc::now());
        store.insert_user(&user).await.unwrap();
        (OnboardingService::new(store.clone()), store, user.id)
    }

    #[tokio::test]
    async fn test_unknown_step_rejected() {
        let (service, _, user) = setup().await;
        let err = service
            .complete_step(&user, "tour", CompleteStepRequest::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_repeat_step_is_idempotent() {
        let (service, _, user) = setup().await;
        let now = Utc::now();
        service
            .complete_step(&user, "welcome", CompleteStepRequest::default(), now)
            .await
            .unwrap();
        let status = service
            .complete_step(&user, "welcome", CompleteStepRequest::default(), now)
            .await
            .unwrap();
        assert_eq!(status.completed_steps, vec![OnboardingStep::Welcome]);
        assert_eq!(status.remaining_steps.len(), 3);
    }

    #[tokio::test]
    async fn test_all_steps_complete_onboarding() {
        let (service, store, user) = setup().await;
        let now = Utc::now();
        let mut status = None;
        for step in OnboardingStep::ALL {
            let req = CompleteStepRequest {
                target_emission: (step == OnboardingStep::SetTarget).then_some(80.0),
            };
            status = Some(
                service
                    .complete_step(&user, step.as_str(), req, now)
                    .await
                    .unwrap(),
            );
        }

        let status = status.unwrap();
        assert!(status.onboarding_completed);
        assert!(status.remaining_steps.is_empty());

        let stored = store.find_user(&user).await.unwrap().unwrap();
        assert!(stored.onboarding_completed);
        assert_eq!(stored.target_emission, 80.0);
    }

    #[tokio::test]
    async fn test_missing_user() {
        let (service, _, _) = setup().await;
        let err = service.status(&ObjectId::new()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
