use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use super::{ActivityStore, ChallengeStore, QuizStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::activity::Activity;
use crate::models::challenge::{Challenge, ChallengeParticipant, ChallengeStatus, ParticipantStatus};
use crate::models::quiz::{AttemptStatus, Quiz, QuizAttempt};
use crate::models::user::{CompletedStep, OnboardingStep, User};

#[derive(Default)]
struct Tables {
    activities: HashMap<ObjectId, Activity>,
    challenges: HashMap<ObjectId, Challenge>,
    participants: HashMap<ObjectId, ChallengeParticipant>,
    quizzes: HashMap<ObjectId, Quiz>,
    attempts: HashMap<ObjectId, QuizAttempt>,
    users: HashMap<ObjectId, User>,
}

/// In-memory store with the same uniqueness and guard semantics as the
/// MongoDB store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A panicked writer cannot leave a half-applied row behind, every
        // mutation is a single map operation.
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn insert_activity(&self, activity: &Activity) -> AppResult<()> {
        self.tables()
            .activities
            .insert(activity.id, activity.clone());
        Ok(())
    }

    async fn find_activity(&self, user: &ObjectId, id: &ObjectId) -> AppResult<Option<Activity>> {
        Ok(self
            .tables()
            .activities
            .get(id)
            .filter(|a| &a.user == user)
            .cloned())
    }

    async fn replace_activity(&self, activity: &Activity) -> AppResult<()> {
        let mut tables = self.tables();
        if let Some(stored) = tables.activities.get_mut(&activity.id) {
            if stored.user == activity.user {
                *stored = activity.clone();
            }
        }
        Ok(())
    }

    async fn delete_activity(
        &self,
        user: &ObjectId,
        id: &ObjectId,
    ) -> AppResult<Option<Activity>> {
        let mut tables = self.tables();
        match tables.activities.get(id) {
            Some(a) if &a.user == user => Ok(tables.activities.remove(id)),
            _ => Ok(None),
        }
    }

    async fn recent_before(
        &self,
        user: &ObjectId,
        before: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Activity>> {
        let mut found: Vec<Activity> = self
            .tables()
            .activities
            .values()
            .filter(|a| &a.user == user && a.date < before)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.date.cmp(&a.date));
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }

    async fn between(
        &self,
        user: &ObjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Activity>> {
        let mut found: Vec<Activity> = self
            .tables()
            .activities
            .values()
            .filter(|a| &a.user == user && a.date >= start && a.date <= end)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(found)
    }
}

#[async_trait]
impl ChallengeStore for MemoryStore {
    async fn insert_challenge(&self, challenge: &Challenge) -> AppResult<()> {
        self.tables()
            .challenges
            .insert(challenge.id, challenge.clone());
        Ok(())
    }

    async fn find_challenge(&self, id: &ObjectId) -> AppResult<Option<Challenge>> {
        Ok(self.tables().challenges.get(id).cloned())
    }

    async fn replace_challenge(&self, challenge: &Challenge) -> AppResult<()> {
        let mut tables = self.tables();
        if let Some(stored) = tables.challenges.get_mut(&challenge.id) {
            *stored = challenge.clone();
        }
        Ok(())
    }

    async fn delete_challenge(&self, id: &ObjectId) -> AppResult<bool> {
        let mut tables = self.tables();
        if tables.challenges.remove(id).is_none() {
            return Ok(false);
        }
        tables.participants.retain(|_, p| &p.challenge != id);
        Ok(true)
    }

    async fn find_open_by_title(
        &self,
        title: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Challenge>> {
        Ok(self
            .tables()
            .challenges
            .values()
            .find(|c| {
                c.title == title
                    && matches!(c.status, ChallengeStatus::Upcoming | ChallengeStatus::Active)
                    && c.end_date >= now
            })
            .cloned())
    }

    async fn active_challenges(&self, now: DateTime<Utc>) -> AppResult<Vec<Challenge>> {
        Ok(self
            .tables()
            .challenges
            .values()
            .filter(|c| {
                c.status != ChallengeStatus::Cancelled && c.start_date <= now && c.end_date >= now
            })
            .cloned()
            .collect())
    }

    async fn increment_participants(&self, id: &ObjectId, by: i32) -> AppResult<()> {
        if let Some(challenge) = self.tables().challenges.get_mut(id) {
            challenge.total_participants = challenge.total_participants.saturating_add_signed(by);
        }
        Ok(())
    }

    async fn set_total_emission_saved(&self, id: &ObjectId, total: f64) -> AppResult<()> {
        if let Some(challenge) = self.tables().challenges.get_mut(id) {
            challenge.total_emission_saved = total;
            challenge.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_participant(&self, participant: &ChallengeParticipant) -> AppResult<()> {
        let mut tables = self.tables();
        let duplicate = tables
            .participants
            .values()
            .any(|p| p.user == participant.user && p.challenge == participant.challenge);
        if duplicate {
            return Err(AppError::conflict("Already joined this challenge"));
        }
        tables
            .participants
            .insert(participant.id, participant.clone());
        Ok(())
    }

    async fn find_participant(
        &self,
        user: &ObjectId,
        challenge: &ObjectId,
    ) -> AppResult<Option<ChallengeParticipant>> {
        Ok(self
            .tables()
            .participants
            .values()
            .find(|p| &p.user == user && &p.challenge == challenge)
            .cloned())
    }

    async fn active_participants(
        &self,
        challenge: &ObjectId,
    ) -> AppResult<Vec<ChallengeParticipant>> {
        let mut found: Vec<ChallengeParticipant> = self
            .tables()
            .participants
            .values()
            .filter(|p| &p.challenge == challenge && p.status == ParticipantStatus::Active)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(found)
    }

    async fn save_participant(&self, participant: &ChallengeParticipant) -> AppResult<()> {
        let mut tables = self.tables();
        if let Some(stored) = tables.participants.get_mut(&participant.id) {
            *stored = participant.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn insert_quiz(&self, quiz: &Quiz) -> AppResult<()> {
        self.tables().quizzes.insert(quiz.id, quiz.clone());
        Ok(())
    }

    async fn find_quiz(&self, id: &ObjectId) -> AppResult<Option<Quiz>> {
        Ok(self.tables().quizzes.get(id).cloned())
    }

    async fn delete_quiz(&self, id: &ObjectId) -> AppResult<bool> {
        let mut tables = self.tables();
        if tables.quizzes.remove(id).is_none() {
            return Ok(false);
        }
        tables.attempts.retain(|_, a| &a.quiz != id);
        Ok(true)
    }

    async fn active_quizzes(&self) -> AppResult<Vec<Quiz>> {
        let mut found: Vec<Quiz> = self
            .tables()
            .quizzes
            .values()
            .filter(|q| q.is_active)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_attempt(
        &self,
        user: &ObjectId,
        quiz: &ObjectId,
    ) -> AppResult<Option<QuizAttempt>> {
        Ok(self
            .tables()
            .attempts
            .values()
            .find(|a| &a.user == user && &a.quiz == quiz)
            .cloned())
    }

    async fn find_attempt_by_id(&self, id: &ObjectId) -> AppResult<Option<QuizAttempt>> {
        Ok(self.tables().attempts.get(id).cloned())
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> AppResult<()> {
        let mut tables = self.tables();
        let duplicate = tables
            .attempts
            .values()
            .any(|a| a.user == attempt.user && a.quiz == attempt.quiz);
        if duplicate {
            return Err(AppError::conflict("Quiz attempt already exists"));
        }
        tables.attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn complete_attempt(&self, attempt: &QuizAttempt) -> AppResult<bool> {
        let mut tables = self.tables();
        match tables.attempts.get_mut(&attempt.id) {
            Some(stored) if stored.status != AttemptStatus::Completed => {
                *stored = attempt.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn completed_attempts_for_user(&self, user: &ObjectId) -> AppResult<Vec<QuizAttempt>> {
        let mut found: Vec<QuizAttempt> = self
            .tables()
            .attempts
            .values()
            .filter(|a| &a.user == user && a.status == AttemptStatus::Completed)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(found)
    }

    async fn completed_attempts_for_quiz(&self, quiz: &ObjectId) -> AppResult<Vec<QuizAttempt>> {
        Ok(self
            .tables()
            .attempts
            .values()
            .filter(|a| &a.quiz == quiz && a.status == AttemptStatus::Completed)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        self.tables().users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: &ObjectId) -> AppResult<Option<User>> {
        Ok(self.tables().users.get(id).cloned())
    }

    async fn adjust_total_emission(&self, id: &ObjectId, delta: f64) -> AppResult<()> {
        if let Some(user) = self.tables().users.get_mut(id) {
            user.total_emission += delta;
            user.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn set_target_emission(&self, id: &ObjectId, target: f64) -> AppResult<()> {
        if let Some(user) = self.tables().users.get_mut(id) {
            user.target_emission = target;
            user.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn award_trees(&self, id: &ObjectId, count: u32, period: &str) -> AppResult<bool> {
        let mut tables = self.tables();
        match tables.users.get_mut(id) {
            Some(user) if user.trees_awarded_through.as_deref() != Some(period) => {
                user.total_trees += count;
                user.trees_awarded_through = Some(period.to_string());
                user.updated_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn push_onboarding_step(
        &self,
        id: &ObjectId,
        step: OnboardingStep,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut tables = self.tables();
        match tables.users.get_mut(id) {
            Some(user) if !user.has_completed_step(step) => {
                user.onboarding_steps.push(CompletedStep {
                    step_id: step,
                    completed_at: at,
                });
                user.updated_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_onboarding_completed(&self, id: &ObjectId) -> AppResult<()> {
        if let Some(user) = self.tables().users.get_mut(id) {
            user.onboarding_completed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::challenge::ChallengeParticipant;

    #[tokio::test]
    async fn test_participant_pair_is_unique() {
        let store = MemoryStore::new();
        let user = ObjectId::new();
        let challenge = ObjectId::new();
        let now = Utc::now();

        store
            .insert_participant(&ChallengeParticipant::new(user, challenge, now))
            .await
            .unwrap();
        let second = store
            .insert_participant(&ChallengeParticipant::new(user, challenge, now))
            .await;

        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_award_trees_once_per_period() {
        let store = MemoryStore::new();
        let user = User::new("Sam", "sam@example.com", Utc::now());
        store.insert_user(&user).await.unwrap();

        assert!(store.award_trees(&user.id, 3, "2026-09").await.unwrap());
        assert!(!store.award_trees(&user.id, 3, "2026-09").await.unwrap());
        assert!(store.award_trees(&user.id, 1, "2026-10").await.unwrap());

        let stored = store.find_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.total_trees, 4);
        assert_eq!(stored.trees_awarded_through.as_deref(), Some("2026-10"));
    }
}
