//! Persistence seams for the services.
//!
//! Each trait has a MongoDB implementation used by the server and worker, and
//! an in-memory one used by tests and local tooling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use crate::error::AppResult;
use crate::models::activity::Activity;
use crate::models::challenge::{Challenge, ChallengeParticipant};
use crate::models::quiz::{Quiz, QuizAttempt};
use crate::models::user::{OnboardingStep, User};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn insert_activity(&self, activity: &Activity) -> AppResult<()>;

    async fn find_activity(&self, user: &ObjectId, id: &ObjectId) -> AppResult<Option<Activity>>;

    async fn replace_activity(&self, activity: &Activity) -> AppResult<()>;

    /// Removes and returns the activity when it belongs to `user`
    async fn delete_activity(&self, user: &ObjectId, id: &ObjectId)
        -> AppResult<Option<Activity>>;

    /// Up to `limit` activities dated strictly before `before`, newest first
    async fn recent_before(
        &self,
        user: &ObjectId,
        before: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Activity>>;

    /// Activities dated within `[start, end]`, oldest first
    async fn between(
        &self,
        user: &ObjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Activity>>;
}

#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn insert_challenge(&self, challenge: &Challenge) -> AppResult<()>;

    async fn find_challenge(&self, id: &ObjectId) -> AppResult<Option<Challenge>>;

    async fn replace_challenge(&self, challenge: &Challenge) -> AppResult<()>;

    /// Deletes the challenge and all of its participants
    async fn delete_challenge(&self, id: &ObjectId) -> AppResult<bool>;

    /// Upcoming or active challenge with this title that has not ended yet
    async fn find_open_by_title(
        &self,
        title: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Challenge>>;

    /// Non-cancelled challenges whose window contains `now`
    async fn active_challenges(&self, now: DateTime<Utc>) -> AppResult<Vec<Challenge>>;

    async fn increment_participants(&self, id: &ObjectId, by: i32) -> AppResult<()>;

    async fn set_total_emission_saved(&self, id: &ObjectId, total: f64) -> AppResult<()>;

    /// Fails with `Conflict` when the user already joined
    async fn insert_participant(&self, participant: &ChallengeParticipant) -> AppResult<()>;

    async fn find_participant(
        &self,
        user: &ObjectId,
        challenge: &ObjectId,
    ) -> AppResult<Option<ChallengeParticipant>>;

    async fn active_participants(&self, challenge: &ObjectId)
        -> AppResult<Vec<ChallengeParticipant>>;

    async fn save_participant(&self, participant: &ChallengeParticipant) -> AppResult<()>;
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn insert_quiz(&self, quiz: &Quiz) -> AppResult<()>;

    async fn find_quiz(&self, id: &ObjectId) -> AppResult<Option<Quiz>>;

    /// Deletes the quiz and all of its attempts
    async fn delete_quiz(&self, id: &ObjectId) -> AppResult<bool>;

    async fn active_quizzes(&self) -> AppResult<Vec<Quiz>>;

    async fn find_attempt(&self, user: &ObjectId, quiz: &ObjectId)
        -> AppResult<Option<QuizAttempt>>;

    async fn find_attempt_by_id(&self, id: &ObjectId) -> AppResult<Option<QuizAttempt>>;

    /// Fails with `Conflict` when the user already has an attempt for the quiz
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> AppResult<()>;

    /// Writes the finalized attempt unless the stored copy is already
    /// completed. Returns whether the write happened.
    async fn complete_attempt(&self, attempt: &QuizAttempt) -> AppResult<bool>;

    /// Completed attempts, most recently completed first
    async fn completed_attempts_for_user(&self, user: &ObjectId) -> AppResult<Vec<QuizAttempt>>;

    async fn completed_attempts_for_quiz(&self, quiz: &ObjectId) -> AppResult<Vec<QuizAttempt>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> AppResult<()>;

    async fn find_user(&self, id: &ObjectId) -> AppResult<Option<User>>;

    async fn adjust_total_emission(&self, id: &ObjectId, delta: f64) -> AppResult<()>;

    async fn set_target_emission(&self, id: &ObjectId, target: f64) -> AppResult<()>;

    /// Increments `totalTrees` and records `period` as settled, unless that
    /// period was already settled. Returns whether trees were awarded.
    async fn award_trees(&self, id: &ObjectId, count: u32, period: &str) -> AppResult<bool>;

    /// Records a completed onboarding step once. Returns whether it was new.
    async fn push_onboarding_step(
        &self,
        id: &ObjectId,
        step: OnboardingStep,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    async fn mark_onboarding_completed(&self, id: &ObjectId) -> AppResult<()>;
}
