use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, to_bson},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Collection, Database, IndexModel,
};

use super::{ActivityStore, ChallengeStore, QuizStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::activity::Activity;
use crate::models::challenge::{Challenge, ChallengeParticipant, ChallengeStatus, ParticipantStatus};
use crate::models::quiz::{AttemptStatus, Quiz, QuizAttempt};
use crate::models::user::{OnboardingStep, User};
use crate::utils::time::chrono_to_bson;

const ACTIVITIES: &str = "activities";
const CHALLENGES: &str = "challenges";
const PARTICIPANTS: &str = "challenge_participants";
const QUIZZES: &str = "quizzes";
const ATTEMPTS: &str = "quiz_attempts";
const USERS: &str = "users";

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) => write_error.code == 11000,
        _ => false,
    }
}

/// MongoDB-backed implementation of every store trait
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates the unique indexes the one-record-per-pair rules rely on
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.participants()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user": 1, "challenge": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;

        self.attempts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user": 1, "quiz": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;

        self.activities()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user": 1, "date": -1 })
                    .build(),
            )
            .await?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }

    fn activities(&self) -> Collection<Activity> {
        self.db.collection(ACTIVITIES)
    }

    fn challenges(&self) -> Collection<Challenge> {
        self.db.collection(CHALLENGES)
    }

    fn participants(&self) -> Collection<ChallengeParticipant> {
        self.db.collection(PARTICIPANTS)
    }

    fn quizzes(&self) -> Collection<Quiz> {
        self.db.collection(QUIZZES)
    }

    fn attempts(&self) -> Collection<QuizAttempt> {
        self.db.collection(ATTEMPTS)
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }
}

#[async_trait]
impl ActivityStore for MongoStore {
    async fn insert_activity(&self, activity: &Activity) -> AppResult<()> {
        self.activities().insert_one(activity).await?;
        Ok(())
    }

    async fn find_activity(&self, user: &ObjectId, id: &ObjectId) -> AppResult<Option<Activity>> {
        Ok(self
            .activities()
            .find_one(doc! { "_id": id, "user": user })
            .await?)
    }

    async fn replace_activity(&self, activity: &Activity) -> AppResult<()> {
        self.activities()
            .replace_one(doc! { "_id": activity.id, "user": activity.user }, activity)
            .await?;
        Ok(())
    }

    async fn delete_activity(
        &self,
        user: &ObjectId,
        id: &ObjectId,
    ) -> AppResult<Option<Activity>> {
        Ok(self
            .activities()
            .find_one_and_delete(doc! { "_id": id, "user": user })
            .await?)
    }

    async fn recent_before(
        &self,
        user: &ObjectId,
        before: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Activity>> {
        let cursor = self
            .activities()
            .find(doc! { "user": user, "date": { "$lt": chrono_to_bson(before) } })
            .sort(doc! { "date": -1 })
            .limit(limit)
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn between(
        &self,
        user: &ObjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Activity>> {
        let cursor = self
            .activities()
            .find(doc! {
                "user": user,
                "date": { "$gte": chrono_to_bson(start), "$lte": chrono_to_bson(end) }
            })
            .sort(doc! { "date": 1 })
            .await?;

        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl ChallengeStore for MongoStore {
    async fn insert_challenge(&self, challenge: &Challenge) -> AppResult<()> {
        self.challenges().insert_one(challenge).await?;
        Ok(())
    }

    async fn find_challenge(&self, id: &ObjectId) -> AppResult<Option<Challenge>> {
        Ok(self.challenges().find_one(doc! { "_id": id }).await?)
    }

    async fn replace_challenge(&self, challenge: &Challenge) -> AppResult<()> {
        self.challenges()
            .replace_one(doc! { "_id": challenge.id }, challenge)
            .await?;
        Ok(())
    }

    async fn delete_challenge(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.challenges().delete_one(doc! { "_id": id }).await?;
        if result.deleted_count == 0 {
            return Ok(false);
        }

        let removed = self
            .participants()
            .delete_many(doc! { "challenge": id })
            .await?;
        tracing::info!(
            challenge_id = %id,
            participants = removed.deleted_count,
            "Challenge deleted with participants"
        );
        Ok(true)
    }

    async fn find_open_by_title(
        &self,
        title: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Challenge>> {
        Ok(self
            .challenges()
            .find_one(doc! {
                "title": title,
                "status": {
                    "$in": [ChallengeStatus::Upcoming.as_str(), ChallengeStatus::Active.as_str()]
                },
                "endDate": { "$gte": chrono_to_bson(now) },
            })
            .await?)
    }

    async fn active_challenges(&self, now: DateTime<Utc>) -> AppResult<Vec<Challenge>> {
        let now = chrono_to_bson(now);
        let cursor = self
            .challenges()
            .find(doc! {
                "status": { "$ne": ChallengeStatus::Cancelled.as_str() },
                "startDate": { "$lte": now },
                "endDate": { "$gte": now },
            })
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn increment_participants(&self, id: &ObjectId, by: i32) -> AppResult<()> {
        self.challenges()
            .update_one(
                doc! { "_id": id },
                doc! { "$inc": { "totalParticipants": by } },
            )
            .await?;
        Ok(())
    }

    async fn set_total_emission_saved(&self, id: &ObjectId, total: f64) -> AppResult<()> {
        self.challenges()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "totalEmissionSaved": total,
                        "updatedAt": chrono_to_bson(Utc::now()),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn insert_participant(&self, participant: &ChallengeParticipant) -> AppResult<()> {
        match self.participants().insert_one(participant).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => {
                Err(AppError::conflict("Already joined this challenge"))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_participant(
        &self,
        user: &ObjectId,
        challenge: &ObjectId,
    ) -> AppResult<Option<ChallengeParticipant>> {
        Ok(self
            .participants()
            .find_one(doc! { "user": user, "challenge": challenge })
            .await?)
    }

    async fn active_participants(
        &self,
        challenge: &ObjectId,
    ) -> AppResult<Vec<ChallengeParticipant>> {
        let status = to_bson(&ParticipantStatus::Active)?;
        let cursor = self
            .participants()
            .find(doc! { "challenge": challenge, "status": status })
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn save_participant(&self, participant: &ChallengeParticipant) -> AppResult<()> {
        self.participants()
            .replace_one(doc! { "_id": participant.id }, participant)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl QuizStore for MongoStore {
    async fn insert_quiz(&self, quiz: &Quiz) -> AppResult<()> {
        self.quizzes().insert_one(quiz).await?;
        Ok(())
    }

    async fn find_quiz(&self, id: &ObjectId) -> AppResult<Option<Quiz>> {
        Ok(self.quizzes().find_one(doc! { "_id": id }).await?)
    }

    async fn delete_quiz(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.quizzes().delete_one(doc! { "_id": id }).await?;
        if result.deleted_count == 0 {
            return Ok(false);
        }

        let removed = self.attempts().delete_many(doc! { "quiz": id }).await?;
        tracing::info!(
            quiz_id = %id,
            attempts = removed.deleted_count,
            "Quiz deleted with attempts"
        );
        Ok(true)
    }

    async fn active_quizzes(&self) -> AppResult<Vec<Quiz>> {
        let cursor = self
            .quizzes()
            .find(doc! { "isActive": true })
            .sort(doc! { "createdAt": -1 })
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn find_attempt(
        &self,
        user: &ObjectId,
        quiz: &ObjectId,
    ) -> AppResult<Option<QuizAttempt>> {
        Ok(self
            .attempts()
            .find_one(doc! { "user": user, "quiz": quiz })
            .await?)
    }

    async fn find_attempt_by_id(&self, id: &ObjectId) -> AppResult<Option<QuizAttempt>> {
        Ok(self.attempts().find_one(doc! { "_id": id }).await?)
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> AppResult<()> {
        match self.attempts().insert_one(attempt).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => {
                Err(AppError::conflict("Quiz attempt already exists"))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn complete_attempt(&self, attempt: &QuizAttempt) -> AppResult<bool> {
        let result = self
            .attempts()
            .replace_one(
                doc! {
                    "_id": attempt.id,
                    "status": { "$ne": AttemptStatus::Completed.as_str() },
                },
                attempt,
            )
            .await?;

        Ok(result.matched_count == 1)
    }

    async fn completed_attempts_for_user(&self, user: &ObjectId) -> AppResult<Vec<QuizAttempt>> {
        let cursor = self
            .attempts()
            .find(doc! { "user": user, "status": AttemptStatus::Completed.as_str() })
            .sort(doc! { "completedAt": -1 })
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn completed_attempts_for_quiz(&self, quiz: &ObjectId) -> AppResult<Vec<QuizAttempt>> {
        let cursor = self
            .attempts()
            .find(doc! { "quiz": quiz, "status": AttemptStatus::Completed.as_str() })
            .await?;

        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        self.users().insert_one(user).await?;
        Ok(())
    }

    async fn find_user(&self, id: &ObjectId) -> AppResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": id }).await?)
    }

    async fn adjust_total_emission(&self, id: &ObjectId, delta: f64) -> AppResult<()> {
        self.users()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$inc": { "totalEmission": delta },
                    "$set": { "updatedAt": chrono_to_bson(Utc::now()) },
                },
            )
            .await?;
        Ok(())
    }

    async fn set_target_emission(&self, id: &ObjectId, target: f64) -> AppResult<()> {
        self.users()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "targetEmission": target,
                        "updatedAt": chrono_to_bson(Utc::now()),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn award_trees(&self, id: &ObjectId, count: u32, period: &str) -> AppResult<bool> {
        let result = self
            .users()
            .update_one(
                doc! { "_id": id, "treesAwardedThrough": { "$ne": period } },
                doc! {
                    "$inc": { "totalTrees": i64::from(count) },
                    "$set": {
                        "treesAwardedThrough": period,
                        "updatedAt": chrono_to_bson(Utc::now()),
                    },
                },
            )
            .await?;

        Ok(result.modified_count == 1)
    }

    async fn push_onboarding_step(
        &self,
        id: &ObjectId,
        step: OnboardingStep,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = self
            .users()
            .update_one(
                doc! { "_id": id, "onboardingSteps.stepId": { "$ne": step.as_str() } },
                doc! {
                    "$push": {
                        "onboardingSteps": {
                            "stepId": step.as_str(),
                            "completedAt": chrono_to_bson(at),
                        }
                    },
                    "$set": { "updatedAt": chrono_to_bson(at) },
                },
            )
            .await?;

        Ok(result.modified_count == 1)
    }

    async fn mark_onboarding_completed(&self, id: &ObjectId) -> AppResult<()> {
        self.users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "onboardingCompleted": true } },
            )
            .await?;
        Ok(())
    }
}
