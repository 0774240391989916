use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use mongodb::bson::oid::ObjectId;
use validator::Validate;

use super::cache_service::{leaderboard_key, CacheService};
use super::challenge_progress::ChallengeProgressEngine;
use super::tree_calculator::difficulty_based_trees;
use crate::error::{AppError, AppResult};
use crate::metrics::{CHALLENGE_JOINS_TOTAL, PARTICIPANT_RECOMPUTES_TOTAL};
use crate::models::challenge::{
    BatchReport, Challenge, ChallengeParticipant, ChallengeRanking, ChallengeRef,
    ChallengeResponse, ChallengeRewards, ChallengeStatus, CreateChallengeRequest,
    LeaderboardEntry, LeaderboardResponse, ParticipantFailure, ParticipantProgress,
};
use crate::store::{ActivityStore, ChallengeStore};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// Orders participants by kg saved, then points, both descending
fn standing_cmp(a: &ChallengeParticipant, b: &ChallengeParticipant) -> Ordering {
    b.emission_saved
        .total_cmp(&a.emission_saved)
        .then_with(|| b.points.cmp(&a.points))
}

/// Ranks participants. A rank is one more than the number of participants
/// strictly ahead, so ties share a rank.
pub fn rank_participants(mut participants: Vec<ChallengeParticipant>) -> Vec<LeaderboardEntry> {
    participants.sort_by(standing_cmp);

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(participants.len());
    for (index, p) in participants.iter().enumerate() {
        let rank = match index.checked_sub(1).map(|prev| &participants[prev]) {
            Some(prev) if standing_cmp(prev, p) == Ordering::Equal => entries[index - 1].rank,
            _ => index + 1,
        };
        entries.push(LeaderboardEntry {
            rank,
            user_id: p.user.to_hex(),
            emission_saved: p.emission_saved,
            points: p.points,
            streak_days: p.streak_days,
            progress: p.progress,
        });
    }
    entries
}

pub struct ChallengeService {
    challenges: Arc<dyn ChallengeStore>,
    engine: ChallengeProgressEngine,
    cache: CacheService,
    leaderboard_ttl_secs: u64,
}

impl ChallengeService {
    pub fn new(
        challenges: Arc<dyn ChallengeStore>,
        activities: Arc<dyn ActivityStore>,
        cache: CacheService,
        leaderboard_ttl_secs: u64,
    ) -> Self {
        Self {
            challenges,
            engine: ChallengeProgressEngine::new(activities),
            cache,
            leaderboard_ttl_secs,
        }
    }

    /// Loads a challenge and persists its clock-derived status if it moved on
    async fn load_current(&self, id: &ObjectId, now: DateTime<Utc>) -> AppResult<Challenge> {
        let mut challenge = self
            .challenges
            .find_challenge(id)
            .await?
            .ok_or_else(|| AppError::not_found("Challenge not found"))?;

        let status = challenge.status_at(now);
        if status != challenge.status {
            tracing::debug!(
                challenge_id = %id,
                from = challenge.status.as_str(),
                to = status.as_str(),
                "Challenge status advanced"
            );
            challenge.status = status;
            challenge.updated_at = now;
            self.challenges.replace_challenge(&challenge).await?;
        }
        Ok(challenge)
    }

    pub async fn create(
        &self,
        creator: ObjectId,
        req: CreateChallengeRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Challenge> {
        req.validate()?;

        if req.end_date <= req.start_date {
            return Err(AppError::invalid_input("End date must be after start date"));
        }

        let title = req.title.trim().to_string();
        if self
            .challenges
            .find_open_by_title(&title, now)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(
                "A challenge with this title already exists (active or upcoming)",
            ));
        }

        let difficulty = req.difficulty.unwrap_or_default();
        let rewards = req.rewards.unwrap_or_default();

        let mut challenge = Challenge {
            id: ObjectId::new(),
            title,
            description: req.description,
            category: req.category,
            start_date: req.start_date,
            end_date: req.end_date,
            target_emission: req.target_emission,
            difficulty,
            max_participants: req.max_participants,
            status: ChallengeStatus::Upcoming,
            created_by: creator,
            rules: req.rules,
            rewards: ChallengeRewards {
                points: rewards.points,
                badge: rewards.badge,
                description: rewards.description,
                trees: rewards
                    .trees
                    .unwrap_or_else(|| difficulty_based_trees(difficulty)),
            },
            total_participants: 0,
            total_emission_saved: 0.0,
            created_at: now,
            updated_at: now,
        };
        challenge.refresh_status(now);

        self.challenges.insert_challenge(&challenge).await?;
        tracing::info!(
            challenge_id = %challenge.id,
            status = challenge.status.as_str(),
            "Challenge created"
        );
        Ok(challenge)
    }

    /// Challenge view with the caller's participation, if any
    pub async fn get(
        &self,
        user: &ObjectId,
        id: &ObjectId,
        now: DateTime<Utc>,
    ) -> AppResult<ChallengeResponse> {
        let challenge = self.load_current(id, now).await?;
        let participation = self.challenges.find_participant(user, id).await?;
        Ok(ChallengeResponse::build(challenge, participation.as_ref(), now))
    }

    pub async fn join(
        &self,
        user: ObjectId,
        id: &ObjectId,
        now: DateTime<Utc>,
    ) -> AppResult<ChallengeParticipant> {
        let challenge = self.load_current(id, now).await?;

        if matches!(
            challenge.status,
            ChallengeStatus::Completed | ChallengeStatus::Cancelled
        ) {
            return Err(AppError::conflict(
                "Cannot join completed or cancelled challenge",
            ));
        }

        if self.challenges.find_participant(&user, id).await?.is_some() {
            return Err(AppError::conflict("Already joined this challenge"));
        }

        if challenge.is_full() {
            return Err(AppError::conflict("Challenge is full"));
        }

        let participant = ChallengeParticipant::new(user, *id, now);
        self.challenges.insert_participant(&participant).await?;
        self.challenges.increment_participants(id, 1).await?;
        self.cache.invalidate(&leaderboard_key(&id.to_hex())).await;

        CHALLENGE_JOINS_TOTAL
            .with_label_values(&[challenge.category.as_str()])
            .inc();
        tracing::info!(user_id = %user, challenge_id = %id, "Joined challenge");

        Ok(participant)
    }

    pub async fn cancel(&self, id: &ObjectId, now: DateTime<Utc>) -> AppResult<Challenge> {
        let mut challenge = self.load_current(id, now).await?;

        match challenge.status {
            ChallengeStatus::Cancelled => return Ok(challenge),
            ChallengeStatus::Completed => {
                return Err(AppError::conflict("Cannot cancel a completed challenge"))
            }
            ChallengeStatus::Upcoming | ChallengeStatus::Active => {}
        }

        challenge.status = ChallengeStatus::Cancelled;
        challenge.updated_at = now;
        self.challenges.replace_challenge(&challenge).await?;
        tracing::info!(challenge_id = %id, "Challenge cancelled");
        Ok(challenge)
    }

    pub async fn delete(&self, id: &ObjectId) -> AppResult<()> {
        if !self.challenges.delete_challenge(id).await? {
            return Err(AppError::not_found("Challenge not found"));
        }
        self.cache.invalidate(&leaderboard_key(&id.to_hex())).await;
        Ok(())
    }

    async fn ranking(&self, challenge: &Challenge) -> AppResult<ChallengeRanking> {
        let key = leaderboard_key(&challenge.id.to_hex());
        if let Some(cached) = self.cache.get_json::<ChallengeRanking>(&key).await {
            return Ok(cached);
        }

        let participants = self.challenges.active_participants(&challenge.id).await?;
        let ranking = ChallengeRanking {
            challenge: ChallengeRef {
                id: challenge.id.to_hex(),
                title: challenge.title.clone(),
            },
            entries: rank_participants(participants),
        };

        self.cache
            .set_json(&key, &ranking, self.leaderboard_ttl_secs)
            .await;
        Ok(ranking)
    }

    pub async fn leaderboard(
        &self,
        user: &ObjectId,
        id: &ObjectId,
        limit: usize,
    ) -> AppResult<LeaderboardResponse> {
        let challenge = self
            .challenges
            .find_challenge(id)
            .await?
            .ok_or_else(|| AppError::not_found("Challenge not found"))?;

        let ranking = self.ranking(&challenge).await?;
        Ok(ranking.view_for(&user.to_hex(), limit))
    }

    /// Read-compute-write for one participant, kept sequential
    async fn recompute_one(
        &self,
        mut participant: ChallengeParticipant,
        challenge: &Challenge,
        now: DateTime<Utc>,
    ) -> Result<ChallengeParticipant, ParticipantFailure> {
        let outcome = async {
            self.engine
                .recompute_participant(&mut participant, challenge, now)
                .await?;
            self.challenges.save_participant(&participant).await
        }
        .await;

        match outcome {
            Ok(()) => Ok(participant),
            Err(e) => Err(ParticipantFailure {
                participant_id: participant.id.to_hex(),
                user_id: participant.user.to_hex(),
                error: e.to_string(),
            }),
        }
    }

    /// Recomputes every active participant of an active challenge concurrently.
    /// A failing participant is logged and reported; the rest still update.
    pub async fn recompute_progress(
        &self,
        id: &ObjectId,
        now: DateTime<Utc>,
    ) -> AppResult<BatchReport> {
        let challenge = self.load_current(id, now).await?;
        if challenge.status != ChallengeStatus::Active {
            return Err(AppError::conflict("Challenge is not active"));
        }

        let participants = self.challenges.active_participants(id).await?;
        let processed = participants.len();
        let duration = challenge.duration_days();

        let outcomes = join_all(
            participants
                .into_iter()
                .map(|p| self.recompute_one(p, &challenge, now)),
        )
        .await;

        let mut updated = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(p) => {
                    PARTICIPANT_RECOMPUTES_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    updated.push(ParticipantProgress::from_participant(&p, duration, now));
                }
                Err(failure) => {
                    PARTICIPANT_RECOMPUTES_TOTAL
                        .with_label_values(&["error"])
                        .inc();
                    tracing::warn!(
                        challenge_id = %id,
                        participant_id = %failure.participant_id,
                        user_id = %failure.user_id,
                        error = %failure.error,
                        "Participant progress recompute failed"
                    );
                    failed.push(failure);
                }
            }
        }

        let total_emission_saved: f64 = self
            .challenges
            .active_participants(id)
            .await?
            .iter()
            .map(|p| p.emission_saved)
            .sum();
        self.challenges
            .set_total_emission_saved(id, total_emission_saved)
            .await?;
        self.cache.invalidate(&leaderboard_key(&id.to_hex())).await;

        tracing::info!(
            challenge_id = %id,
            processed,
            updated = updated.len(),
            failed = failed.len(),
            total_emission_saved,
            "Challenge progress recomputed"
        );

        Ok(BatchReport {
            challenge_id: id.to_hex(),
            processed,
            updated,
            failed,
            total_emission_saved,
        })
    }

    /// Runs `recompute_progress` for every currently active challenge
    pub async fn recompute_all_active(&self, now: DateTime<Utc>) -> AppResult<Vec<BatchReport>> {
        let challenges = self.challenges.active_challenges(now).await?;
        let mut reports = Vec::with_capacity(challenges.len());

        for challenge in challenges {
            match self.recompute_progress(&challenge.id, now).await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(
                    challenge_id = %challenge.id,
                    error = %e,
                    "Skipping challenge progress recompute"
                ),
            }
        }

        Ok(reports)
    }
}
