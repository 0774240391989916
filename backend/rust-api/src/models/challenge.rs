use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option, Difficulty};
use crate::services::challenge_progress;
use crate::utils::time::ceil_days;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChallengeCategory {
    Transportation,
    Food,
    Energy,
    Shopping,
    General,
}

impl ChallengeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeCategory::Transportation => "Transportation",
            ChallengeCategory::Food => "Food",
            ChallengeCategory::Energy => "Energy",
            ChallengeCategory::Shopping => "Shopping",
            ChallengeCategory::General => "General",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    #[default]
    Upcoming,
    Active,
    Completed,
    Cancelled,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Upcoming => "upcoming",
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRewards {
    #[serde(default)]
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Trees granted on completion
    #[serde(default)]
    pub trees: u32,
}

/// Challenge stored in MongoDB "challenges" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub description: String,
    pub category: ChallengeCategory,
    #[serde(with = "bson_datetime_as_chrono")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub end_date: DateTime<Utc>,
    /// kg CO2e reduction the challenge aims for over its whole duration
    pub target_emission: f64,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub status: ChallengeStatus,
    pub created_by: ObjectId,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub rewards: ChallengeRewards,
    #[serde(default)]
    pub total_participants: u32,
    #[serde(default)]
    pub total_emission_saved: f64,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl Challenge {
    /// Whole days between start and end, rounded up
    pub fn duration_days(&self) -> i64 {
        ceil_days(self.end_date - self.start_date).max(1)
    }

    /// Status implied by the wall clock; cancellation is sticky.
    pub fn status_at(&self, now: DateTime<Utc>) -> ChallengeStatus {
        if self.status == ChallengeStatus::Cancelled {
            ChallengeStatus::Cancelled
        } else if now < self.start_date {
            ChallengeStatus::Upcoming
        } else if now <= self.end_date {
            ChallengeStatus::Active
        } else {
            ChallengeStatus::Completed
        }
    }

    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        self.status = self.status_at(now);
    }

    pub fn days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        if self.status != ChallengeStatus::Active {
            return None;
        }
        if now > self.end_date {
            return Some(0);
        }
        Some(ceil_days(self.end_date - now))
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.target_emission == 0.0 {
            return 100.0;
        }
        (self.total_emission_saved / self.target_emission * 100.0)
            .round()
            .min(100.0)
    }

    pub fn is_full(&self) -> bool {
        matches!(self.max_participants, Some(max) if self.total_participants >= max)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    #[default]
    Active,
    Completed,
    Dropped,
}

/// Pre-join emission extrapolated over the challenge duration.
///
/// Stored as `baselineEmission: null | number` so a computed zero is never
/// mistaken for "not computed yet".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Baseline {
    #[default]
    Unset,
    Computed(f64),
}

impl Baseline {
    pub fn value(&self) -> f64 {
        match self {
            Baseline::Unset => 0.0,
            Baseline::Computed(value) => *value,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Baseline::Unset)
    }
}

impl From<Option<f64>> for Baseline {
    fn from(value: Option<f64>) -> Self {
        value.map(Baseline::Computed).unwrap_or(Baseline::Unset)
    }
}

impl From<Baseline> for Option<f64> {
    fn from(baseline: Baseline) -> Self {
        match baseline {
            Baseline::Unset => None,
            Baseline::Computed(value) => Some(value),
        }
    }
}

/// Join record stored in MongoDB "challenge_participants" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeParticipant {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user: ObjectId,
    pub challenge: ObjectId,
    #[serde(with = "bson_datetime_as_chrono")]
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ParticipantStatus,
    #[serde(rename = "baselineEmission", default)]
    pub baseline: Baseline,
    #[serde(default)]
    pub current_emission: f64,
    #[serde(default)]
    pub emission_saved: f64,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub streak_days: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub last_activity_date: Option<DateTime<Utc>>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl ChallengeParticipant {
    pub fn new(user: ObjectId, challenge: ObjectId, now: DateTime<Utc>) -> Self {
        Self {
            id: ObjectId::new(),
            user,
            challenge,
            joined_at: now,
            status: ParticipantStatus::Active,
            baseline: Baseline::Unset,
            current_emission: 0.0,
            emission_saved: 0.0,
            points: 0,
            progress: 0.0,
            streak_days: 0,
            last_activity_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Days since joining, never more than the challenge lasts.
    pub fn days_participated(&self, duration_days: i64, now: DateTime<Utc>) -> i64 {
        let until = if self.status == ParticipantStatus::Completed {
            self.updated_at
        } else {
            now
        };
        challenge_progress::days_participated(self.joined_at, duration_days, until)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateChallengeRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Title must be between 1 and 100 characters"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 500,
        message = "Description must be between 1 and 500 characters"
    ))]
    pub description: String,

    pub category: ChallengeCategory,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    #[validate(range(exclusive_min = 0.0, message = "Target emission must be positive"))]
    pub target_emission: f64,

    pub difficulty: Option<Difficulty>,

    #[validate(range(min = 1, message = "Max participants must be at least 1"))]
    pub max_participants: Option<u32>,

    #[serde(default)]
    pub rules: Vec<String>,

    pub rewards: Option<ChallengeRewardsRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChallengeRewardsRequest {
    #[serde(default)]
    pub points: u32,
    pub badge: Option<String>,
    pub description: Option<String>,
    /// Defaults from difficulty when absent
    pub trees: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipationSummary {
    pub status: ParticipantStatus,
    pub emission_saved: f64,
    pub points: u32,
    pub progress: f64,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: ChallengeCategory,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub target_emission: f64,
    pub difficulty: Difficulty,
    pub max_participants: Option<u32>,
    pub status: ChallengeStatus,
    pub rules: Vec<String>,
    pub rewards: ChallengeRewards,
    pub total_participants: u32,
    pub total_emission_saved: f64,
    pub duration: i64,
    pub days_remaining: Option<i64>,
    pub progress_percentage: f64,
    pub participation: Option<ParticipationSummary>,
}

impl ChallengeResponse {
    pub fn build(
        challenge: Challenge,
        participation: Option<&ChallengeParticipant>,
        now: DateTime<Utc>,
    ) -> Self {
        let duration = challenge.duration_days();
        let days_remaining = challenge.days_remaining(now);
        let progress_percentage = challenge.progress_percentage();

        ChallengeResponse {
            id: challenge.id.to_hex(),
            title: challenge.title,
            description: challenge.description,
            category: challenge.category,
            start_date: challenge.start_date,
            end_date: challenge.end_date,
            target_emission: challenge.target_emission,
            difficulty: challenge.difficulty,
            max_participants: challenge.max_participants,
            status: challenge.status,
            rules: challenge.rules,
            rewards: challenge.rewards,
            total_participants: challenge.total_participants,
            total_emission_saved: challenge.total_emission_saved,
            duration,
            days_remaining,
            progress_percentage,
            participation: participation.map(|p| ParticipationSummary {
                status: p.status,
                emission_saved: p.emission_saved,
                points: p.points,
                progress: p.progress,
            }),
        }
    }
}

/// Per-participant view of a recompute result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantProgress {
    pub participant_id: String,
    pub user_id: String,
    pub baseline_emission: Option<f64>,
    pub current_emission: f64,
    pub emission_saved: f64,
    pub points: u32,
    pub progress: f64,
    pub streak_days: u32,
    pub days_participated: i64,
}

impl ParticipantProgress {
    pub fn from_participant(
        participant: &ChallengeParticipant,
        duration_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        ParticipantProgress {
            participant_id: participant.id.to_hex(),
            user_id: participant.user.to_hex(),
            baseline_emission: participant.baseline.into(),
            current_emission: participant.current_emission,
            emission_saved: participant.emission_saved,
            points: participant.points,
            progress: participant.progress,
            streak_days: participant.streak_days,
            days_participated: participant.days_participated(duration_days, now),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantFailure {
    pub participant_id: String,
    pub user_id: String,
    pub error: String,
}

/// Outcome of one challenge-wide progress pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub challenge_id: String,
    pub processed: usize,
    pub updated: Vec<ParticipantProgress>,
    pub failed: Vec<ParticipantFailure>,
    pub total_emission_saved: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub emission_saved: f64,
    pub points: u32,
    pub streak_days: u32,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRank {
    pub rank: usize,
    pub emission_saved: f64,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub challenge: ChallengeRef,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub user_rank: Option<UserRank>,
}

/// Complete ranking of a challenge, cached as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRanking {
    pub challenge: ChallengeRef,
    pub entries: Vec<LeaderboardEntry>,
}

impl ChallengeRanking {
    pub fn view_for(&self, user_id: &str, limit: usize) -> LeaderboardResponse {
        let user_rank = self
            .entries
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| UserRank {
                rank: entry.rank,
                emission_saved: entry.emission_saved,
                points: entry.points,
            });

        LeaderboardResponse {
            challenge: self.challenge.clone(),
            leaderboard: self.entries.iter().take(limit).cloned().collect(),
            user_rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn challenge(start: DateTime<Utc>, days: i64) -> Challenge {
        Challenge {
            id: ObjectId::new(),
            title: "Car-free month".to_string(),
            description: "Leave the car at home".to_string(),
            category: ChallengeCategory::Transportation,
            start_date: start,
            end_date: start + Duration::days(days),
            target_emission: 50.0,
            difficulty: Difficulty::Medium,
            max_participants: Some(2),
            status: ChallengeStatus::Upcoming,
            created_by: ObjectId::new(),
            rules: vec![],
            rewards: ChallengeRewards::default(),
            total_participants: 0,
            total_emission_saved: 0.0,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn status_follows_the_clock_unless_cancelled() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let mut c = challenge(start, 30);

        assert_eq!(c.status_at(start - Duration::hours(1)), ChallengeStatus::Upcoming);
        assert_eq!(c.status_at(start), ChallengeStatus::Active);
        assert_eq!(c.status_at(c.end_date), ChallengeStatus::Active);
        assert_eq!(
            c.status_at(c.end_date + Duration::seconds(1)),
            ChallengeStatus::Completed
        );

        c.status = ChallengeStatus::Cancelled;
        c.refresh_status(start + Duration::days(3));
        assert_eq!(c.status, ChallengeStatus::Cancelled);
    }

    #[test]
    fn derived_fields() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let mut c = challenge(start, 30);
        c.end_date += Duration::hours(2);
        assert_eq!(c.duration_days(), 31);

        let now = start + Duration::days(10);
        c.refresh_status(now);
        assert_eq!(c.days_remaining(now), Some(21));

        c.total_emission_saved = 80.0;
        assert_eq!(c.progress_percentage(), 100.0);
        c.total_emission_saved = 12.4;
        assert_eq!(c.progress_percentage(), 25.0);

        c.total_participants = 2;
        assert!(c.is_full());
    }

    #[test]
    fn reported_days_stop_at_challenge_length() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let c = challenge(start, 10);
        let p = ChallengeParticipant::new(ObjectId::new(), c.id, start);
        let duration = c.duration_days();

        let mid = ParticipantProgress::from_participant(&p, duration, start + Duration::days(4));
        assert_eq!(mid.days_participated, 4);

        let late = ParticipantProgress::from_participant(&p, duration, start + Duration::days(45));
        assert_eq!(late.days_participated, 10);
    }

    #[test]
    fn baseline_keeps_computed_zero_distinct() {
        assert_eq!(Baseline::from(None), Baseline::Unset);
        assert_eq!(Baseline::from(Some(0.0)), Baseline::Computed(0.0));
        assert!(!Baseline::Computed(0.0).is_unset());

        let stored: Option<f64> = Baseline::Unset.into();
        assert_eq!(stored, None);
    }

    #[test]
    fn ranking_view_limits_and_finds_caller() {
        let entries = (1..=5)
            .map(|i| LeaderboardEntry {
                rank: i,
                user_id: format!("user-{}", i),
                emission_saved: 100.0 - i as f64,
                points: 0,
                streak_days: 1,
                progress: 0.0,
            })
            .collect();
        let ranking = ChallengeRanking {
            challenge: ChallengeRef {
                id: "c".to_string(),
                title: "t".to_string(),
            },
            entries,
        };

        let view = ranking.view_for("user-4", 3);
        assert_eq!(view.leaderboard.len(), 3);
        assert_eq!(view.user_rank.map(|r| r.rank), Some(4));
        assert!(ranking.view_for("nobody", 3).user_rank.is_none());
    }
}
