use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::activity::Activity;
use crate::models::challenge::{Baseline, Challenge, ChallengeParticipant};
use crate::store::ActivityStore;
use crate::utils::time::{ceil_days, floor_days};

/// Pre-join activities sampled for the baseline
pub const BASELINE_SAMPLE: i64 = 30;

/// kg CO2e saved per point
pub const KG_PER_POINT: f64 = 10.0;

/// Average emission of the sampled history, extrapolated over the challenge.
pub fn baseline_from_history(history: &[Activity], duration_days: i64) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let avg_daily = history.iter().map(|a| a.emission).sum::<f64>() / history.len() as f64;
    avg_daily * duration_days as f64
}

pub fn current_emission(activities: &[Activity]) -> f64 {
    activities.iter().map(|a| a.emission).sum()
}

pub fn emission_saved(baseline: Baseline, current: f64) -> f64 {
    (baseline.value() - current).max(0.0)
}

pub fn days_participated(
    joined_at: DateTime<Utc>,
    duration_days: i64,
    now: DateTime<Utc>,
) -> i64 {
    duration_days.min(ceil_days(now - joined_at))
}

/// Share of the expected reduction achieved so far, capped at 100
pub fn progress_percentage(
    saved: f64,
    baseline: Baseline,
    target_emission: f64,
    duration_days: i64,
    days_participated: i64,
) -> f64 {
    if baseline.value() <= 0.0 {
        return 0.0;
    }

    let target_per_day = target_emission / duration_days.max(1) as f64;
    let expected = target_per_day * days_participated as f64;
    if expected <= 0.0 {
        return if saved > 0.0 { 100.0 } else { 0.0 };
    }

    (saved / expected * 100.0).min(100.0)
}

pub fn points_for(saved: f64) -> u32 {
    (saved / KG_PER_POINT).floor().max(0.0) as u32
}

/// Extends the streak when the previous recompute was at most a day ago
pub fn next_streak(
    streak_days: u32,
    last_activity: Option<DateTime<Utc>>,
    joined_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u32 {
    let since = last_activity.unwrap_or(joined_at);
    if floor_days(now - since) <= 1 {
        streak_days + 1
    } else {
        1
    }
}

/// Recomputes one participant's standing from their activity history
pub struct ChallengeProgressEngine {
    activities: Arc<dyn ActivityStore>,
}

impl ChallengeProgressEngine {
    pub fn new(activities: Arc<dyn ActivityStore>) -> Self {
        Self { activities }
    }

    /// Updates `participant` in place. Nothing is persisted here, so a failed
    /// activity lookup leaves the caller's copy untouched.
    pub async fn recompute_participant(
        &self,
        participant: &mut ChallengeParticipant,
        challenge: &Challenge,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let duration = challenge.duration_days();

        let baseline = match participant.baseline {
            Baseline::Computed(value) => Baseline::Computed(value),
            Baseline::Unset => {
                let history = self
                    .activities
                    .recent_before(&participant.user, participant.joined_at, BASELINE_SAMPLE)
                    .await?;
                Baseline::Computed(baseline_from_history(&history, duration))
            }
        };

        let during = self
            .activities
            .between(&participant.user, challenge.start_date, challenge.end_date)
            .await?;
        let current = current_emission(&during);

        let saved = emission_saved(baseline, current);
        let participated = days_participated(participant.joined_at, duration, now);

        participant.baseline = baseline;
        participant.current_emission = current;
        participant.emission_saved = saved;
        participant.progress = progress_percentage(
            saved,
            baseline,
            challenge.target_emission,
            duration,
            participated,
        );
        participant.points = points_for(saved);
        participant.streak_days = next_streak(
            participant.streak_days,
            participant.last_activity_date,
            participant.joined_at,
            now,
        );
        participant.last_activity_date = Some(now);
        participant.updated_at = now;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_saved_never_negative() {
        assert_eq!(emission_saved(Baseline::Computed(50.0), 80.0), 0.0);
        assert_eq!(emission_saved(Baseline::Computed(80.0), 50.0), 30.0);
        assert_eq!(emission_saved(Baseline::Unset, 10.0), 0.0);
    }

    #[test]
    fn test_progress_rules() {
        // 30 kg target over 30 days, 10 days in: expected 10 kg
        assert_eq!(
            progress_percentage(5.0, Baseline::Computed(90.0), 30.0, 30, 10),
            50.0
        );
        assert_eq!(
            progress_percentage(50.0, Baseline::Computed(90.0), 30.0, 30, 10),
            100.0
        );
        assert_eq!(
            progress_percentage(5.0, Baseline::Computed(0.0), 30.0, 30, 10),
            0.0
        );
        assert_eq!(
            progress_percentage(5.0, Baseline::Computed(90.0), 30.0, 30, 0),
            100.0
        );
        assert_eq!(
            progress_percentage(0.0, Baseline::Computed(90.0), 30.0, 30, 0),
            0.0
        );
    }

    #[test]
    fn test_points_floor() {
        assert_eq!(points_for(9.99), 0);
        assert_eq!(points_for(10.0), 1);
        assert_eq!(points_for(57.3), 5);
    }

    #[test]
    fn test_days_participated_capped_by_duration() {
        let joined = at(1, 0);
        assert_eq!(days_participated(joined, 30, joined + Duration::hours(5)), 1);
        assert_eq!(days_participated(joined, 3, at(20, 0)), 3);
    }

    #[test]
    fn test_streak() {
        let joined = at(1, 0);
        assert_eq!(next_streak(0, None, joined, at(1, 12)), 1);
        assert_eq!(next_streak(4, Some(at(2, 0)), joined, at(3, 23)), 5);
        assert_eq!(next_streak(4, Some(at(2, 0)), joined, at(4, 1)), 1);
    }
}
