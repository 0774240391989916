use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use carbontrack_api::{
    error::{AppError, AppResult},
    models::activity::Activity,
    models::challenge::{Baseline, Challenge, ChallengeCategory, CreateChallengeRequest},
    services::{cache_service::CacheService, challenge_service::ChallengeService, AppState},
    store::{ActivityStore, ChallengeStore, MemoryStore},
};
use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde_json::json;

mod common;

fn ten_day_challenge(title: &str, now: DateTime<Utc>) -> CreateChallengeRequest {
    CreateChallengeRequest {
        title: title.to_string(),
        description: "Cut your weekly footprint".to_string(),
        category: ChallengeCategory::General,
        start_date: now - Duration::days(2),
        end_date: now + Duration::days(8),
        target_emission: 100.0,
        difficulty: None,
        max_participants: None,
        rules: vec![],
        rewards: None,
    }
}

async fn seed_history(store: &MemoryStore, user: ObjectId, emissions: &[f64], now: DateTime<Utc>) {
    for (i, emission) in emissions.iter().enumerate() {
        let date = now - Duration::days(3 + i as i64);
        common::seed_activity(store, user, *emission, date).await;
    }
}

/// Three participants with known baselines, joined at `now`
async fn three_participant_setup(
    state: &AppState,
    store: &MemoryStore,
    now: DateTime<Utc>,
) -> (Challenge, [ObjectId; 3]) {
    let challenge = state
        .challenges
        .create(ObjectId::new(), ten_day_challenge("Low carbon week", now), now)
        .await
        .unwrap();
    assert_eq!(challenge.duration_days(), 10);

    let (a, b, c) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
    seed_history(store, a, &[5.0, 5.0, 5.0], now).await;
    seed_history(store, b, &[2.0, 2.0], now).await;

    for user in [a, b, c] {
        state.challenges.join(user, &challenge.id, now).await.unwrap();
    }

    let during = now + Duration::hours(1);
    common::seed_activity(store, a, 10.0, during).await;
    common::seed_activity(store, b, 5.0, during).await;
    common::seed_activity(store, c, 3.0, during).await;

    (challenge, [a, b, c])
}

#[tokio::test]
async fn test_recompute_updates_every_participant() {
    let (state, store) = common::memory_state();
    let now = Utc::now();
    let (challenge, [a, b, c]) = three_participant_setup(&state, &store, now).await;

    let report = state
        .challenges
        .recompute_progress(&challenge.id, now + Duration::days(1))
        .await
        .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.updated.len(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(report.total_emission_saved, 55.0);

    let pa = store.find_participant(&a, &challenge.id).await.unwrap().unwrap();
    assert_eq!(pa.baseline, Baseline::Computed(50.0));
    assert_eq!(pa.current_emission, 10.0);
    assert_eq!(pa.emission_saved, 40.0);
    assert_eq!(pa.points, 4);
    assert_eq!(pa.streak_days, 1);

    let pb = store.find_participant(&b, &challenge.id).await.unwrap().unwrap();
    assert_eq!(pb.baseline, Baseline::Computed(20.0));
    assert_eq!(pb.emission_saved, 15.0);
    assert_eq!(pb.points, 1);

    let pc = store.find_participant(&c, &challenge.id).await.unwrap().unwrap();
    assert_eq!(pc.baseline, Baseline::Computed(0.0));
    assert_eq!(pc.emission_saved, 0.0);
    assert_eq!(pc.progress, 0.0);

    let stored = store.find_challenge(&challenge.id).await.unwrap().unwrap();
    assert_eq!(stored.total_emission_saved, 55.0);
    assert_eq!(stored.total_participants, 3);
}

#[tokio::test]
async fn test_baseline_is_frozen_after_first_recompute() {
    let (state, store) = common::memory_state();
    let now = Utc::now();
    let (challenge, [a, _, _]) = three_participant_setup(&state, &store, now).await;

    state
        .challenges
        .recompute_progress(&challenge.id, now + Duration::days(1))
        .await
        .unwrap();

    // Late-arriving history must not move the baseline
    common::seed_activity(&store, a, 50.0, now - Duration::days(1) - Duration::hours(1)).await;
    state
        .challenges
        .recompute_progress(&challenge.id, now + Duration::days(2))
        .await
        .unwrap();

    let pa = store.find_participant(&a, &challenge.id).await.unwrap().unwrap();
    assert_eq!(pa.baseline, Baseline::Computed(50.0));
    assert_eq!(pa.current_emission, 60.0);
    assert_eq!(pa.emission_saved, 0.0);
    assert_eq!(pa.points, 0);
}

#[tokio::test]
async fn test_leaderboard_ranks_by_saved() {
    let (state, store) = common::memory_state();
    let now = Utc::now();
    let (challenge, [a, b, c]) = three_participant_setup(&state, &store, now).await;

    state
        .challenges
        .recompute_progress(&challenge.id, now + Duration::days(1))
        .await
        .unwrap();

    let board = state
        .challenges
        .leaderboard(&b, &challenge.id, 2)
        .await
        .unwrap();

    assert_eq!(board.challenge.title, "Low carbon week");
    assert_eq!(board.leaderboard.len(), 2);
    assert_eq!(board.leaderboard[0].user_id, a.to_hex());
    assert_eq!(board.leaderboard[0].rank, 1);
    assert_eq!(board.leaderboard[1].user_id, b.to_hex());

    let me = board.user_rank.unwrap();
    assert_eq!(me.rank, 2);
    assert_eq!(me.emission_saved, 15.0);

    let board_c = state
        .challenges
        .leaderboard(&c, &challenge.id, 2)
        .await
        .unwrap();
    assert_eq!(board_c.user_rank.unwrap().rank, 3);
}

#[tokio::test]
async fn test_join_rules() {
    let (state, _) = common::memory_state();
    let now = Utc::now();
    let mut req = ten_day_challenge("Solo ride", now);
    req.max_participants = Some(1);
    let challenge = state
        .challenges
        .create(ObjectId::new(), req, now)
        .await
        .unwrap();

    let first = ObjectId::new();
    state.challenges.join(first, &challenge.id, now).await.unwrap();

    let again = state.challenges.join(first, &challenge.id, now).await.unwrap_err();
    assert!(matches!(again, AppError::Conflict(_)));

    let full = state
        .challenges
        .join(ObjectId::new(), &challenge.id, now)
        .await
        .unwrap_err();
    assert!(matches!(full, AppError::Conflict(_)));

    let after_end = state
        .challenges
        .join(ObjectId::new(), &challenge.id, now + Duration::days(9))
        .await
        .unwrap_err();
    assert!(matches!(after_end, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_duplicate_open_title_rejected() {
    let (state, _) = common::memory_state();
    let now = Utc::now();

    state
        .challenges
        .create(ObjectId::new(), ten_day_challenge("Meatless May", now), now)
        .await
        .unwrap();
    let err = state
        .challenges
        .create(ObjectId::new(), ten_day_challenge("Meatless May", now), now)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let mut backwards = ten_day_challenge("Backwards", now);
    backwards.end_date = backwards.start_date;
    let err = state
        .challenges
        .create(ObjectId::new(), backwards, now)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_recompute_refuses_upcoming_challenge() {
    let (state, _) = common::memory_state();
    let now = Utc::now();
    let mut req = ten_day_challenge("Next month", now);
    req.start_date = now + Duration::days(5);
    req.end_date = now + Duration::days(15);
    let challenge = state
        .challenges
        .create(ObjectId::new(), req, now)
        .await
        .unwrap();

    let err = state
        .challenges
        .recompute_progress(&challenge.id, now)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

/// Activity store whose range query fails for one user
struct FlakyActivities {
    inner: Arc<MemoryStore>,
    broken_user: ObjectId,
}

#[async_trait]
impl ActivityStore for FlakyActivities {
    async fn insert_activity(&self, activity: &Activity) -> AppResult<()> {
        self.inner.insert_activity(activity).await
    }

    async fn find_activity(&self, user: &ObjectId, id: &ObjectId) -> AppResult<Option<Activity>> {
        self.inner.find_activity(user, id).await
    }

    async fn replace_activity(&self, activity: &Activity) -> AppResult<()> {
        self.inner.replace_activity(activity).await
    }

    async fn delete_activity(
        &self,
        user: &ObjectId,
        id: &ObjectId,
    ) -> AppResult<Option<Activity>> {
        self.inner.delete_activity(user, id).await
    }

    async fn recent_before(
        &self,
        user: &ObjectId,
        before: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Activity>> {
        self.inner.recent_before(user, before, limit).await
    }

    async fn between(
        &self,
        user: &ObjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Activity>> {
        if user == &self.broken_user {
            return Err(AppError::Internal(anyhow::anyhow!("activity lookup timed out")));
        }
        self.inner.between(user, start, end).await
    }
}

#[tokio::test]
async fn test_one_failing_participant_does_not_block_others() {
    let (state, store) = common::memory_state();
    let now = Utc::now();
    let (challenge, [a, b, c]) = three_participant_setup(&state, &store, now).await;

    let flaky = ChallengeService::new(
        store.clone(),
        Arc::new(FlakyActivities {
            inner: store.clone(),
            broken_user: b,
        }),
        CacheService::disabled(),
        60,
    );

    let report = flaky
        .recompute_progress(&challenge.id, now + Duration::days(1))
        .await
        .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.updated.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].user_id, b.to_hex());
    assert_eq!(report.total_emission_saved, 40.0);

    let pa = store.find_participant(&a, &challenge.id).await.unwrap().unwrap();
    assert_eq!(pa.emission_saved, 40.0);
    let pc = store.find_participant(&c, &challenge.id).await.unwrap().unwrap();
    assert_eq!(pc.baseline, Baseline::Computed(0.0));

    let pb = store.find_participant(&b, &challenge.id).await.unwrap().unwrap();
    assert_eq!(pb.baseline, Baseline::Unset);
    assert_eq!(pb.points, 0);
}

#[tokio::test]
async fn test_challenge_endpoints() {
    let (app, _, store) = common::create_test_app();
    let now = Utc::now();
    let user = common::seed_user(&store, "Maya").await;
    let token = common::token_for(&user.id, "user");
    let admin = common::token_for(&ObjectId::new(), "admin");

    let body = json!({
        "title": "Bike to work",
        "description": "Swap the car for a bike",
        "category": "Transportation",
        "start_date": (now - Duration::days(1)).to_rfc3339(),
        "end_date": (now + Duration::days(6)).to_rfc3339(),
        "target_emission": 20.0
    });

    let (status, _) =
        common::send(&app, "POST", "/api/v1/challenges", Some(&token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) =
        common::send(&app, "POST", "/api/v1/challenges", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], json!("active"));
    let id = created["id"].as_str().unwrap().to_string();

    let (status, joined) = common::send(
        &app,
        "POST",
        &format!("/api/v1/challenges/{}/join", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(joined["total_participants"], json!(1));
    assert!(joined["participation"].is_object());

    let (status, _) = common::send(
        &app,
        "POST",
        &format!("/api/v1/challenges/{}/join", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, report) = common::send(
        &app,
        "POST",
        &format!("/api/v1/challenges/{}/update-progress", id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["processed"], json!(1));

    let (status, board) = common::send(
        &app,
        "GET",
        &format!("/api/v1/challenges/{}/leaderboard?limit=500", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["user_rank"]["rank"], json!(1));

    let (status, body) = common::send(
        &app,
        "GET",
        "/api/v1/challenges/not-an-id",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid challenge ID"));
}
