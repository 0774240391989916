use carbontrack_api::{
    error::AppError,
    models::activity::{ActivityCategory, ActivityInput, LogActivityRequest, UpdateActivityRequest},
    models::dashboard::DashboardPeriod,
    store::UserStore,
};
use chrono::{DateTime, TimeZone, Utc};

mod common;

fn at(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, 12, 0, 0).unwrap()
}

fn ride(distance: f64, date: Option<DateTime<Utc>>) -> LogActivityRequest {
    LogActivityRequest {
        input: ActivityInput::Transportation {
            distance,
            vehicle_type: "car_medium_petrol".to_string(),
        },
        note: None,
        date,
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[tokio::test]
async fn test_activity_lifecycle_tracks_user_total() {
    let (state, store) = common::memory_state();
    let user = common::seed_user(&store, "Ana").await;
    let now = at(3, 15);

    let logged = state.activities.log(user.id, ride(15.0, None), now).await.unwrap();
    assert_eq!(logged.emission, 2.83);
    assert_eq!(logged.category, ActivityCategory::Transportation);
    assert_eq!(logged.date, now);

    let total = store.find_user(&user.id).await.unwrap().unwrap().total_emission;
    assert!(close(total, 2.83));

    let updated = state
        .activities
        .update(
            &user.id,
            &logged.id,
            UpdateActivityRequest {
                input: Some(ActivityInput::Transportation {
                    distance: 30.0,
                    vehicle_type: "car_medium_petrol".to_string(),
                }),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(updated.emission, 5.67);

    let total = store.find_user(&user.id).await.unwrap().unwrap().total_emission;
    assert!(close(total, 5.67));

    state.activities.delete(&user.id, &logged.id).await.unwrap();
    let total = store.find_user(&user.id).await.unwrap().unwrap().total_emission;
    assert!(close(total, 0.0));

    let err = state.activities.get(&user.id, &logged.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_activity_belongs_to_its_owner() {
    let (state, store) = common::memory_state();
    let owner = common::seed_user(&store, "Ana").await;
    let other = common::seed_user(&store, "Ben").await;
    let now = at(3, 15);

    let logged = state.activities.log(owner.id, ride(10.0, None), now).await.unwrap();

    let err = state.activities.get(&other.id, &logged.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = state.activities.delete(&other.id, &logged.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(state.activities.get(&owner.id, &logged.id).await.is_ok());
}

#[tokio::test]
async fn test_unknown_factor_is_rejected() {
    let (state, store) = common::memory_state();
    let user = common::seed_user(&store, "Ana").await;

    let req = LogActivityRequest {
        input: ActivityInput::Food {
            weight: 1.0,
            food_type: "dragon_fruit_kg".to_string(),
        },
        note: None,
        date: None,
    };
    let err = state.activities.log(user.id, req, at(3, 15)).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let total = store.find_user(&user.id).await.unwrap().unwrap().total_emission;
    assert_eq!(total, 0.0);
}

#[tokio::test]
async fn test_monthly_dashboard_summary() {
    let (state, store) = common::memory_state();
    let user = common::seed_user(&store, "Ana").await;
    let now = at(3, 15);

    common::seed_activity(&store, user.id, 20.0, at(3, 2)).await;
    common::seed_activity(&store, user.id, 10.0, at(3, 10)).await;
    common::seed_activity(&store, user.id, 99.0, at(2, 20)).await;
    state
        .activities
        .log(user.id, ride(15.0, Some(at(3, 12))), now)
        .await
        .unwrap();

    let summary = state
        .dashboard
        .summary(&user.id, DashboardPeriod::Monthly, now)
        .await
        .unwrap();

    assert_eq!(summary.activity_count, 3);
    assert_eq!(summary.total_emission, 32.83);
    assert_eq!(summary.daily_average, 2.19);
    assert_eq!(summary.chart.len(), 31);
    assert_eq!(summary.breakdown.len(), 2);
    assert_eq!(summary.breakdown[0].category, ActivityCategory::Food);
    assert_eq!(summary.breakdown[0].total, 30.0);
    assert_eq!(summary.breakdown[0].count, 2);
    assert_eq!(summary.breakdown[1].category, ActivityCategory::Transportation);

    // 100 kg target, 32.83 kg so far: 6 trees pending
    assert_eq!(summary.trees_this_month, 6);
    assert_eq!(summary.total_trees, 6);
    assert_eq!(summary.recent_activities.len(), 3);
}

#[tokio::test]
async fn test_settle_trees_once_per_month() {
    let (state, store) = common::memory_state();
    let user = common::seed_user(&store, "Ana").await;
    let now = at(3, 15);

    common::seed_activity(&store, user.id, 40.0, at(2, 10)).await;
    common::seed_activity(&store, user.id, 500.0, at(3, 1)).await;

    let first = state.dashboard.settle_month_trees(&user.id, now).await.unwrap();
    assert_eq!(first.month, "2026-02");
    assert_eq!(first.actual_emission, 40.0);
    assert_eq!(first.trees_awarded, 6);
    assert!(!first.already_settled);
    assert_eq!(first.total_trees, 6);

    let second = state.dashboard.settle_month_trees(&user.id, now).await.unwrap();
    assert_eq!(second.trees_awarded, 0);
    assert!(second.already_settled);
    assert_eq!(second.total_trees, 6);
    assert_eq!(second.message, "Trees for 2026-02 were already settled.");
}

#[tokio::test]
async fn test_settle_over_target_earns_nothing() {
    let (state, store) = common::memory_state();
    let user = common::seed_user(&store, "Ana").await;
    store.set_target_emission(&user.id, 30.0).await.unwrap();
    common::seed_activity(&store, user.id, 40.0, at(2, 10)).await;

    let result = state
        .dashboard
        .settle_month_trees(&user.id, at(3, 15))
        .await
        .unwrap();

    assert_eq!(result.trees_awarded, 0);
    assert!(!result.already_settled);
    assert_eq!(result.total_trees, 0);
    assert!(result.message.starts_with("No trees earned for 2026-02"));
}
