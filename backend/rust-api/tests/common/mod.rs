#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use carbontrack_api::{
    config::{CacheConfig, Config, WorkerConfig},
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::activity::{Activity, ActivityInput},
    models::user::User,
    services::{cache_service::CacheService, AppState, Stores},
    store::{ActivityStore, MemoryStore, UserStore},
};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde_json::Value;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn test_config() -> Config {
    Config {
        mongo_uri: "mongodb://localhost:27017".to_string(),
        redis_uri: "redis://127.0.0.1:6379/0".to_string(),
        mongo_database: "carbontrack_test".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        cache: CacheConfig::default(),
        worker: WorkerConfig::default(),
    }
}

/// App state over a fresh in-memory store with the cache switched off
pub fn memory_state() -> (Arc<AppState>, Arc<MemoryStore>) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let state = AppState::with_stores(
        test_config(),
        Stores::single(store.clone()),
        CacheService::disabled(),
    );
    (Arc::new(state), store)
}

pub fn create_test_app() -> (Router, Arc<AppState>, Arc<MemoryStore>) {
    let (state, store) = memory_state();
    (create_router(state.clone()), state, store)
}

pub async fn seed_user(store: &MemoryStore, name: &str) -> User {
    let user = User::new(name, format!("{}@example.com", name.to_lowercase()), Utc::now());
    store.insert_user(&user).await.unwrap();
    user
}

pub fn token_for(user: &ObjectId, role: &str) -> String {
    let now = Utc::now().timestamp();
    JwtService::new(JWT_SECRET)
        .generate_token(&JwtClaims {
            sub: user.to_hex(),
            role: role.to_string(),
            exp: (now + 3600) as usize,
            iat: now as usize,
        })
        .unwrap()
}

/// Stores an activity with a fixed emission, bypassing the calculator
pub async fn seed_activity(
    store: &MemoryStore,
    user: ObjectId,
    emission: f64,
    date: DateTime<Utc>,
) -> Activity {
    let input = ActivityInput::Food {
        weight: 1.0,
        food_type: "chicken_kg".to_string(),
    };
    let activity = Activity {
        id: ObjectId::new(),
        user,
        category: input.category(),
        details: input.details(),
        note: None,
        emission,
        date,
        input,
        created_at: date,
        updated_at: date,
    };
    store.insert_activity(&activity).await.unwrap();
    activity
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
