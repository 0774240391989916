use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::AppState;

pub mod activities;
pub mod challenges;
pub mod dashboard;
pub mod factors;
pub mod onboarding;
pub mod quizzes;

type CheckResult = serde_json::Map<String, serde_json::Value>;

fn check_result(status: &str, detail_key: &str, detail: String) -> CheckResult {
    let mut result = CheckResult::new();
    result.insert("status".to_string(), json!(status));
    result.insert(detail_key.to_string(), json!(detail));
    result
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = serde_json::Map::new();

    let mongo_health = check_mongodb(&state).await;
    let redis_health = check_redis(&state).await;
    let all_healthy = [&mongo_health, &redis_health]
        .iter()
        .all(|p| p.get("status").and_then(|v| v.as_str()) != Some("unhealthy"));

    dependencies.insert("mongodb".to_string(), json!(mongo_health));
    dependencies.insert("redis".to_string(), json!(redis_health));

    let (status_code, status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "carbontrack-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

async fn check_mongodb(state: &AppState) -> CheckResult {
    let Some(db) = &state.mongo else {
        return check_result("disabled", "message", "In-memory store".to_string());
    };

    match tokio::time::timeout(
        std::time::Duration::from_secs(1),
        db.run_command(mongodb::bson::doc! { "ping": 1 }),
    )
    .await
    {
        Ok(Ok(_)) => check_result("healthy", "message", "MongoDB connection successful".to_string()),
        Ok(Err(e)) => check_result("unhealthy", "error", format!("MongoDB error: {}", e)),
        Err(_) => check_result("unhealthy", "error", "MongoDB timeout after 1s".to_string()),
    }
}

async fn check_redis(state: &AppState) -> CheckResult {
    match tokio::time::timeout(std::time::Duration::from_millis(500), state.cache.ping()).await {
        Ok(None) => check_result("disabled", "message", "Cache disabled".to_string()),
        Ok(Some(Ok(()))) => check_result("healthy", "message", "Redis connection successful".to_string()),
        Ok(Some(Err(e))) => check_result("unhealthy", "error", format!("Redis error: {}", e)),
        Err(_) => check_result("unhealthy", "error", "Redis timeout after 500ms".to_string()),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// HTTP Basic auth for `/metrics`, credentials from `METRICS_AUTH` (`user:password`)
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
