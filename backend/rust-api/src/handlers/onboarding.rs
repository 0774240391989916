use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
    Json,
};
use chrono::Utc;

use crate::{
    error::AppError,
    middlewares::auth::JwtClaims,
    models::user::{CompleteStepRequest, OnboardingStatus},
    services::AppState,
};

pub(crate) async fn get_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<OnboardingStatus>, AppError> {
    let user = claims.user_id()?;
    Ok(Json(state.onboarding.status(&user).await?))
}

pub(crate) async fn complete_step(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(step_id): Path<String>,
    body: Bytes,
) -> Result<Json<OnboardingStatus>, AppError> {
    let user = claims.user_id()?;
    // The body is optional; only `set_target` reads it
    let req: CompleteStepRequest = if body.is_empty() {
        CompleteStepRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            AppError::invalid_input(format!("Failed to parse JSON request body: {}", e))
        })?
    };
    let status = state
        .onboarding
        .complete_step(&user, &step_id, req, Utc::now())
        .await?;
    Ok(Json(status))
}
