use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use crate::{
    error::{parse_object_id, AppError},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::activity::{ActivityResponse, LogActivityRequest, UpdateActivityRequest},
    services::AppState,
};

pub(crate) async fn log_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<LogActivityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = claims.user_id()?;
    let activity = state.activities.log(user, req, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(ActivityResponse::from(activity))))
}

pub(crate) async fn get_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<Json<ActivityResponse>, AppError> {
    let user = claims.user_id()?;
    let id = parse_object_id(&id, "activity")?;
    let activity = state.activities.get(&user, &id).await?;
    Ok(Json(ActivityResponse::from(activity)))
}

pub(crate) async fn update_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateActivityRequest>,
) -> Result<Json<ActivityResponse>, AppError> {
    let user = claims.user_id()?;
    let id = parse_object_id(&id, "activity")?;
    let activity = state.activities.update(&user, &id, req, Utc::now()).await?;
    Ok(Json(ActivityResponse::from(activity)))
}

pub(crate) async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user = claims.user_id()?;
    let id = parse_object_id(&id, "activity")?;
    state.activities.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
