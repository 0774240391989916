use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    error::{parse_object_id, AppError},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::challenge::{
        BatchReport, ChallengeResponse, CreateChallengeRequest, LeaderboardResponse,
    },
    services::{challenge_service::DEFAULT_LEADERBOARD_LIMIT, AppState},
};

const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

pub(crate) async fn create_challenge(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateChallengeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let creator = claims.user_id()?;
    let now = Utc::now();
    let challenge = state.challenges.create(creator, req, now).await?;
    Ok((
        StatusCode::CREATED,
        Json(ChallengeResponse::build(challenge, None, now)),
    ))
}

pub(crate) async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<Json<ChallengeResponse>, AppError> {
    let user = claims.user_id()?;
    let id = parse_object_id(&id, "challenge")?;
    Ok(Json(state.challenges.get(&user, &id, Utc::now()).await?))
}

pub(crate) async fn join_challenge(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = claims.user_id()?;
    let id = parse_object_id(&id, "challenge")?;
    let now = Utc::now();

    state.challenges.join(user, &id, now).await?;
    let view = state.challenges.get(&user, &id, now).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub(crate) async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let user = claims.user_id()?;
    let id = parse_object_id(&id, "challenge")?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);

    Ok(Json(state.challenges.leaderboard(&user, &id, limit).await?))
}

pub(crate) async fn cancel_challenge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ChallengeResponse>, AppError> {
    let id = parse_object_id(&id, "challenge")?;
    let now = Utc::now();
    let challenge = state.challenges.cancel(&id, now).await?;
    Ok(Json(ChallengeResponse::build(challenge, None, now)))
}

pub(crate) async fn delete_challenge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_object_id(&id, "challenge")?;
    state.challenges.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn update_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BatchReport>, AppError> {
    let id = parse_object_id(&id, "challenge")?;
    Ok(Json(
        state.challenges.recompute_progress(&id, Utc::now()).await?,
    ))
}
