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
    models::quiz::{
        AvailableQuiz, AvailableQuizzes, CreateQuizRequest, QuizForTaking, QuizResult, QuizStats,
        SubmitQuizRequest, UserQuizStats,
    },
    services::AppState,
};

pub(crate) async fn create_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let creator = claims.user_id()?;
    let quiz = state.quizzes.create_quiz(creator, req, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(AvailableQuiz::from(&quiz))))
}

pub(crate) async fn delete_quiz(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_object_id(&id, "quiz")?;
    state.quizzes.delete_quiz(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn available_quizzes(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<AvailableQuizzes>, AppError> {
    let user = claims.user_id()?;
    Ok(Json(state.quizzes.available(&user).await?))
}

pub(crate) async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<Json<QuizForTaking>, AppError> {
    let user = claims.user_id()?;
    let id = parse_object_id(&id, "quiz")?;
    Ok(Json(state.quizzes.quiz_for_taking(&user, &id).await?))
}

pub(crate) async fn start_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = claims.user_id()?;
    let id = parse_object_id(&id, "quiz")?;
    let started = state.quizzes.start(user, &id, Utc::now()).await?;
    let status = if started.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(started)))
}

pub(crate) async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
    AppJson(req): AppJson<SubmitQuizRequest>,
) -> Result<Json<QuizResult>, AppError> {
    let user = claims.user_id()?;
    let id = parse_object_id(&id, "quiz")?;
    let attempt = state.quizzes.submit(&user, &id, &req, Utc::now()).await?;
    Ok(Json(state.quizzes.results(&user, &id, &attempt.id).await?))
}

pub(crate) async fn get_results(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((id, attempt_id)): Path<(String, String)>,
) -> Result<Json<QuizResult>, AppError> {
    let user = claims.user_id()?;
    let id = parse_object_id(&id, "quiz")?;
    let attempt_id = parse_object_id(&attempt_id, "attempt")?;
    Ok(Json(state.quizzes.results(&user, &id, &attempt_id).await?))
}

pub(crate) async fn user_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<UserQuizStats>, AppError> {
    let user = claims.user_id()?;
    Ok(Json(state.quizzes.user_stats(&user).await?))
}

pub(crate) async fn quiz_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<QuizStats>, AppError> {
    let id = parse_object_id(&id, "quiz")?;
    Ok(Json(state.quizzes.quiz_stats(&id).await?))
}
