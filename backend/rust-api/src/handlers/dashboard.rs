use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use chrono::Utc;

use crate::{
    error::AppError,
    middlewares::auth::JwtClaims,
    models::dashboard::{DashboardQuery, DashboardSummary, TreeSettlement},
    services::AppState,
};

pub(crate) async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSummary>, AppError> {
    let user = claims.user_id()?;
    let summary = state
        .dashboard
        .summary(&user, query.period, Utc::now())
        .await?;
    Ok(Json(summary))
}

pub(crate) async fn settle_trees(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<TreeSettlement>, AppError> {
    let user = claims.user_id()?;
    let settlement = state.dashboard.settle_month_trees(&user, Utc::now()).await?;
    Ok(Json(settlement))
}
