use std::sync::Arc;

use axum::{extract::State, Json};

use crate::{
    models::emission::FactorCatalogue,
    services::{cache_service::FACTORS_KEY, AppState},
};

/// Emission factor catalogue, read through the cache
pub(crate) async fn list_factors(State(state): State<Arc<AppState>>) -> Json<FactorCatalogue> {
    if let Some(cached) = state.cache.get_json::<FactorCatalogue>(FACTORS_KEY).await {
        return Json(cached);
    }

    let catalogue = state.factors.catalogue();
    state
        .cache
        .set_json(FACTORS_KEY, &catalogue, state.config.cache.factors_ttl_secs)
        .await;
    Json(catalogue)
}
