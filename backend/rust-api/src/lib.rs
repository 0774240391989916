use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::middlewares::auth::admin_guard_middleware;

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    let api = Router::new()
        .route("/factors", get(handlers::factors::list_factors))
        .nest("/activities", activity_routes())
        .nest("/dashboard", dashboard_routes())
        .nest("/challenges", challenge_routes())
        .nest("/quizzes", quiz_routes())
        .nest("/onboarding", onboarding_routes())
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1", api)
        .with_state(app_state)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn activity_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::activities::log_activity))
        .route(
            "/{id}",
            get(handlers::activities::get_activity)
                .put(handlers::activities::update_activity)
                .delete(handlers::activities::delete_activity),
        )
}

fn dashboard_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::dashboard::get_dashboard))
        .route("/trees/settle", post(handlers::dashboard::settle_trees))
}

fn challenge_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(handlers::challenges::create_challenge)
                .route_layer(middleware::from_fn(admin_guard_middleware)),
        )
        .route(
            "/{id}",
            get(handlers::challenges::get_challenge).merge(
                delete(handlers::challenges::delete_challenge)
                    .route_layer(middleware::from_fn(admin_guard_middleware)),
            ),
        )
        .route("/{id}/join", post(handlers::challenges::join_challenge))
        .route(
            "/{id}/leaderboard",
            get(handlers::challenges::get_leaderboard),
        )
        .route(
            "/{id}/cancel",
            post(handlers::challenges::cancel_challenge)
                .route_layer(middleware::from_fn(admin_guard_middleware)),
        )
        .route(
            "/{id}/update-progress",
            post(handlers::challenges::update_progress)
                .route_layer(middleware::from_fn(admin_guard_middleware)),
        )
}

fn quiz_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(handlers::quizzes::create_quiz)
                .route_layer(middleware::from_fn(admin_guard_middleware)),
        )
        .route("/available", get(handlers::quizzes::available_quizzes))
        .route("/stats/user", get(handlers::quizzes::user_stats))
        .route(
            "/{id}",
            get(handlers::quizzes::get_quiz).merge(
                delete(handlers::quizzes::delete_quiz)
                    .route_layer(middleware::from_fn(admin_guard_middleware)),
            ),
        )
        .route("/{id}/attempt", post(handlers::quizzes::start_attempt))
        .route("/{id}/submit", post(handlers::quizzes::submit_quiz))
        .route(
            "/{id}/results/{attempt_id}",
            get(handlers::quizzes::get_results),
        )
        .route(
            "/{id}/stats",
            get(handlers::quizzes::quiz_stats)
                .route_layer(middleware::from_fn(admin_guard_middleware)),
        )
}

fn onboarding_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::onboarding::get_status))
        .route(
            "/step/{step_id}",
            post(handlers::onboarding::complete_step),
        )
}
