use crate::api::{handlers, AppState};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
///
/// Requests running longer than `server.request_timeout_secs` are answered
/// with 408.
pub fn build_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        // Health and metrics
        .route("/api/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Search
        .route(
            "/api/search",
            get(handlers::search_get).post(handlers::search_post),
        )
        .route("/api/facets", get(handlers::facets))
        .route("/api/suggest", get(handlers::suggest))
        .route("/api/ai-summary", post(handlers::ai_summary))
        // Relevance administration
        .route(
            "/api/admin/boosts",
            get(handlers::get_boosts).post(handlers::save_boosts),
        )
        .route("/api/admin/boosts/fields", get(handlers::boost_fields))
        .route(
            "/api/admin/curations",
            get(handlers::list_curations)
                .post(handlers::save_curation)
                .delete(handlers::delete_curation),
        )
        // Index maintenance
        .route("/api/admin/indices", get(handlers::list_indices))
        .route("/api/admin/indices/:name", delete(handlers::delete_index))
        .route("/api/admin/aliases", post(handlers::update_alias))
        .route("/api/admin/deduplicate", post(handlers::deduplicate))
        // QA
        .route(
            "/api/qa/validate",
            get(handlers::validate_usage).post(handlers::run_validation),
        )
        .route(
            "/api/qa/reports",
            get(handlers::list_reports).delete(handlers::prune_reports),
        )
        .route("/api/qa/data-quality", get(handlers::data_quality))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
}
