use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Articles
        .route(
            "/articles",
            post(handlers::create_article).get(handlers::list_articles),
        )
        .route(
            "/articles/:id",
            get(handlers::get_article).delete(handlers::delete_article),
        )
        // Ratings
        .route(
            "/articles/:id/rate",
            post(handlers::rate_article)
                .get(handlers::get_rating)
                .delete(handlers::delete_rating),
        )
        // Recommendations
        .route("/recommendations", get(handlers::get_recommendations))
        .layer(
            // Request id runs first so the trace span can pick it up
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}
