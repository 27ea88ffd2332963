use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::{
    generation_header_middleware, make_span_with_request_id, request_id_middleware,
};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Index lifecycle
        .route("/index", get(handlers::index_info))
        .route("/index/rebuild", post(handlers::rebuild_index))
        // Catalog
        .route("/movies", get(handlers::list_movies))
        .route("/movies/search", get(handlers::search_movies))
        .route("/movies/similar", get(handlers::similar_to_text))
        .route("/movies/:id", get(handlers::get_movie))
        .route("/movies/:id/similar", get(handlers::similar_movies))
        .route(
            "/movies/:id/similarity/:other_id",
            get(handlers::movie_similarity),
        )
        // Users
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/viewing_history", get(handlers::viewing_history))
        .route("/users/:id/recommendations", get(handlers::recommendations))
        // Innermost first: the request ID must be set before the trace span is made
        .layer(from_fn_with_state(state.clone(), generation_header_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
