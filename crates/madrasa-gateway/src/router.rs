use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::session_layer;
use crate::handlers::{self, auth, masala, users};
use crate::state::SharedState;

/// Build the complete API router with session resolution and tracing.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/masala",
            get(masala::list_masala).post(masala::create_masala),
        )
        .route("/masala/my-posts", get(masala::my_masala))
        .route("/masala/categories", get(masala::categories))
        .route(
            "/masala/{id}",
            get(masala::get_masala)
                .put(masala::update_masala)
                .delete(masala::delete_masala),
        )
        .route("/users", get(users::list_users))
        .route("/users/teachers", get(users::teachers))
        .route("/users/health", get(users::health))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
