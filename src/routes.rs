// routes.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn create_routes(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/api",
            Router::new()
                .route("/characters", get(handlers::get_characters))
                .route("/countdown", get(handlers::get_countdown))
                .route("/votes", post(handlers::vote))
                .route("/logins", post(handlers::register_login))
                .route("/admin/login", post(handlers::admin_login))
                .route("/admin/votes", get(handlers::admin_votes))
                .route("/admin/logins", get(handlers::admin_logins)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
