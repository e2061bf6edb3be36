//! API Routes
//!
//! Route table for the relay. Each feed gets a widget-facing route and a
//! `/api` sibling with debug payloads.

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::handlers::{
    health_handler, incinerator_api_handler, incinerator_handler, names_api_handler,
    names_handler, recipes_api_handler, recipes_handler, AppState,
};

/// Builds the application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/names", get(names_handler))
        .route("/names/api", get(names_api_handler))
        .route("/recipes", get(recipes_handler))
        .route("/recipes/api", get(recipes_api_handler))
        .route("/incinerator", get(incinerator_handler))
        .route("/incinerator/api", get(incinerator_api_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
