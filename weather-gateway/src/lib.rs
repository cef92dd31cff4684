pub mod api_client;
pub mod cache;
pub mod cache_key;
pub mod clock;
pub mod config;
pub mod handlers;
pub mod openapi;
pub mod validator;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/weather", get(handlers::get_weather))
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
