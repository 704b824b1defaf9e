use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::{AppState, BackgroundRuns};

pub async fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/digests", post(handlers::trigger_digest).get(handlers::list_digests))
        .route("/api/digests/:id", get(handlers::get_digest))
        .route("/api/preferences", post(handlers::save_preference))
        .route("/api/preferences/:principal", get(handlers::get_preference))
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use crate::{create_app, ApiError, AppState};
    pub use nd_core::{Error, Result};
}
