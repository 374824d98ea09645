use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run", post(handlers::run_submission))
        .route("/languages", get(handlers::list_languages))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
}
