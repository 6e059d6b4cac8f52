pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    config::REQUEST_TIMEOUT,
    services::reconcile::Reconciler,
    std::sync::Arc,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
};

/// Gateway notifications are a few KB at most.
const BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/webhooks",
            post(adapters::notification::notification_handler),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
