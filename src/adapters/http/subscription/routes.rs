//! Axum routers for the subscriber, admin and webhook surfaces.

use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    bulk_resolve, extend, force_remove, health, list_subscribers, regenerate, subscribe,
    subscriber_history, trigger_sweep, validate_phone, GateAppState,
};
use crate::adapters::http::webhook::telegram_webhook;

/// Subscriber-facing routes, mounted at `/api/subscriptions`.
pub fn subscription_routes() -> Router<GateAppState> {
    Router::new()
        .route("/", post(subscribe))
        .route("/extend", post(extend))
        .route("/regenerate", post(regenerate))
        .route("/validate-phone", post(validate_phone))
}

/// Operator routes, mounted at `/api/admin`.
pub fn admin_routes() -> Router<GateAppState> {
    Router::new()
        .route("/subscribers", get(list_subscribers))
        .route("/subscribers/:platform_id", delete(force_remove))
        .route("/history/:phone", get(subscriber_history))
        .route("/sweep", post(trigger_sweep))
        .route("/resolve", post(bulk_resolve))
}

/// The complete application router.
pub fn app_router(state: GateAppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api/subscriptions", subscription_routes())
        .nest("/api/admin", admin_routes())
        .route("/webhook/telegram", post(telegram_webhook))
        .route("/health", get(health))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
