//! Broker-facing HTTP surface: router assembly over the decision endpoints.

pub mod extract;
pub mod health;
pub mod publish;
pub mod register;
pub mod status;
pub mod subscribe;
pub mod types;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::SharedAppState;

pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/mqtt/auth", post(register::register))
        .route("/mqtt/publish", post(publish::publish))
        .route("/mqtt/subscribe", post(subscribe::subscribe))
        .route("/mqtt/offline", post(status::offline))
        .route("/mqtt/wakeup", post(status::wakeup))
        .route("/mqtt/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Black-box router tests live in `tests/webhook.rs`.
