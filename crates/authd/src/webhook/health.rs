//! `GET /mqtt/health` liveness probe.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use super::types::HealthResponse;
use crate::SharedAppState;

pub async fn health(State(state): State<SharedAppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = state.store.is_reachable().await;
    let logger_ok = state.logger.is_below_high_water_mark();
    state.metrics.store_reachable.set(if store_ok { 1 } else { 0 });
    state
        .metrics
        .logger_queue_depth
        .set(state.logger.queue_capacity_used() as i64);
    state
        .metrics
        .logger_dropped_total
        .set(state.logger.dropped_records() as i64);

    if store_ok && logger_ok {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                timestamp: chrono::Utc::now(),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                timestamp: chrono::Utc::now(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::memory::InMemoryStore;
    use crate::{AppState, cache::VerdictCache, config::AuthdConfig, logger::ActivityLogger, metrics::AuthMetrics, tracker::ConnectionTracker};
    use prometheus::Registry;
    use std::sync::Arc;

    #[tokio::test]
    async fn healthy_store_and_empty_queue_reports_200() {
        let state = Arc::new(AppState {
            store: Arc::new(InMemoryStore::new(4)),
            cache: Arc::new(VerdictCache::new(100, 60_000, 5_000)),
            tracker: Arc::new(ConnectionTracker::new()),
            logger: ActivityLogger::spawn(100, 10),
            metrics: Arc::new(AuthMetrics::register(&Registry::new())),
            config: AuthdConfig::default(),
        });

        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
    }
}
