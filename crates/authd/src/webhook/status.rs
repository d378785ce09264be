//! `offline` and `wakeup` status callbacks. Neither returns a verdict; the
//! broker does not gate on their response.

use axum::Json;
use axum::extract::State;

use super::extract::DecisionJson;
use super::types::{DecisionResponse, StatusRequest};
use crate::SharedAppState;
use crate::logger::{ActivityRecord, DecisionResult, EventType};

#[tracing::instrument(skip(state, req), fields(client_id = %req.base.client_id, username = %req.base.username, event_type = "disconnect"))]
pub async fn offline(State(state): State<SharedAppState>, DecisionJson(req): DecisionJson<StatusRequest>) -> Json<DecisionResponse> {
    state.tracker.release(&req.base.username);
    state.logger.submit(ActivityRecord {
        timestamp: chrono::Utc::now(),
        event_type: EventType::Disconnect,
        result: DecisionResult::Allow,
        client_id: req.base.client_id.clone(),
        username: req.base.username.clone(),
        peer_addr: req.base.peer_addr.clone(),
        topic: None,
        detail: None,
        error_message: None,
        cache_hit: false,
    });
    Json(DecisionResponse::ok())
}

#[tracing::instrument(skip(state, req), fields(client_id = %req.base.client_id, username = %req.base.username, event_type = "wakeup"))]
pub async fn wakeup(State(state): State<SharedAppState>, DecisionJson(req): DecisionJson<StatusRequest>) -> Json<DecisionResponse> {
    state.logger.submit(ActivityRecord {
        timestamp: chrono::Utc::now(),
        event_type: EventType::Wakeup,
        result: DecisionResult::Allow,
        client_id: req.base.client_id.clone(),
        username: req.base.username.clone(),
        peer_addr: req.base.peer_addr.clone(),
        topic: None,
        detail: None,
        error_message: None,
        cache_hit: false,
    });
    Json(DecisionResponse::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::memory::InMemoryStore;
    use crate::{AppState, cache::VerdictCache, config::AuthdConfig, logger::ActivityLogger, metrics::AuthMetrics, tracker::ConnectionTracker};
    use crate::webhook::types::BaseRequest;
    use prometheus::Registry;
    use std::sync::Arc;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            store: Arc::new(InMemoryStore::new(4)),
            cache: Arc::new(VerdictCache::new(100, 60_000, 5_000)),
            tracker: Arc::new(ConnectionTracker::new()),
            logger: ActivityLogger::spawn(100, 10),
            metrics: Arc::new(AuthMetrics::register(&Registry::new())),
            config: AuthdConfig::default(),
        })
    }

    fn req() -> StatusRequest {
        StatusRequest {
            base: BaseRequest {
                mountpoint: String::new(),
                client_id: "c-1".to_string(),
                username: "sensor1".to_string(),
                peer_addr: "10.0.0.1".to_string(),
                peer_port: 1883,
            },
        }
    }

    #[tokio::test]
    async fn offline_releases_tracker_slot() {
        let state = test_state();
        state.tracker.try_acquire("sensor1", 0);
        assert_eq!(state.tracker.current("sensor1"), 1);

        let _ = offline(State(state.clone()), DecisionJson(req())).await;
        assert_eq!(state.tracker.current("sensor1"), 0);
    }

    #[tokio::test]
    async fn wakeup_does_not_change_tracker_state() {
        let state = test_state();
        let _ = wakeup(State(state.clone()), DecisionJson(req())).await;
        assert_eq!(state.tracker.current("sensor1"), 0);
    }
}
