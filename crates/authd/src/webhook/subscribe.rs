//! `auth_on_subscribe` (SUBSCRIBE). Per-filter evaluation; not all-or-nothing.

use std::time::Duration;

use axum::Json;
use axum::extract::State;

use super::extract::DecisionJson;
use super::types::{SubscribeOutcome, SubscribeRequest, SubscribeResponse, TopicFilter};
use crate::SharedAppState;
use crate::error::ErrorKind;
use crate::identity::MqttIdentity;
use crate::logger::{ActivityRecord, DecisionResult, EventType};

#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterVerdict {
    Allow,
    Deny(&'static str),
}

#[tracing::instrument(skip(state, req), fields(client_id = %req.base.client_id, username = %req.base.username, event_type = "subscribe"))]
pub async fn subscribe(
    State(state): State<SharedAppState>,
    DecisionJson(req): DecisionJson<SubscribeRequest>,
) -> Json<SubscribeResponse> {
    let deadline = Duration::from_millis(state.config.endpoint.deadline_ms);
    let outcomes = match tokio::time::timeout(deadline, evaluate(&state, &req)).await {
        Ok(outcomes) => outcomes,
        Err(_) => req
            .topics
            .iter()
            .map(|f| (f.clone(), FilterVerdict::Deny(ErrorKind::Timeout.as_str())))
            .collect(),
    };

    emit(&state, &req, &outcomes);

    Json(SubscribeResponse {
        result: "ok",
        topics: outcomes
            .into_iter()
            .map(|(filter, verdict)| match verdict {
                FilterVerdict::Allow => SubscribeOutcome::Granted {
                    topic: filter.topic,
                    qos: filter.qos,
                },
                FilterVerdict::Deny(_) => SubscribeOutcome::Rejected {
                    topic: filter.topic,
                    qos: -1,
                },
            })
            .collect(),
    })
}

/// Each filter is evaluated independently against the looked-up identity.
///
/// Unlike CONNECT/PUBLISH, the per-request verdict here is a vector rather
/// than a scalar allow/deny, so it is not memoized through `VerdictCache`
/// (whose value type is a single `Verdict`); only the identity lookup this
/// function shares across filters benefits from the store being warm.
async fn evaluate(state: &SharedAppState, req: &SubscribeRequest) -> Vec<(TopicFilter, FilterVerdict)> {
    let identity = match state.store.lookup(&req.base.username).await {
        Ok(Some(identity)) if identity.is_active => Some(identity),
        _ => None,
    };

    req.topics
        .iter()
        .map(|filter| {
            let verdict = evaluate_filter(&identity, &state.config.admin_prefix, &filter.topic);
            (filter.clone(), verdict)
        })
        .collect()
}

fn evaluate_filter(identity: &Option<MqttIdentity>, admin_prefix: &str, topic: &str) -> FilterVerdict {
    let Some(identity) = identity else {
        return FilterVerdict::Deny(ErrorKind::UnknownUser.as_str());
    };

    if crate::topic::is_admin_topic(topic, admin_prefix) && !identity.is_admin {
        return FilterVerdict::Deny(ErrorKind::AdminRequired.as_str());
    }
    if !crate::topic::allow(topic, &identity.allowed_subscribe_patterns) {
        return FilterVerdict::Deny(ErrorKind::NotAuthorized.as_str());
    }
    FilterVerdict::Allow
}

fn emit(state: &SharedAppState, req: &SubscribeRequest, outcomes: &[(TopicFilter, FilterVerdict)]) {
    let any_denied = outcomes.iter().any(|(_, v)| matches!(v, FilterVerdict::Deny(_)));
    state
        .metrics
        .record_decision("subscribe", if any_denied { "partial" } else { "allow" });

    for (filter, verdict) in outcomes {
        state.logger.submit(ActivityRecord {
            timestamp: chrono::Utc::now(),
            event_type: EventType::Subscribe,
            result: match verdict {
                FilterVerdict::Allow => DecisionResult::Allow,
                FilterVerdict::Deny(_) => DecisionResult::Deny,
            },
            client_id: req.base.client_id.clone(),
            username: req.base.username.clone(),
            peer_addr: req.base.peer_addr.clone(),
            topic: Some(filter.topic.clone()),
            detail: None,
            error_message: match verdict {
                FilterVerdict::Deny(kind) => Some(kind.to_string()),
                FilterVerdict::Allow => None,
            },
            cache_hit: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::memory::InMemoryStore;
    use crate::identity::{CredentialStore, NewIdentity};
    use crate::webhook::types::BaseRequest;
    use crate::{AppState, cache::VerdictCache, config::AuthdConfig, logger::ActivityLogger, metrics::AuthMetrics, tracker::ConnectionTracker};
    use prometheus::Registry;
    use std::sync::Arc;

    async fn test_state() -> Arc<AppState> {
        let store = InMemoryStore::new(4);
        store
            .create(NewIdentity {
                username: "sensor1".to_string(),
                password: "s3cret!!".to_string(),
                allowed_client_id: None,
                is_admin: false,
                is_active: true,
                allowed_publish_patterns: vec![],
                allowed_subscribe_patterns: vec!["cmd/+".to_string()],
                max_connections: 0,
            })
            .await
            .unwrap();

        Arc::new(AppState {
            store: Arc::new(store),
            cache: Arc::new(VerdictCache::new(100, 60_000, 5_000)),
            tracker: Arc::new(ConnectionTracker::new()),
            logger: ActivityLogger::spawn(100, 10),
            metrics: Arc::new(AuthMetrics::register(&Registry::new())),
            config: AuthdConfig::default(),
        })
    }

    #[tokio::test]
    async fn mixed_outcomes_preserve_input_order() {
        let state = test_state().await;
        let req = SubscribeRequest {
            base: BaseRequest {
                mountpoint: String::new(),
                client_id: "c-1".to_string(),
                username: "sensor1".to_string(),
                peer_addr: "10.0.0.1".to_string(),
                peer_port: 1883,
            },
            topics: vec![
                TopicFilter { topic: "cmd/a".to_string(), qos: 1 },
                TopicFilter { topic: "telemetry/#".to_string(), qos: 0 },
            ],
        };

        let outcomes = evaluate(&state, &req).await;
        assert_eq!(outcomes[0].0.topic, "cmd/a");
        assert_eq!(outcomes[0].1, FilterVerdict::Allow);
        assert_eq!(outcomes[1].0.topic, "telemetry/#");
        assert!(matches!(outcomes[1].1, FilterVerdict::Deny(_)));
    }
}
