//! `auth_on_publish` (PUBLISH).

use std::time::Duration;

use axum::Json;
use axum::extract::State;

use super::extract::DecisionJson;
use super::types::{DecisionResponse, PublishRequest};
use crate::SharedAppState;
use crate::cache::{self, Verdict};
use crate::error::ErrorKind;
use crate::logger::{ActivityRecord, DecisionResult, EventType};

#[tracing::instrument(skip(state, req), fields(client_id = %req.base.client_id, username = %req.base.username, event_type = "publish"))]
pub async fn publish(
    State(state): State<SharedAppState>,
    DecisionJson(req): DecisionJson<PublishRequest>,
) -> Json<DecisionResponse> {
    let deadline = Duration::from_millis(state.config.endpoint.deadline_ms);

    // See register.rs: spawned independently so a timeout here never cancels
    // the underlying single-flight computation driving the verdict cache.
    let handle = tokio::spawn({
        let state = state.clone();
        let req = req.clone();
        async move { evaluate(&state, &req).await }
    });

    let (verdict, cache_hit) = match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(_join_error)) => (Verdict::Deny(ErrorKind::InternalError.as_str()), false),
        Err(_elapsed) => (Verdict::Deny(ErrorKind::Timeout.as_str()), false),
    };

    emit(&state, &req, &verdict, cache_hit);
    Json(match &verdict {
        Verdict::Allow => DecisionResponse::ok(),
        Verdict::Deny(kind) => DecisionResponse::deny(kind),
    })
}

async fn evaluate(state: &SharedAppState, req: &PublishRequest) -> (Verdict, bool) {
    let fingerprint = cache::publish_fingerprint(&req.base.username, &req.topic, req.qos);
    let cache = state.cache.clone();
    let cache_hit = cache.contains(&fingerprint);
    let state = state.clone();
    let req = req.clone();
    let verdict = cache
        .get_with(fingerprint, || async move { compute(&state, &req).await })
        .await;
    (verdict, cache_hit)
}

async fn compute(state: &SharedAppState, req: &PublishRequest) -> Verdict {
    let identity = match state.store.lookup(&req.base.username).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return Verdict::Deny(ErrorKind::UnknownUser.as_str()),
        Err(_) => return Verdict::Deny(ErrorKind::StoreUnavailable.as_str()),
    };

    if !identity.is_active {
        return Verdict::Deny(ErrorKind::Inactive.as_str());
    }

    if crate::topic::is_admin_topic(&req.topic, &state.config.admin_prefix) && !identity.is_admin {
        return Verdict::Deny(ErrorKind::AdminRequired.as_str());
    }

    if !crate::topic::allow(&req.topic, &identity.allowed_publish_patterns) {
        return Verdict::Deny(ErrorKind::NotAuthorized.as_str());
    }

    Verdict::Allow
}

fn emit(state: &SharedAppState, req: &PublishRequest, verdict: &Verdict, cache_hit: bool) {
    let result = match verdict {
        Verdict::Allow => DecisionResult::Allow,
        Verdict::Deny(kind) if ErrorKind::is_infra_failure(kind) => DecisionResult::Error,
        Verdict::Deny(_) => DecisionResult::Deny,
    };
    let outcome = match verdict {
        Verdict::Allow => "allow",
        Verdict::Deny(kind) => kind,
    };
    state.metrics.record_decision("publish", outcome);
    if cache_hit {
        state.metrics.record_cache_hit();
    } else {
        state.metrics.record_cache_miss();
    }
    state.logger.submit(ActivityRecord {
        timestamp: chrono::Utc::now(),
        event_type: EventType::Publish,
        result,
        client_id: req.base.client_id.clone(),
        username: req.base.username.clone(),
        peer_addr: req.base.peer_addr.clone(),
        topic: Some(req.topic.clone()),
        detail: None,
        error_message: match verdict {
            Verdict::Deny(kind) => Some(kind.to_string()),
            Verdict::Allow => None,
        },
        cache_hit,
    });
}
