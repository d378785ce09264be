//! `auth_on_register` (CONNECT).

use std::time::Duration;

use axum::Json;
use axum::extract::State;

use super::extract::DecisionJson;
use super::types::{DecisionResponse, RegisterRequest};
use crate::SharedAppState;
use crate::cache::{self, Verdict};
use crate::error::ErrorKind;
use crate::logger::{ActivityRecord, DecisionResult, EventType};
use crate::tracker::AcquireOutcome;

#[tracing::instrument(skip(state, req), fields(client_id = %req.base.client_id, username = %req.base.username, event_type = "auth"))]
pub async fn register(
    State(state): State<SharedAppState>,
    DecisionJson(req): DecisionJson<RegisterRequest>,
) -> Json<DecisionResponse> {
    let deadline = Duration::from_millis(state.config.endpoint.deadline_ms);

    // Spawned independently so a caller-side timeout never cancels the
    // underlying single-flight computation: moka's `get_with` aborts its
    // in-flight future when dropped, which would stop it from ever
    // populating the cache. Awaiting a `JoinHandle` instead lets the task
    // keep running to completion in the background after we've given up.
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
    Json(to_response(&verdict))
}

async fn evaluate(state: &SharedAppState, req: &RegisterRequest) -> (Verdict, bool) {
    if req.base.username.is_empty() {
        return (Verdict::Deny(ErrorKind::BadCredentials.as_str()), false);
    }

    let fingerprint = cache::connect_fingerprint(&req.base.username, &req.base.client_id, &req.password);
    let cache = state.cache.clone();
    let cache_hit = cache.contains(&fingerprint);
    let state = state.clone();
    let req = req.clone();

    let verdict = cache
        .get_with(fingerprint, || async move { compute(&state, &req).await })
        .await;
    (verdict, cache_hit)
}

async fn compute(state: &SharedAppState, req: &RegisterRequest) -> Verdict {
    let identity = match state.store.lookup(&req.base.username).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return Verdict::Deny(ErrorKind::UnknownUser.as_str()),
        Err(_) => return Verdict::Deny(ErrorKind::StoreUnavailable.as_str()),
    };

    if !identity.is_active {
        return Verdict::Deny(ErrorKind::Inactive.as_str());
    }

    if let Some(allowed_client_id) = &identity.allowed_client_id {
        if allowed_client_id != &req.base.client_id {
            return Verdict::Deny(ErrorKind::ClientIdMismatch.as_str());
        }
    }

    let password = req.password.clone();
    let password_hash = identity.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || crate::identity::hash::verify(&password, &password_hash))
        .await
        .unwrap_or(false);
    if !verified {
        return Verdict::Deny(ErrorKind::BadCredentials.as_str());
    }

    match state.tracker.try_acquire(&req.base.username, identity.max_connections) {
        AcquireOutcome::QuotaExceeded => return Verdict::Deny(ErrorKind::QuotaExceeded.as_str()),
        AcquireOutcome::Granted => {}
    }

    let store = state.store.clone();
    let username = req.base.username.clone();
    let peer_addr = req.base.peer_addr.clone();
    tokio::spawn(async move {
        if let Err(err) = store.record_successful_login(&username, &peer_addr).await {
            tracing::warn!(%err, %username, "failed to record successful login");
        }
    });

    Verdict::Allow
}

fn to_response(verdict: &Verdict) -> DecisionResponse {
    match verdict {
        Verdict::Allow => DecisionResponse::ok(),
        Verdict::Deny(kind) => DecisionResponse::deny(kind),
    }
}

fn emit(state: &SharedAppState, req: &RegisterRequest, verdict: &Verdict, cache_hit: bool) {
    let result = match verdict {
        Verdict::Allow => DecisionResult::Allow,
        Verdict::Deny(kind) if ErrorKind::is_infra_failure(kind) => DecisionResult::Error,
        Verdict::Deny(_) => DecisionResult::Deny,
    };
    let outcome = match verdict {
        Verdict::Allow => "allow",
        Verdict::Deny(kind) => kind,
    };
    state.metrics.record_decision("register", outcome);
    if cache_hit {
        state.metrics.record_cache_hit();
    } else {
        state.metrics.record_cache_miss();
    }
    state.logger.submit(ActivityRecord {
        timestamp: chrono::Utc::now(),
        event_type: EventType::Auth,
        result,
        client_id: req.base.client_id.clone(),
        username: req.base.username.clone(),
        peer_addr: req.base.peer_addr.clone(),
        topic: None,
        detail: None,
        error_message: match verdict {
            Verdict::Deny(kind) => Some(kind.to_string()),
            Verdict::Allow => None,
        },
        cache_hit,
    });
}
