//! Credential store: the persistent mapping from username to MQTT identity.
//!
//! The hot path only ever reads (`lookup`) and fire-and-forgets a login-count
//! bump (`record_successful_login`); everything else here exists to seed and
//! maintain identities for the admin surface. The admin *dashboard UI* is out
//! of scope for this repository (see `SPEC_FULL.md` §12), but the CRUD
//! methods themselves are not: `CredentialStore` knows nothing about the
//! verdict cache, so callers that mutate an identity through `update`/
//! `delete` must go through `AppState::update_identity`/`delete_identity`
//! (see `lib.rs`), which invalidate the cache so the next decision for that
//! identity recomputes instead of serving a stale verdict.

pub mod hash;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AuthdResult;

/// An MQTT credential record. Invariants: `username` unique, `password_hash`
/// non-empty, pattern lists are well-formed ACL patterns, `max_connections >= 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttIdentity {
    pub username: String,
    pub password_hash: String,
    pub allowed_client_id: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub allowed_publish_patterns: Vec<String>,
    pub allowed_subscribe_patterns: Vec<String>,
    pub max_connections: u32,
    pub login_count: u64,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a new identity. Password is taken as
/// plaintext here and hashed by the store before persisting.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub username: String,
    pub password: String,
    pub allowed_client_id: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub allowed_publish_patterns: Vec<String>,
    pub allowed_subscribe_patterns: Vec<String>,
    pub max_connections: u32,
}

/// Partial update, admin-surface CRUD. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct IdentityUpdate {
    pub password: Option<String>,
    pub allowed_client_id: Option<Option<String>>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub allowed_publish_patterns: Option<Vec<String>>,
    pub allowed_subscribe_patterns: Option<Vec<String>>,
    pub max_connections: Option<u32>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// O(1) expected, indexed by username.
    async fn lookup(&self, username: &str) -> AuthdResult<Option<MqttIdentity>>;

    /// Constant-time verification of the adaptive hash against `plaintext`.
    /// CPU-bound and intentionally slow; callers should run this off the
    /// async executor (see `tokio::task::spawn_blocking` at the call sites).
    fn verify_password(&self, identity: &MqttIdentity, plaintext: &str) -> bool {
        hash::verify(plaintext, &identity.password_hash)
    }

    /// Fire-and-forget bookkeeping: bump `login_count`, set `last_login_at`/`last_login_ip`.
    async fn record_successful_login(&self, username: &str, peer_addr: &str) -> AuthdResult<()>;

    // --- admin-surface CRUD, not on the decision hot path ---
    async fn create(&self, new_identity: NewIdentity) -> AuthdResult<MqttIdentity>;
    async fn update(&self, username: &str, update: IdentityUpdate) -> AuthdResult<MqttIdentity>;
    async fn delete(&self, username: &str) -> AuthdResult<()>;
    async fn list(&self) -> AuthdResult<Vec<MqttIdentity>>;

    /// Used by the liveness probe: whether the store can currently be reached.
    async fn is_reachable(&self) -> bool;
}
