//! In-memory `CredentialStore`. Used for local/dev runs when no
//! `store.database_url` is configured, and as the composition every unit
//! test builds fresh rather than reaching for a shared global.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;

use super::{CredentialStore, IdentityUpdate, MqttIdentity, NewIdentity, hash};
use crate::error::{AuthdError, AuthdResult};

#[derive(Default)]
pub struct InMemoryStore {
    identities: RwLock<HashMap<String, MqttIdentity>>,
    hash_cost: u32,
}

impl InMemoryStore {
    pub fn new(hash_cost: u32) -> Self {
        Self {
            identities: RwLock::new(HashMap::new()),
            hash_cost,
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn lookup(&self, username: &str) -> AuthdResult<Option<MqttIdentity>> {
        Ok(self
            .identities
            .read()
            .unwrap()
            .get(username)
            .cloned())
    }

    async fn record_successful_login(&self, username: &str, peer_addr: &str) -> AuthdResult<()> {
        let mut identities = self.identities.write().unwrap();
        if let Some(identity) = identities.get_mut(username) {
            identity.login_count += 1;
            identity.last_login_at = Some(Utc::now());
            identity.last_login_ip = Some(peer_addr.to_string());
        }
        Ok(())
    }

    async fn create(&self, new_identity: NewIdentity) -> AuthdResult<MqttIdentity> {
        let password_hash = hash::hash(&new_identity.password, self.hash_cost)
            .map_err(|e| AuthdError::Internal(format!("password hashing failed: {e}")))?;
        let now = Utc::now();
        let identity = MqttIdentity {
            username: new_identity.username.clone(),
            password_hash,
            allowed_client_id: new_identity.allowed_client_id,
            is_admin: new_identity.is_admin,
            is_active: new_identity.is_active,
            allowed_publish_patterns: new_identity.allowed_publish_patterns,
            allowed_subscribe_patterns: new_identity.allowed_subscribe_patterns,
            max_connections: new_identity.max_connections,
            login_count: 0,
            last_login_at: None,
            last_login_ip: None,
            created_at: now,
            updated_at: now,
        };

        let mut identities = self.identities.write().unwrap();
        if identities.contains_key(&identity.username) {
            return Err(AuthdError::BadRequest(format!(
                "identity {} already exists",
                identity.username
            )));
        }
        identities.insert(identity.username.clone(), identity.clone());
        Ok(identity)
    }

    async fn update(&self, username: &str, update: IdentityUpdate) -> AuthdResult<MqttIdentity> {
        let mut identities = self.identities.write().unwrap();
        let identity = identities
            .get_mut(username)
            .ok_or_else(|| AuthdError::BadRequest(format!("unknown identity {username}")))?;

        if let Some(password) = update.password {
            identity.password_hash = hash::hash(&password, self.hash_cost)
                .map_err(|e| AuthdError::Internal(format!("password hashing failed: {e}")))?;
        }
        if let Some(allowed_client_id) = update.allowed_client_id {
            identity.allowed_client_id = allowed_client_id;
        }
        if let Some(is_admin) = update.is_admin {
            identity.is_admin = is_admin;
        }
        if let Some(is_active) = update.is_active {
            identity.is_active = is_active;
        }
        if let Some(patterns) = update.allowed_publish_patterns {
            identity.allowed_publish_patterns = patterns;
        }
        if let Some(patterns) = update.allowed_subscribe_patterns {
            identity.allowed_subscribe_patterns = patterns;
        }
        if let Some(max_connections) = update.max_connections {
            identity.max_connections = max_connections;
        }
        identity.updated_at = Utc::now();
        Ok(identity.clone())
    }

    async fn delete(&self, username: &str) -> AuthdResult<()> {
        self.identities.write().unwrap().remove(username);
        Ok(())
    }

    async fn list(&self) -> AuthdResult<Vec<MqttIdentity>> {
        Ok(self.identities.read().unwrap().values().cloned().collect())
    }

    async fn is_reachable(&self) -> bool {
        true
    }
}
