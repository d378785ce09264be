pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod logger;
pub mod metrics;
pub mod topic;
pub mod tracker;
pub mod webhook;

use std::sync::Arc;

use crate::cache::SharedVerdictCache;
use crate::config::AuthdConfig;
use crate::error::AuthdResult;
use crate::identity::{CredentialStore, IdentityUpdate, MqttIdentity};
use crate::logger::ActivityLogger;
use crate::metrics::AuthMetrics;
use crate::tracker::ConnectionTracker;

/// Process-wide collaborators, constructed once at startup and passed into
/// every request handler as an `axum::extract::State`. Tests build a fresh
/// one per case rather than reaching for a shared global.
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub cache: SharedVerdictCache,
    pub tracker: Arc<ConnectionTracker>,
    pub logger: ActivityLogger,
    pub metrics: Arc<AuthMetrics>,
    pub config: AuthdConfig,
}

impl AppState {
    /// Admin-surface identity mutation. `CredentialStore` itself knows
    /// nothing about the verdict cache, so the invalidation this requires
    /// (spec: a changed identity must not keep being decided from a stale
    /// cached verdict) happens here, where both collaborators are in scope.
    pub async fn update_identity(
        &self,
        username: &str,
        update: IdentityUpdate,
    ) -> AuthdResult<MqttIdentity> {
        let identity = self.store.update(username, update).await?;
        self.cache.invalidate_all();
        Ok(identity)
    }

    pub async fn delete_identity(&self, username: &str) -> AuthdResult<()> {
        self.store.delete(username).await?;
        self.cache.invalidate_all();
        Ok(())
    }
}

pub type SharedAppState = Arc<AppState>;
