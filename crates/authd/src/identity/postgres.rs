//! PostgreSQL-backed `CredentialStore`. Follows the codebase's convention of
//! raw SQL behind `sqlx::query_as`/`sqlx::query` rather than an ORM, with one
//! function per operation and a `DatabaseError` wrapping `sqlx::Error`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::Row;

use super::{CredentialStore, IdentityUpdate, MqttIdentity, NewIdentity, hash};
use crate::error::{AuthdError, AuthdResult};

/// Canonical on-disk form is a comma-separated pattern list; empty string means allow-all.
fn encode_patterns(patterns: &[String]) -> String {
    patterns.join(",")
}

fn decode_patterns(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        Vec::new()
    } else {
        raw.split(',').map(str::to_string).collect()
    }
}

fn row_to_identity(row: sqlx::postgres::PgRow) -> Result<MqttIdentity, sqlx::Error> {
    Ok(MqttIdentity {
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        allowed_client_id: row.try_get("allowed_client_id")?,
        is_admin: row.try_get("is_admin")?,
        is_active: row.try_get("is_active")?,
        allowed_publish_patterns: decode_patterns(row.try_get::<String, _>("allowed_publish_patterns")?.as_str()),
        allowed_subscribe_patterns: decode_patterns(
            row.try_get::<String, _>("allowed_subscribe_patterns")?.as_str(),
        ),
        max_connections: row.try_get::<i32, _>("max_connections")? as u32,
        login_count: row.try_get::<i64, _>("login_count")? as u64,
        last_login_at: row.try_get::<Option<DateTime<Utc>>, _>("last_login_at")?,
        last_login_ip: row.try_get("last_login_ip")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PostgresStore {
    pool: PgPool,
    hash_cost: u32,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, hash_cost: u32) -> AuthdResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| AuthdError::StoreUnavailable(Box::new(e)))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AuthdError::StoreUnavailable(Box::new(e)))?;
        Ok(Self { pool, hash_cost })
    }
}

#[async_trait]
impl CredentialStore for PostgresStore {
    async fn lookup(&self, username: &str) -> AuthdResult<Option<MqttIdentity>> {
        let query = "select * from mqtt_identities where username = $1";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthdError::StoreUnavailable(Box::new(e)))?;

        row.map(row_to_identity)
            .transpose()
            .map_err(|e| AuthdError::Internal(format!("corrupt identity row: {e}")))
    }

    async fn record_successful_login(&self, username: &str, peer_addr: &str) -> AuthdResult<()> {
        let query = "update mqtt_identities \
            set login_count = login_count + 1, last_login_at = now(), last_login_ip = $2 \
            where username = $1";
        sqlx::query(query)
            .bind(username)
            .bind(peer_addr)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthdError::StoreUnavailable(Box::new(e)))?;
        Ok(())
    }

    async fn create(&self, new_identity: NewIdentity) -> AuthdResult<MqttIdentity> {
        let password_hash = hash::hash(&new_identity.password, self.hash_cost)
            .map_err(|e| AuthdError::Internal(format!("password hashing failed: {e}")))?;

        let query = "insert into mqtt_identities \
            (username, password_hash, allowed_client_id, is_admin, is_active, \
             allowed_publish_patterns, allowed_subscribe_patterns, max_connections) \
            values ($1, $2, $3, $4, $5, $6, $7, $8) \
            returning *";
        let row = sqlx::query(query)
            .bind(&new_identity.username)
            .bind(&password_hash)
            .bind(&new_identity.allowed_client_id)
            .bind(new_identity.is_admin)
            .bind(new_identity.is_active)
            .bind(encode_patterns(&new_identity.allowed_publish_patterns))
            .bind(encode_patterns(&new_identity.allowed_subscribe_patterns))
            .bind(new_identity.max_connections as i32)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthdError::StoreUnavailable(Box::new(e)))?;

        row_to_identity(row).map_err(|e| AuthdError::Internal(format!("corrupt identity row: {e}")))
    }

    async fn update(&self, username: &str, update: IdentityUpdate) -> AuthdResult<MqttIdentity> {
        // Admin-surface writes are low-rate; a read-modify-write under the
        // row is simpler than a dynamic SET clause builder and is plenty fast.
        let mut identity = self
            .lookup(username)
            .await?
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

        let query = "update mqtt_identities set \
            password_hash = $2, allowed_client_id = $3, is_admin = $4, is_active = $5, \
            allowed_publish_patterns = $6, allowed_subscribe_patterns = $7, max_connections = $8, \
            updated_at = now() \
            where username = $1 returning *";
        let row = sqlx::query(query)
            .bind(username)
            .bind(&identity.password_hash)
            .bind(&identity.allowed_client_id)
            .bind(identity.is_admin)
            .bind(identity.is_active)
            .bind(encode_patterns(&identity.allowed_publish_patterns))
            .bind(encode_patterns(&identity.allowed_subscribe_patterns))
            .bind(identity.max_connections as i32)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthdError::StoreUnavailable(Box::new(e)))?;

        row_to_identity(row).map_err(|e| AuthdError::Internal(format!("corrupt identity row: {e}")))
    }

    async fn delete(&self, username: &str) -> AuthdResult<()> {
        sqlx::query("delete from mqtt_identities where username = $1")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthdError::StoreUnavailable(Box::new(e)))?;
        Ok(())
    }

    async fn list(&self) -> AuthdResult<Vec<MqttIdentity>> {
        let rows = sqlx::query("select * from mqtt_identities order by username")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuthdError::StoreUnavailable(Box::new(e)))?;

        rows.into_iter()
            .map(row_to_identity)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AuthdError::Internal(format!("corrupt identity row: {e}")))
    }

    async fn is_reachable(&self) -> bool {
        sqlx::query("select 1").execute(&self.pool).await.is_ok()
    }
}
