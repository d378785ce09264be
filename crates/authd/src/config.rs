//! Typed configuration, layered from `config.toml` under `AUTHD_*` environment
//! overrides via `figment`, matching the defaults enumerated in the design doc.

use std::net::SocketAddr;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub connect_ttl_ms: u64,
    pub deny_ttl_ms: u64,
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            connect_ttl_ms: 60_000,
            deny_ttl_ms: 5_000,
            capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub queue_capacity: usize,
    pub batch_size: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub deadline_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self { deadline_ms: 5_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub hash_cost: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self { hash_cost: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub decision_bind: SocketAddr,
    pub metrics_bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            decision_bind: "0.0.0.0:8080".parse().unwrap(),
            metrics_bind: "0.0.0.0:9090".parse().unwrap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// When unset, the in-memory `CredentialStore` is used (local/dev runs and tests).
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthdConfig {
    pub cache: CacheConfig,
    pub logger: LoggerConfig,
    pub endpoint: EndpointConfig,
    pub password: PasswordConfig,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
    pub admin_prefix: String,
}

fn default_admin_prefix() -> String {
    "admin/".to_string()
}

impl Default for AuthdConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            logger: LoggerConfig::default(),
            endpoint: EndpointConfig::default(),
            password: PasswordConfig::default(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            log: LogConfig::default(),
            admin_prefix: default_admin_prefix(),
        }
    }
}

impl AuthdConfig {
    /// Loads `config.toml` (if present in the working directory) and overlays
    /// any `AUTHD_*` environment variables, e.g. `AUTHD_CACHE.CONNECT_TTL_MS`.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(AuthdConfig::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("AUTHD_").split("__"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_doc() {
        let cfg = AuthdConfig {
            admin_prefix: default_admin_prefix(),
            ..Default::default()
        };
        assert_eq!(cfg.cache.connect_ttl_ms, 60_000);
        assert_eq!(cfg.cache.deny_ttl_ms, 5_000);
        assert_eq!(cfg.cache.capacity, 10_000);
        assert_eq!(cfg.logger.queue_capacity, 10_000);
        assert_eq!(cfg.logger.batch_size, 100);
        assert_eq!(cfg.endpoint.deadline_ms, 5_000);
        assert_eq!(cfg.password.hash_cost, 10);
        assert_eq!(cfg.admin_prefix, "admin/");
    }

    #[test]
    fn env_override_wins() {
        // SAFETY: test-only, single-threaded access to the process environment.
        unsafe {
            std::env::set_var("AUTHD_CACHE__CONNECT_TTL_MS", "1234");
        }
        let cfg: AuthdConfig = Figment::new()
            .merge(Serialized::defaults(AuthdConfig::default()))
            .merge(Env::prefixed("AUTHD_").split("__"))
            .extract()
            .unwrap();
        assert_eq!(cfg.cache.connect_ttl_ms, 1234);
        // SAFETY: see above.
        unsafe {
            std::env::remove_var("AUTHD_CACHE__CONNECT_TTL_MS");
        }
    }
}
