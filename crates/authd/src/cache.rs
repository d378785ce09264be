//! Verdict cache: short-TTL memoization of decisions, keyed by a fingerprint
//! of the request, with single-flight collapsing of duplicate concurrent
//! requests. Built on `moka`'s async cache, whose `get_with` already gives us
//! at-most-one-concurrent-computation-per-key for free.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use sha2::{Digest, Sha256};

/// Separator byte the spec reserves between fingerprint components; chosen
/// because it cannot appear in a username, client id, or topic string.
const FIELD_SEP: u8 = 0x1F;

fn digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([FIELD_SEP]);
        }
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// `hash(username \x1F client_id \x1F password_hash_of(password))`. The
/// plaintext is re-hashed into the key so the cache itself never stores it.
pub fn connect_fingerprint(username: &str, client_id: &str, password: &str) -> String {
    let mut password_digest = Sha256::new();
    password_digest.update(password.as_bytes());
    let password_digest = hex::encode(password_digest.finalize());
    digest(&[
        username.as_bytes(),
        client_id.as_bytes(),
        password_digest.as_bytes(),
    ])
}

pub fn publish_fingerprint(username: &str, topic: &str, qos: u8) -> String {
    digest(&[
        username.as_bytes(),
        topic.as_bytes(),
        qos.to_string().as_bytes(),
    ])
}

pub fn subscribe_fingerprint(username: &str, filters: &[String]) -> String {
    let mut sorted = filters.to_vec();
    sorted.sort();
    digest(&[username.as_bytes(), sorted.join(",").as_bytes()])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(&'static str),
}

impl Verdict {
    fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

#[derive(Clone)]
struct VerdictExpiry {
    allow_ttl: Duration,
    deny_ttl: Duration,
}

impl Expiry<String, Verdict> for VerdictExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Verdict,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(if value.is_allow() {
            self.allow_ttl
        } else {
            self.deny_ttl
        })
    }
}

pub struct VerdictCache {
    cache: Cache<String, Verdict>,
}

impl VerdictCache {
    pub fn new(capacity: u64, allow_ttl_ms: u64, deny_ttl_ms: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(VerdictExpiry {
                allow_ttl: Duration::from_millis(allow_ttl_ms),
                deny_ttl: Duration::from_millis(deny_ttl_ms),
            })
            .build();
        Self { cache }
    }

    /// Single-flight lookup: if `fingerprint` is already being computed by a
    /// concurrent caller, this awaits that computation's result instead of
    /// invoking `compute` again.
    pub async fn get_with<F, Fut>(&self, fingerprint: String, compute: F) -> Verdict
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Verdict>,
    {
        self.cache.get_with(fingerprint, compute()).await
    }

    /// Invalidates every cached entry whose fingerprint was computed for
    /// `username`. Since fingerprints are one-way digests we cannot recover
    /// the username from the key, so callers that mutate an identity should
    /// invalidate proactively by tracking issued fingerprints, or accept that
    /// stale entries age out within `deny_ttl`/`allow_ttl`. This repository
    /// takes the simpler, safe-by-construction route: a full cache clear on
    /// any identity mutation, which is cheap relative to the admin surface's
    /// write rate.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Best-effort hit check for metrics/activity-record purposes only: racy
    /// under concurrent single-flight computation, never used for decisions.
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.cache.contains_key(fingerprint)
    }
}

pub type SharedVerdictCache = Arc<VerdictCache>;
