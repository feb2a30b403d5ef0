//! Edge cache
//!
//! Per-node response cache in front of the origin.
//!
//! - Entries are keyed by normalised path only; query strings and cookies
//!   never reach the key
//! - An entry is served without contacting the origin until its TTL runs out
//! - Publishing does not invalidate entries, so new content becomes visible
//!   within one TTL
//! - On expiry the origin is re-read; unchanged content refreshes the entry
//! - Missing objects are answered from `404.html` and cached for the minimum TTL
//! - The map holds at most `capacity` keys; expired entries are swept first,
//!   then the oldest entry is evicted

use axum::body::Bytes;
use sha2::{Digest, Sha256};
use sitepipe_core::domain::cache::CachePolicy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::edge::content::{content_type, gzip, is_compressible};
use crate::repository::{Origin, TargetError};

pub const DEFAULT_ROOT_OBJECT: &str = "index.html";
pub const ERROR_DOCUMENT: &str = "404.html";

/// Default bound on cached keys per edge node
pub const DEFAULT_CAPACITY: usize = 10_000;

/// How a response was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    RefreshHit,
}

impl CacheStatus {
    /// Value of the `X-Cache` header
    pub fn header_value(self) -> &'static str {
        match self {
            CacheStatus::Hit => "Hit from edge",
            CacheStatus::Miss => "Miss from edge",
            CacheStatus::RefreshHit => "RefreshHit from edge",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Hit => write!(f, "Hit"),
            CacheStatus::Miss => write!(f, "Miss"),
            CacheStatus::RefreshHit => write!(f, "RefreshHit"),
        }
    }
}

/// Cached response
#[derive(Debug)]
pub struct EdgeObject {
    /// 200 or 404
    pub status: u16,
    pub content_type: &'static str,
    pub body: Bytes,
    /// Present when the body qualifies for compression
    pub gzipped: Option<Bytes>,
    /// Seconds the object may be served from cache
    pub ttl: u64,
}

struct CacheEntry {
    object: Arc<EdgeObject>,
    content_hash: String,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < Duration::from_secs(self.object.ttl)
    }
}

/// Response produced by the cache
#[derive(Debug)]
pub struct EdgeResponse {
    pub object: Arc<EdgeObject>,
    /// Seconds since the object was fetched from the origin
    pub age: u64,
    pub status: CacheStatus,
}

pub struct EdgeCache {
    policy: CachePolicy,
    origin: Arc<dyn Origin>,
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

/// Object key for a request path
///
/// Directory paths resolve to their `index.html`.
pub fn cache_key(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        format!("{}{}", trimmed, DEFAULT_ROOT_OBJECT)
    } else {
        trimmed.to_string()
    }
}

impl EdgeCache {
    pub fn new(policy: CachePolicy, origin: Arc<dyn Origin>) -> Self {
        Self {
            policy,
            origin,
            capacity: DEFAULT_CAPACITY,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Bounds the number of cached keys (at least one)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Answers a request for `path`
    pub async fn get(&self, path: &str) -> Result<EdgeResponse, TargetError> {
        let key = cache_key(path);
        let now = Instant::now();

        let previous_hash = {
            let entries = self.lock();
            match entries.get(&key) {
                Some(entry) if entry.is_fresh(now) => {
                    return Ok(EdgeResponse {
                        object: entry.object.clone(),
                        age: now.duration_since(entry.stored_at).as_secs(),
                        status: CacheStatus::Hit,
                    });
                }
                Some(entry) => Some(entry.content_hash.clone()),
                None => None,
            }
        };

        let (object, content_hash) = self.fetch(&key).await?;
        let status = if previous_hash.as_deref() == Some(content_hash.as_str()) {
            debug!("Revalidated {} unchanged", key);
            CacheStatus::RefreshHit
        } else {
            CacheStatus::Miss
        };

        let object = Arc::new(object);
        self.store(
            key,
            CacheEntry {
                object: object.clone(),
                content_hash,
                stored_at: Instant::now(),
            },
        );

        Ok(EdgeResponse {
            object,
            age: 0,
            status,
        })
    }

    fn store(&self, key: String, entry: CacheEntry) {
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let now = entry.stored_at;
            entries.retain(|_, cached| cached.is_fresh(now));

            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, cached)| cached.stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    debug!("Evicting {} from edge cache", oldest);
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(key, entry);
    }

    async fn fetch(&self, key: &str) -> Result<(EdgeObject, String), TargetError> {
        let (status, content_type, body, ttl): (u16, _, _, _) = match self.origin.fetch(key).await? {
            Some(found) => (
                200,
                content_type(key),
                found.body,
                self.policy.effective_ttl(found.max_age),
            ),
            None => {
                let body = match self.origin.fetch(ERROR_DOCUMENT).await? {
                    Some(page) => page.body,
                    None => b"Not Found".to_vec(),
                };
                (404, content_type(ERROR_DOCUMENT), body, self.policy.min_ttl())
            }
        };

        let mut hasher = Sha256::new();
        hasher.update(status.to_be_bytes());
        hasher.update(&body);
        let content_hash = hex::encode(hasher.finalize());

        let gzipped = if is_compressible(content_type, body.len()) {
            gzip(&body).ok().map(Bytes::from)
        } else {
            None
        };

        Ok((
            EdgeObject {
                status,
                content_type,
                body: Bytes::from(body),
                gzipped,
                ttl,
            },
            content_hash,
        ))
    }
}
