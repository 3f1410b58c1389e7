use axum::{body::Bytes, http::Uri};
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

use crate::config::CacheKeyScope;

const MAX_ENTRIES: u64 = 1_000;

/// In-process page cache for serialized JSON responses.
///
/// Lookups and inserts are separate steps, so two concurrent misses for the same key
/// both go upstream and the later insert wins. A zero TTL disables the cache.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Option<Cache<String, Bytes>>,
    ttl: Duration,
    scope: CacheKeyScope,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("scope", &self.scope)
            .finish()
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration, scope: CacheKeyScope) -> Self {
        let entries = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build()
        });
        Self { entries, ttl, scope }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn key(&self, uri: &Uri) -> String {
        match (self.scope, uri.query()) {
            (CacheKeyScope::Full, Some(query)) => format!("{}?{}", uri.path(), query),
            _ => uri.path().to_string(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let body = self.entries.as_ref()?.get(key).await?;
        debug!(key = key, "Cache hit");
        Some(body)
    }

    pub async fn insert(&self, key: String, body: Bytes) {
        if let Some(entries) = &self.entries {
            entries.insert(key, body).await;
        }
    }
}
