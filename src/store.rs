// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Key-value storage shared by the rate limiter and the section cache.
//!
//! The store is the only place cross-request state lives. It offers plain
//! get/put/delete with an optional expiry and no atomic increment, so callers
//! must tolerate read-then-write races.

use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt value under {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Options for a single write.
#[derive(Debug, Clone, Copy, Default)]
pub struct PutOptions {
    /// Drop the value after this long
    pub expire_after: Option<Duration>,
}

impl PutOptions {
    pub fn expire_after(ttl: Duration) -> Self {
        Self {
            expire_after: Some(ttl),
        }
    }
}

/// Eventually-consistent, TTL-capable key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&self, key: &str, value: Vec<u8>, options: PutOptions) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug)]
struct StoredValue {
    value: Vec<u8>,
    expires_at_ms: Option<i64>,
}

impl StoredValue {
    fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at_ms, Some(at) if now_ms >= at)
    }
}

/// In-process store honouring write expiry.
///
/// Expired values are hidden from `get` immediately and physically removed by
/// [`MemoryStore::purge_expired`].
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, StoredValue>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Remove expired entries, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, stored| !stored.is_expired(now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, remaining = entries.len(), "Purged expired store entries");
        }
        purged
    }

    /// Number of physically present entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now_ms();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|stored| !stored.is_expired(now))
            .map(|stored| stored.value.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>, options: PutOptions) -> Result<(), StoreError> {
        let expires_at_ms = options
            .expire_after
            .map(|ttl| {
                let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                self.clock.now_ms().saturating_add(ttl_ms)
            });
        self.entries.write().await.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
