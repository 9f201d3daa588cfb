// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Section cache with read-time expiry.
//!
//! Every entry records when it was written and the TTL in force. `get`
//! re-checks that age against the TTL and deletes stale entries itself; the
//! store-level expiry set on `set` only bounds storage growth.

use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::models::{CachedSection, EdCodeSection};
use crate::store::{KeyValueStore, PutOptions, StoreError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "edc:";

/// Point-in-time view of cache activity since start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    /// Entries found past their TTL and deleted on read
    pub expired: u64,
    /// Entries that failed to decode and were deleted
    pub corrupt: u64,
    pub writes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    corrupt: AtomicU64,
    writes: AtomicU64,
}

/// Cache of extracted sections keyed by section number.
///
/// Failures are logged and reported as a miss (reads) or ignored (writes).
pub struct SectionCache {
    config: CacheConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl SectionCache {
    pub fn new(config: CacheConfig, store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
            counters: Counters::default(),
        }
    }

    /// Counters since start-up. Store failures count as misses.
    pub fn stats(&self) -> CacheStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CacheStats {
            ttl_secs: self.config.ttl_secs,
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            expired: load(&self.counters.expired),
            corrupt: load(&self.counters.corrupt),
            writes: load(&self.counters.writes),
        }
    }

    /// Get a cached section if present and not older than its TTL.
    pub async fn get(&self, section: &str) -> Option<EdCodeSection> {
        let found = self.lookup(section).await;
        let counter = if found.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    async fn lookup(&self, section: &str) -> Option<EdCodeSection> {
        let key = cache_key(section);

        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(%key, error = %err, "Cache read failed");
                return None;
            }
        };

        let entry: CachedSection = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(source) => {
                let err = StoreError::Corrupt {
                    key: key.clone(),
                    source,
                };
                warn!(error = %err, "Evicting unreadable cache entry");
                self.counters.corrupt.fetch_add(1, Ordering::Relaxed);
                self.remove(&key).await;
                return None;
            }
        };

        if !entry.is_fresh(self.clock.now_ms()) {
            debug!(%key, cached_at = entry.cached_at, ttl = entry.ttl, "Cache entry expired");
            self.counters.expired.fetch_add(1, Ordering::Relaxed);
            self.remove(&key).await;
            return None;
        }

        Some(entry.section)
    }

    /// Cache a section under its number.
    pub async fn set(&self, section: &str, data: &EdCodeSection) {
        let key = cache_key(section);
        let entry = CachedSection {
            section: data.clone(),
            cached_at: self.clock.now_ms(),
            ttl: self.config.ttl_secs,
        };

        let raw = match serde_json::to_vec(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, error = %err, "Cache entry not serializable");
                return;
            }
        };

        if let Err(err) = self
            .store
            .put(&key, raw, PutOptions::expire_after(self.config.ttl()))
            .await
        {
            warn!(%key, error = %err, "Cache write failed");
            return;
        }
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop a cached section.
    pub async fn invalidate(&self, section: &str) {
        self.remove(&cache_key(section)).await;
    }

    async fn remove(&self, key: &str) {
        if let Err(err) = self.store.delete(key).await {
            warn!(%key, error = %err, "Cache delete failed");
        }
    }
}

fn cache_key(section: &str) -> String {
    format!("{KEY_PREFIX}{section}")
}
