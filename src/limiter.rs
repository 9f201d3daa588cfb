// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter backed by the key-value store.
//!
//! Implements dual-layer rate limiting:
//! 1. Per-client limit across all requests (1000 per window default)
//! 2. Per-client limit on a single section (10 per window default)
//!
//! Windows are aligned to multiples of their length since the epoch, so a
//! client can burst up to twice the limit across a window boundary.

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::models::RateWindowCounter;
use crate::store::{KeyValueStore, PutOptions, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Which counter produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitTier {
    /// Client-wide counter
    Global,
    /// Client and section counter
    Resource,
}

impl std::fmt::Display for RateLimitTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Resource => write!(f, "section"),
        }
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub tier: RateLimitTier,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the current window ends
    pub reset: i64,
}

impl RateLimitDecision {
    /// Time from `now_ms` until the window resets, rounded up to whole seconds.
    pub fn retry_after(&self, now_ms: i64) -> Duration {
        let ms = (self.reset - now_ms).max(0) as u64;
        Duration::from_secs(ms.div_ceil(1000))
    }
}

/// Store-backed fixed-window rate limiter.
///
/// Each check is a read followed by a write against the store. Two requests
/// for the same key in the same window can both read the old count and both
/// write `count + 1`, so concurrent traffic may briefly overshoot the limit.
/// Rejected requests never write, so a denial does not consume quota.
pub struct WindowedRateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl WindowedRateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(
        config: RateLimitConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check the global tier, then the resource tier when one is given.
    ///
    /// A global denial returns without touching the resource counter. A
    /// resource denial overrides an allowed global decision.
    pub async fn check(&self, identity: &str, resource: Option<&str>) -> RateLimitDecision {
        let global = self.check_global(identity).await;
        if !global.allowed {
            return global;
        }

        if let Some(resource) = resource {
            let scoped = self.check_resource(identity, resource).await;
            if !scoped.allowed {
                return scoped;
            }
        }

        global
    }

    /// Check the client-wide counter.
    pub async fn check_global(&self, identity: &str) -> RateLimitDecision {
        self.check_and_increment(
            &global_key(identity),
            self.config.global_limit,
            RateLimitTier::Global,
        )
        .await
    }

    /// Check the counter scoped to one resource for this client.
    pub async fn check_resource(&self, identity: &str, resource: &str) -> RateLimitDecision {
        self.check_and_increment(
            &resource_key(resource, identity),
            self.config.section_limit,
            RateLimitTier::Resource,
        )
        .await
    }

    async fn check_and_increment(
        &self,
        key: &str,
        limit: u32,
        tier: RateLimitTier,
    ) -> RateLimitDecision {
        let window_ms = self.config.window_ms();
        let window_start = window_start(self.clock.now_ms(), window_ms);
        let reset = window_start + window_ms;

        match self.advance(key, limit, window_start).await {
            Ok(Some(count)) => RateLimitDecision {
                allowed: true,
                tier,
                limit,
                remaining: limit.saturating_sub(count),
                reset,
            },
            Ok(None) => {
                debug!(key, limit, tier = %tier, "Rate limit exceeded");
                RateLimitDecision {
                    allowed: false,
                    tier,
                    limit,
                    remaining: 0,
                    reset,
                }
            }
            Err(err) => {
                warn!(key, error = %err, "Rate limit store failure, allowing request");
                RateLimitDecision {
                    allowed: true,
                    tier,
                    limit,
                    remaining: limit,
                    reset,
                }
            }
        }
    }

    /// Read the counter and write its successor. Returns the new count, or
    /// `None` when the window is already exhausted.
    async fn advance(
        &self,
        key: &str,
        limit: u32,
        window_start: i64,
    ) -> Result<Option<u32>, StoreError> {
        let current = match self.store.get(key).await? {
            Some(raw) => Some(
                serde_json::from_slice::<RateWindowCounter>(&raw).map_err(|source| {
                    StoreError::Corrupt {
                        key: key.to_string(),
                        source,
                    }
                })?,
            ),
            None => None,
        };

        let next = match current {
            Some(counter) if counter.window_start >= window_start => {
                if counter.count >= limit {
                    return Ok(None);
                }
                RateWindowCounter {
                    count: counter.count + 1,
                    window_start: counter.window_start,
                }
            }
            _ => RateWindowCounter {
                count: 1,
                window_start,
            },
        };

        let raw = serde_json::to_vec(&next).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        self.store
            .put(key, raw, PutOptions::expire_after(self.config.window_duration() * 2))
            .await?;

        Ok(Some(next.count))
    }
}

/// Start of the fixed window containing `now_ms`.
pub fn window_start(now_ms: i64, window_ms: i64) -> i64 {
    now_ms.div_euclid(window_ms) * window_ms
}

fn global_key(identity: &str) -> String {
    format!("global:{identity}")
}

fn resource_key(resource: &str, identity: &str) -> String {
    format!("resource:{resource}:{identity}")
}
