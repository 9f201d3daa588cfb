// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Records exchanged between the extractor, the cache and the dispatcher,
//! and the shapes they take in the key-value store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One extracted Education Code section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdCodeSection {
    /// Section number, e.g. "15278" or "44237.5"
    pub section: String,
    /// Enclosing article heading, or a generic fallback
    pub title: String,
    /// Cleaned statutory text
    pub content: String,
    /// Page the text was extracted from
    pub url: String,
    /// When the page was fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// A section as stored by the cache, with the metadata used for lazy expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSection {
    #[serde(flatten)]
    pub section: EdCodeSection,
    /// Epoch milliseconds at write time
    pub cached_at: i64,
    /// TTL in seconds in force at write time
    pub ttl: u64,
}

impl CachedSection {
    /// Whether the entry is still valid at `now_ms`.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        let age = now_ms.saturating_sub(self.cached_at);
        age <= i64::try_from(self.ttl).unwrap_or(i64::MAX).saturating_mul(1000)
    }
}

/// Fixed-window request counter for one rate-limit key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateWindowCounter {
    pub count: u32,
    /// Epoch milliseconds, a multiple of the window length
    pub window_start: i64,
}
