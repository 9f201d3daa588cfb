// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for the MCP server.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters exported on the metrics endpoint.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// JSON-RPC messages handled, by method
    pub requests: IntCounterVec,
    /// Rate limit rejections, by tier
    pub rate_limited: IntCounterVec,
    /// Section cache lookups, by outcome (hit/miss)
    pub cache_lookups: IntCounterVec,
    /// Upstream fetches, by outcome (ok/not_found/http_error/transport_error)
    pub upstream_fetches: IntCounterVec,
    /// Lines that were not valid JSON-RPC
    pub parse_errors: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("ca_ed_code_mcp".to_string()), None)?;

        let requests = IntCounterVec::new(
            Opts::new("requests_total", "JSON-RPC messages handled"),
            &["method"],
        )?;
        let rate_limited = IntCounterVec::new(
            Opts::new("rate_limited_total", "Requests rejected by the rate limiter"),
            &["tier"],
        )?;
        let cache_lookups = IntCounterVec::new(
            Opts::new("cache_lookups_total", "Section cache lookups"),
            &["outcome"],
        )?;
        let upstream_fetches = IntCounterVec::new(
            Opts::new("upstream_fetches_total", "Section page fetches"),
            &["outcome"],
        )?;
        let parse_errors = IntCounter::new("parse_errors_total", "Malformed JSON-RPC lines")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(upstream_fetches.clone()))?;
        registry.register(Box::new(parse_errors.clone()))?;

        Ok(Self {
            registry,
            requests,
            rate_limited,
            cache_lookups,
            upstream_fetches,
            parse_errors,
        })
    }

    /// Render all counters in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
