// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! JSON-RPC method dispatch for the MCP server.
//!
//! Each message is handled on its own: validate, check the client-wide and
//! per-section rate limits, consult the cache, and only then fetch and
//! extract. A rejected or cached call never reaches the upstream site.

use crate::cache::SectionCache;
use crate::fetcher::{DocumentSource, FetchError};
use crate::limiter::{RateLimitTier, WindowedRateLimiter};
use crate::metrics::Metrics;
use crate::parser::EdCodeParser;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolInvocation, ToolResult};
use crate::validator::{validate_tool_call, ValidationError, SECTION_PATTERN, TOOL_NAME};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// MCP protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported by `initialize`.
pub const SERVER_NAME: &str = "ca-ed-code-mcp";

/// Per-connection facts the dispatcher needs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Rate limit identity of the caller
    pub client_ip: String,
}

/// Routes JSON-RPC messages to the supported methods.
pub struct ToolDispatcher {
    limiter: Arc<WindowedRateLimiter>,
    cache: SectionCache,
    source: Arc<dyn DocumentSource>,
    parser: EdCodeParser,
    metrics: Metrics,
}

impl ToolDispatcher {
    pub fn new(
        limiter: Arc<WindowedRateLimiter>,
        cache: SectionCache,
        source: Arc<dyn DocumentSource>,
        parser: EdCodeParser,
        metrics: Metrics,
    ) -> Self {
        Self {
            limiter,
            cache,
            source,
            parser,
            metrics,
        }
    }

    /// The section cache, for stats.
    pub fn cache(&self) -> &SectionCache {
        &self.cache
    }

    /// Handle one line of the request stream.
    ///
    /// Returns `None` for notifications, which get no response.
    pub async fn handle_line(&self, line: &str, ctx: &RequestContext) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle(request, ctx).await,
            Err(err) => {
                warn!(client_ip = %ctx.client_ip, error = %err, "Malformed JSON-RPC message");
                self.metrics.parse_errors.inc();
                Some(JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error()))
            }
        }
    }

    /// Handle one parsed request.
    pub async fn handle(&self, request: JsonRpcRequest, ctx: &RequestContext) -> Option<JsonRpcResponse> {
        self.metrics
            .requests
            .with_label_values(&[method_label(&request.method)])
            .inc();

        if request.is_notification() {
            debug!(method = %request.method, "Notification received");
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        debug!(method = %request.method, %id, "Processing request");

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, initialize_result()),
            "tools/list" => JsonRpcResponse::success(id, tools_list_result()),
            "tools/call" => self.call_tool(ToolInvocation::from_request(&request), ctx).await,
            other => {
                debug!(method = %other, "Unknown method");
                JsonRpcResponse::failure(id, JsonRpcError::method_not_found())
            }
        };

        Some(response)
    }

    async fn call_tool(&self, invocation: ToolInvocation, ctx: &RequestContext) -> JsonRpcResponse {
        let id = invocation.id.clone();

        let section = match validate_tool_call(&invocation) {
            Ok(section) => section,
            Err(ValidationError::UnknownTool(_)) => {
                return JsonRpcResponse::failure(id, JsonRpcError::invalid_params("Unknown tool"));
            }
            Err(err) => {
                return JsonRpcResponse::failure(id, JsonRpcError::invalid_params(err.to_string()));
            }
        };

        let decision = self.limiter.check(&ctx.client_ip, Some(&section)).await;
        if !decision.allowed {
            info!(
                client_ip = %ctx.client_ip,
                %section,
                tier = %decision.tier,
                limit = decision.limit,
                reset = decision.reset,
                "Tool call rate limited"
            );
            self.metrics
                .rate_limited
                .with_label_values(&[decision.tier.to_string().as_str()])
                .inc();
            let message = match decision.tier {
                RateLimitTier::Global => "Rate limit exceeded",
                RateLimitTier::Resource => "Rate limit exceeded for this section",
            };
            let mut error = JsonRpcError::rate_limited(message);
            error.data = Some(json!({
                "tier": decision.tier.to_string(),
                "limit": decision.limit,
                "remaining": decision.remaining,
                "reset": decision.reset,
            }));
            return JsonRpcResponse::failure(id, error);
        }

        match self.lookup(&section).await.into_value() {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                error!(%section, error = %err, "Tool result not serializable");
                JsonRpcResponse::failure(id, JsonRpcError::internal_error())
            }
        }
    }

    /// Cache, then fetch and extract.
    async fn lookup(&self, section: &str) -> ToolResult {
        if let Some(cached) = self.cache.get(section).await {
            debug!(%section, "Cache hit");
            self.metrics.cache_lookups.with_label_values(&["hit"]).inc();
            return ToolResult::section(&cached);
        }
        self.metrics.cache_lookups.with_label_values(&["miss"]).inc();

        let url = self.parser.build_url(section);
        info!(%section, %url, "Cache miss, fetching section");

        let html = match self.source.fetch(&url).await {
            Ok(html) => html,
            Err(err) => {
                warn!(%section, error = %err, "Section fetch failed");
                let outcome = match err {
                    FetchError::Status { .. } => "http_error",
                    FetchError::Transport(_) => "transport_error",
                };
                self.metrics.upstream_fetches.with_label_values(&[outcome]).inc();
                return ToolResult::error(format!(
                    "Error: Failed to fetch California Education Code section {section}: {err}"
                ));
            }
        };

        match self.parser.parse_section(&html, section) {
            Ok(mut parsed) => {
                self.metrics.upstream_fetches.with_label_values(&["ok"]).inc();
                parsed.fetched_at = Some(Utc::now());
                self.cache.set(section, &parsed).await;
                ToolResult::section(&parsed)
            }
            Err(err) => {
                info!(%section, reason = %err, "Section not found in page");
                self.metrics.upstream_fetches.with_label_values(&["not_found"]).inc();
                ToolResult::error(format!(
                    "Error: Could not find California Education Code section {section}. \
                     Please verify the section number exists."
                ))
            }
        }
    }
}

fn method_label(method: &str) -> &'static str {
    match method {
        "initialize" => "initialize",
        "tools/list" => "tools/list",
        "tools/call" => "tools/call",
        m if m.starts_with("notifications/") => "notification",
        _ => "other",
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn tools_list_result() -> Value {
    json!({
        "tools": [
            {
                "name": TOOL_NAME,
                "description": "Fetch California Education Code section content by section number",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "section": {
                            "type": "string",
                            "description": "The Ed Code section number (e.g., '15278', '44237.5')",
                            "pattern": SECTION_PATTERN
                        }
                    },
                    "required": ["section"]
                }
            }
        ]
    })
}
