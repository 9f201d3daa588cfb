// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! JSON-RPC 2.0 envelopes, MCP tool results and SSE framing.
//!
//! Two failure channels exist and must stay separate. Protocol failures
//! (bad envelope, unknown method or tool, bad arguments, rate limits) are
//! JSON-RPC `error` objects built with [`JsonRpcResponse::failure`]. Tool
//! failures (section not found, upstream fetch failed) are successful
//! responses whose [`ToolResult`] has `isError: true`.

use crate::models::EdCodeSection;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
/// Application-defined: rate limit rejections.
pub const SERVER_ERROR: i32 = -32000;

/// Inbound JSON-RPC request or notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Absent for notifications. An explicit `null` is kept as `Some(Null)`.
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal_error() -> Self {
        Self::new(INTERNAL_ERROR, "Internal error")
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SERVER_ERROR, message)
    }
}

/// Outbound JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// A protocol-level success carrying `result`.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A protocol-level failure.
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The `tools/call` view of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: Value,
    pub method: String,
    pub tool_name: Option<String>,
    pub arguments: Option<Value>,
}

impl ToolInvocation {
    pub fn from_request(request: &JsonRpcRequest) -> Self {
        let params = request.params.as_ref();
        Self {
            id: request.id.clone().unwrap_or(Value::Null),
            method: request.method.clone(),
            tool_name: params
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string),
            arguments: params.and_then(|p| p.get("arguments")).cloned(),
        }
    }
}

/// One content block of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text",
            text: text.into(),
        }
    }
}

/// Structured fields returned alongside a section's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMetadata {
    pub section: String,
    pub title: String,
    pub url: String,
    pub fetched_at: String,
}

/// Payload of a `tools/call` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
    #[serde(flatten)]
    pub metadata: Option<SectionMetadata>,
}

impl ToolResult {
    /// A section's text plus its metadata.
    pub fn section(section: &EdCodeSection) -> Self {
        let fetched_at = section.fetched_at.unwrap_or_else(Utc::now);
        Self {
            content: vec![ContentBlock::text(section.content.clone())],
            is_error: false,
            metadata: Some(SectionMetadata {
                section: section.section.clone(),
                title: section.title.clone(),
                url: section.url.clone(),
                fetched_at: fetched_at.to_rfc3339(),
            }),
        }
    }

    /// A well-formed call that produced nothing usable.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
            metadata: None,
        }
    }

    pub fn into_value(self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Frame a response as one server-sent event.
pub fn sse_frame(response: &JsonRpcResponse) -> String {
    let data = serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#
            .to_string()
    });
    format!("data: {data}\n\n")
}

/// SSE comment sent when a stream opens.
pub const SSE_PING: &str = ": ping\n\n";
