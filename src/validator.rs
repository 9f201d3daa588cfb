// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! `tools/call` argument validator.
//!
//! Implements the checks that run before any storage or network access:
//! - Tool name must be the one exposed tool
//! - `section` argument must be present and a string
//! - `section` must look like an Education Code section number

use crate::protocol::ToolInvocation;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Name of the single exposed tool.
pub const TOOL_NAME: &str = "fetch_ed_code";

/// Section numbers: digits with an optional decimal suffix.
pub const SECTION_PATTERN: &str = r"^\d+(\.\d+)?$";

fn section_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SECTION_PATTERN).expect("section pattern is valid"))
}

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid section format: {0}")]
    InvalidSection(String),
}

/// Whether `section` is a well-formed section number.
pub fn is_valid_section(section: &str) -> bool {
    section_pattern().is_match(section)
}

/// Check a `tools/call` invocation and return the section it asks for.
pub fn validate_tool_call(invocation: &ToolInvocation) -> Result<String, ValidationError> {
    match invocation.tool_name.as_deref() {
        Some(TOOL_NAME) => {}
        other => {
            debug!(tool = ?other, "Unknown tool requested");
            return Err(ValidationError::UnknownTool(
                other.unwrap_or_default().to_string(),
            ));
        }
    }

    let raw = invocation
        .arguments
        .as_ref()
        .and_then(|args| args.get("section"));

    let section = match raw {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            debug!("Missing section parameter");
            return Err(ValidationError::MissingParameter("section"));
        }
        Some(other) => {
            debug!(section = %other, "Section parameter has wrong type");
            return Err(ValidationError::InvalidSection(other.to_string()));
        }
    };

    if !is_valid_section(&section) {
        debug!(%section, "Invalid section format");
        return Err(ValidationError::InvalidSection(section));
    }

    Ok(section)
}
