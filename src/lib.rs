// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! California Education Code MCP server
//!
//! This crate serves the Model Context Protocol over a streaming HTTP
//! endpoint and exposes one tool, `fetch_ed_code`, that returns the text of
//! an Education Code section:
//!
//! - Fixed-window rate limiting per client (1000 per minute default)
//! - Fixed-window rate limiting per client and section (10 per minute)
//! - Section cache with lazy expiry (24 hours default)
//! - Section extraction from the legislative information site
//! - JSON-RPC 2.0 framed as server-sent events, or line-delimited on stdio

pub mod cache;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod fetcher;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod protocol;
pub mod stdio;
pub mod store;
pub mod validator;

pub use cache::{CacheStats, SectionCache};
pub use config::{Config, Transport};
pub use dispatcher::{RequestContext, ToolDispatcher};
pub use handlers::{build_router, AppState};
pub use limiter::{RateLimitDecision, RateLimitTier, WindowedRateLimiter};
pub use models::EdCodeSection;
pub use parser::EdCodeParser;
pub use store::{KeyValueStore, MemoryStore};
