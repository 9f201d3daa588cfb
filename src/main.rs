// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! California Education Code MCP Server
//!
//! Serves the Model Context Protocol on `/sse`. Each request body carries
//! newline-delimited JSON-RPC messages; each response is streamed back as a
//! server-sent event. With `MCP_TRANSPORT=stdio` the same messages are read
//! from stdin and answered on stdout, and logs go to stderr.
//!
//! ## Configuration
//!
//! Configuration is loaded from an optional config file (`CONFIG_FILE`,
//! default `ca-ed-code-mcp.{toml,yaml,json}`), `EDCODE__*` variables, and
//! these shorthand variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `CACHE_TTL`: Section cache lifetime in seconds (default: 86400)
//! - `GLOBAL_RATE_LIMIT`: Requests per window per client (default: 1000)
//! - `SECTION_RATE_LIMIT`: Requests per window per client and section (default: 10)
//! - `RATE_LIMIT_WINDOW`: Window length in seconds (default: 60)
//! - `MCP_TRANSPORT`: `http` or `stdio` (default: http)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, EnvFilter};

use ca_ed_code_mcp::{
    clock::SystemClock,
    config::{Config, Transport},
    fetcher::HttpDocumentSource,
    handlers::{build_router, AppState},
    stdio,
    store::MemoryStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;

    // Initialize tracing; stdout belongs to the protocol in stdio mode
    let writer = match config.transport {
        Transport::Http => BoxMakeWriter::new(std::io::stdout),
        Transport::Stdio => BoxMakeWriter::new(std::io::stderr),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().json().with_writer(writer))
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    info!(
        transport = ?config.transport,
        bind_addr = %config.bind_addr,
        global_limit = config.rate_limit.global_limit,
        section_limit = config.rate_limit.section_limit,
        window_secs = config.rate_limit.window_secs,
        cache_ttl_secs = config.cache.ttl_secs,
        upstream = %config.upstream.base_url,
        "Starting California Education Code MCP server"
    );

    // Create application state
    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let source = Arc::new(HttpDocumentSource::new(&config.upstream)?);
    let state = Arc::new(AppState::new(config.clone(), store.clone(), clock, source)?);

    // Spawn cleanup task
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let purged = store.purge_expired().await;
            debug!(purged, "Store cleanup finished");
        }
    });

    if config.transport == Transport::Stdio {
        stdio::run(&state).await?;
        return Ok(());
    }

    let app = build_router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
