// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the MCP server.
//!
//! `/sse` accepts line-delimited JSON-RPC in the request body and streams one
//! server-sent event per response. The client-wide rate limit is checked when
//! the stream opens; a denial is a plain 429 and the body is never read. Each
//! `tools/call` inside the stream is checked again against both tiers.

use crate::cache::{CacheStats, SectionCache};
use crate::clock::Clock;
use crate::config::Config;
use crate::dispatcher::{RequestContext, ToolDispatcher, SERVER_NAME};
use crate::fetcher::DocumentSource;
use crate::limiter::{RateLimitDecision, WindowedRateLimiter};
use crate::metrics::Metrics;
use crate::parser::EdCodeParser;
use crate::protocol::{sse_frame, JsonRpcError, JsonRpcResponse, SSE_PING};
use crate::store::KeyValueStore;
use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use futures::{future, stream, Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Longest accepted JSON-RPC line.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

const EVENT_STREAM: &str = "text/event-stream";

/// One decoded input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Longer than [`MAX_LINE_BYTES`]; the rest of it is skipped
    TooLong,
}

/// Line decoder that reports over-long lines as items.
///
/// A decoder error ends a `FramedRead` stream, so the length error is turned
/// into [`Line::TooLong`] and reading resumes at the next newline.
#[derive(Debug)]
pub struct BoundedLines(LinesCodec);

impl BoundedLines {
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }

    fn lift(result: Result<Option<String>, LinesCodecError>) -> std::io::Result<Option<Line>> {
        match result {
            Ok(line) => Ok(line.map(Line::Text)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Line::TooLong)),
            Err(LinesCodecError::Io(err)) => Err(err),
        }
    }
}

impl Default for BoundedLines {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BoundedLines {
    type Item = Line;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> std::io::Result<Option<Line>> {
        Self::lift(self.0.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> std::io::Result<Option<Line>> {
        Self::lift(self.0.decode_eof(buf))
    }
}

/// Errors building the application state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid upstream base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("Metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Shared application state.
pub struct AppState {
    pub limiter: Arc<WindowedRateLimiter>,
    pub dispatcher: ToolDispatcher,
    pub metrics: Metrics,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
}

impl AppState {
    /// Wire the limiter, cache and dispatcher onto one store.
    pub fn new(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        source: Arc<dyn DocumentSource>,
    ) -> Result<Self, StateError> {
        let metrics = Metrics::new()?;
        let parser = EdCodeParser::new(&config.upstream.base_url, &config.upstream.law_code)?;
        let limiter = Arc::new(WindowedRateLimiter::new(
            config.rate_limit.clone(),
            store.clone(),
            clock.clone(),
        ));
        let cache = SectionCache::new(config.cache.clone(), store, clock.clone());
        let dispatcher =
            ToolDispatcher::new(limiter.clone(), cache, source, parser, metrics.clone());

        Ok(Self {
            limiter,
            dispatcher,
            metrics,
            clock,
            config,
        })
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the router with CORS and request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static(X_RATELIMIT_LIMIT),
            HeaderName::from_static(X_RATELIMIT_REMAINING),
            HeaderName::from_static(X_RATELIMIT_RESET),
        ]);

    let mut router = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/stats", get(stats))
        .route("/sse", any(sse));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(metrics));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Plain-text banner for anything that is not the protocol endpoint.
pub async fn index() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain")],
        "CA Ed Code MCP Server - Use /sse endpoint for MCP protocol",
    )
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Cache counters as JSON.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.dispatcher.cache().stats())
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "Metrics rendering failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Streaming JSON-RPC endpoint.
pub async fn sse(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let accepts_stream = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(EVENT_STREAM));
    if !accepts_stream {
        return (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain")],
            "SSE endpoint - set Accept: text/event-stream",
        )
            .into_response();
    }

    let client_ip = client_ip(&request);
    let decision = state.limiter.check_global(&client_ip).await;
    let rate_headers = rate_limit_headers(&decision);

    if !decision.allowed {
        let retry_after = decision.retry_after(state.clock.now_ms()).as_secs();
        info!(
            client_ip = %client_ip,
            limit = decision.limit,
            retry_after_secs = retry_after,
            "Request rate limited"
        );
        state
            .metrics
            .rate_limited
            .with_label_values(&[decision.tier.to_string().as_str()])
            .inc();
        return (
            StatusCode::TOO_MANY_REQUESTS,
            rate_headers,
            [(header::RETRY_AFTER, retry_after.to_string())],
            "Rate limit exceeded",
        )
            .into_response();
    }

    debug!(client_ip = %client_ip, remaining = decision.remaining, "Opening event stream");

    let ctx = RequestContext { client_ip };
    let frames = response_stream(state, ctx, request.into_body());

    (
        StatusCode::OK,
        rate_headers,
        [
            (header::CONTENT_TYPE, EVENT_STREAM),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

/// Turn the request body into a stream of SSE frames.
///
/// Lines are dispatched one at a time, in order. When the client goes away
/// the stream is dropped and any in-flight dispatch with it.
fn response_stream(
    state: Arc<AppState>,
    ctx: RequestContext,
    body: Body,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));
    let lines = FramedRead::new(reader, BoundedLines::new());

    let responses = lines.filter_map(move |line| {
        let state = state.clone();
        let ctx = ctx.clone();
        async move {
            let line = match line {
                Ok(Line::Text(line)) => line,
                Ok(Line::TooLong) => {
                    warn!(client_ip = %ctx.client_ip, max = MAX_LINE_BYTES, "JSON-RPC line too long");
                    state.metrics.parse_errors.inc();
                    return Some(sse_frame(&JsonRpcResponse::failure(
                        Value::Null,
                        JsonRpcError::parse_error(),
                    )));
                }
                Err(err) => {
                    debug!(client_ip = %ctx.client_ip, error = %err, "Request body ended with error");
                    return None;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                return None;
            }

            state
                .dispatcher
                .handle_line(line, &ctx)
                .await
                .map(|response| sse_frame(&response))
        }
    });

    stream::once(future::ready(SSE_PING.to_string()))
        .chain(responses)
        .map(|frame| Ok(Bytes::from(frame)))
}

/// Rate limit identity: proxy headers first, then the peer address.
pub fn client_ip(request: &Request) -> String {
    let headers = request.headers();
    let forwarded = header_value(headers, "cf-connecting-ip").or_else(|| {
        header_value(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
    });

    forwarded
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

fn rate_limit_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_LIMIT),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_REMAINING),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_RESET),
        HeaderValue::from(decision.reset),
    );
    headers
}
