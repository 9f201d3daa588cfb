// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Stdio transport for local MCP clients.
//!
//! One JSON-RPC message per input line, one response per output line. The
//! whole session shares a single rate limit identity.

use crate::dispatcher::RequestContext;
use crate::handlers::{AppState, BoundedLines, Line, MAX_LINE_BYTES};
use crate::protocol::{JsonRpcError, JsonRpcResponse};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Rate limit identity of the stdio session.
pub const STDIO_CLIENT: &str = "stdio";

/// Errors that end a stdio session.
#[derive(Debug, Error)]
pub enum StdioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Response encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<LinesCodecError> for StdioError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::Io(err) => Self::Io(err),
            LinesCodecError::MaxLineLengthExceeded => Self::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "line too long",
            )),
        }
    }
}

/// Serve the process's stdin and stdout until stdin closes.
pub async fn run(state: &AppState) -> Result<(), StdioError> {
    info!("Serving MCP on stdio");
    serve_lines(state, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Answer each line of `reader` on `writer` until end of input.
pub async fn serve_lines<R, W>(state: &AppState, reader: R, writer: W) -> Result<(), StdioError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = FramedRead::new(reader, BoundedLines::new());
    let mut out = FramedWrite::new(writer, LinesCodec::new());
    let ctx = RequestContext {
        client_ip: STDIO_CLIENT.to_string(),
    };

    while let Some(line) = lines.next().await {
        let response = match line {
            Ok(Line::Text(line)) if line.trim().is_empty() => continue,
            Ok(Line::Text(line)) => state.dispatcher.handle_line(line.trim(), &ctx).await,
            Ok(Line::TooLong) => {
                warn!(max = MAX_LINE_BYTES, "JSON-RPC line too long");
                state.metrics.parse_errors.inc();
                Some(JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error()))
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(response) = response {
            out.send(serde_json::to_string(&response)?).await?;
        }
    }

    debug!("Stdin closed");
    Ok(())
}
