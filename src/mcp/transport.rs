//! Newline-delimited JSON-RPC over a byte stream (stdin/stdout in the binary).
//!
//! One message per line. Requests are handled strictly in order: the next line
//! is not read until the previous reply has been written.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::protocol::rpc_error;
use super::router::McpRouter;
use crate::types::{TransportConfig, RPC_INVALID_REQUEST};

/// Outcome of reading one line.
enum Line {
    Message(Vec<u8>),
    TooLarge(usize),
    Eof,
}

/// Read one line of at most `max_bytes` (newline excluded). Oversized lines
/// are consumed up to their newline and reported, not buffered.
async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
) -> std::io::Result<Line> {
    let mut buf = Vec::new();
    let limit = max_bytes as u64 + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(Line::Eof);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(Line::Message(buf));
    }
    if buf.len() <= max_bytes {
        // final line without a trailing newline
        return Ok(Line::Message(buf));
    }

    let mut total = buf.len();
    loop {
        buf.clear();
        let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
        total += n;
        if n == 0 || buf.last() == Some(&b'\n') {
            return Ok(Line::TooLarge(total));
        }
    }
}

async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &serde_json::Value,
) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await
}

/// Line-framed MCP server.
#[derive(Debug)]
pub struct StdioServer {
    router: McpRouter,
    config: TransportConfig,
    cancel: CancellationToken,
}

impl StdioServer {
    pub fn new(router: McpRouter, config: TransportConfig) -> Self {
        Self {
            router,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops `serve` when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Serve until EOF, cancellation, or an I/O error.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(
            max_message_bytes = self.config.max_message_bytes,
            "mcp_server_started"
        );

        loop {
            let line = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("mcp_server_cancelled");
                    break;
                }
                line = read_line(&mut reader, self.config.max_message_bytes) => line?,
            };

            let reply = match line {
                Line::Eof => {
                    tracing::info!("mcp_server_eof");
                    break;
                }
                Line::TooLarge(size) => {
                    tracing::warn!(size, "mcp_message_too_large");
                    Some(rpc_error(
                        serde_json::Value::Null,
                        RPC_INVALID_REQUEST,
                        format!(
                            "Message too large: {} bytes (max {})",
                            size, self.config.max_message_bytes
                        ),
                    ))
                }
                Line::Message(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    if text.trim().is_empty() {
                        continue;
                    }
                    self.router.handle_message(&text).await
                }
            };

            if let Some(reply) = reply {
                write_message(&mut writer, &reply).await?;
            }
        }
        Ok(())
    }
}
