//! Line-based transport runner.
//!
//! One JSON-RPC message per line in, one response per line out. Every
//! request is dispatched on its own task so a slow ServiceNow call does not
//! hold up `ping` or `tools/list`; completed responses funnel back through a
//! channel and are written by the loop, which owns the writer.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::MAX_MESSAGE_SIZE;
use crate::context::RequestContext;
use crate::error::McpError;
use crate::handler::McpHandler;
use crate::jsonrpc::JsonRpcOutgoing;
use crate::router;

/// Trait for types that can read lines.
pub trait LineReader: AsyncBufRead + Unpin + Send {}
impl<T: AsyncBufRead + Unpin + Send> LineReader for T {}

/// Trait for types that can write lines.
pub trait LineWriter: AsyncWrite + Unpin + Send {}
impl<T: AsyncWrite + Unpin + Send> LineWriter for T {}

/// Shared runner for newline-delimited JSON-RPC.
#[derive(Debug)]
pub struct LineTransportRunner<H: McpHandler> {
    handler: H,
}

impl<H: McpHandler> LineTransportRunner<H> {
    /// Create a new line transport runner.
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Run the transport loop until the reader reaches EOF.
    ///
    /// Responses for requests still in flight at EOF are drained before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns an internal error when reading from or writing to the
    /// underlying streams fails.
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: LineReader,
        W: LineWriter,
    {
        let (response_tx, mut response_rx) = mpsc::channel::<JsonRpcOutgoing>(32);
        let mut line = String::new();

        loop {
            tokio::select! {
                res = reader.read_line(&mut line) => {
                    let bytes_read = res.map_err(|e| McpError::internal(format!("Failed to read line: {e}")))?;
                    if bytes_read == 0 {
                        break;
                    }

                    if line.len() > MAX_MESSAGE_SIZE {
                        self.send_error(
                            &mut writer,
                            McpError::invalid_request(format!(
                                "Message exceeds maximum size of {MAX_MESSAGE_SIZE} bytes",
                            )),
                        ).await?;
                        line.clear();
                        continue;
                    }

                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        line.clear();
                        continue;
                    }

                    match router::parse_request(trimmed) {
                        Ok(request) => {
                            let handler = self.handler.clone();
                            let resp_tx = response_tx.clone();
                            let ctx = RequestContext::stdio(request.id.as_ref());

                            tokio::spawn(async move {
                                let response = router::route_request(&handler, request, &ctx).await;
                                // Closed channel means the loop has already exited.
                                let _ = resp_tx.send(response).await;
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Rejected malformed message");
                            self.send_error(&mut writer, e).await?;
                        }
                    }
                    line.clear();
                }

                Some(response) = response_rx.recv() => {
                    if response.should_send() {
                        self.send_response(&mut writer, &response).await?;
                    }
                }
            }
        }

        // Close our sender so the channel ends once in-flight tasks finish.
        drop(response_tx);

        while let Some(response) = response_rx.recv().await {
            if response.should_send() {
                self.send_response(&mut writer, &response).await?;
            }
        }

        tracing::debug!("Input closed, transport loop finished");
        Ok(())
    }

    /// Send a JSON-RPC response.
    async fn send_response<W: LineWriter>(
        &self,
        writer: &mut W,
        response: &JsonRpcOutgoing,
    ) -> Result<(), McpError> {
        let response_str = router::serialize_response(response)?;
        writer
            .write_all(response_str.as_bytes())
            .await
            .map_err(|e| McpError::internal(format!("Failed to write response: {e}")))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| McpError::internal(format!("Failed to write newline: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| McpError::internal(format!("Failed to flush: {e}")))?;
        Ok(())
    }

    /// Send an error frame that cannot be tied to a request id.
    async fn send_error<W: LineWriter>(
        &self,
        writer: &mut W,
        error: McpError,
    ) -> Result<(), McpError> {
        let response = JsonRpcOutgoing::error(None, error);
        self.send_response(writer, &response).await
    }
}

/// Serve `handler` over the process stdin/stdout.
///
/// # Errors
///
/// Returns an internal error when stdin or stdout fail.
pub async fn run_stdio<H: McpHandler>(handler: H) -> Result<(), McpError> {
    tracing::info!("Serving MCP over stdio");
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    LineTransportRunner::new(handler).run(reader, writer).await
}
