//! The MCP handler trait.
//!
//! The server only exposes tools, so the handler surface is three methods:
//! metadata, the tool listing, and tool execution. The router owns
//! everything protocol-shaped (handshake, ping, error framing).
//!
//! # Manual Implementation
//!
//! ```rust
//! use std::future::Future;
//! use serde_json::Value;
//! use servicenow_mcp_core::{McpError, McpHandler, McpResult, RequestContext, ServerInfo, Tool, ToolResult};
//!
//! #[derive(Clone)]
//! struct Hello;
//!
//! impl McpHandler for Hello {
//!     fn server_info(&self) -> ServerInfo {
//!         ServerInfo::new("hello", "1.0.0")
//!     }
//!
//!     fn list_tools(&self) -> Vec<Tool> {
//!         vec![Tool::new("hello", "Say hello")]
//!     }
//!
//!     fn call_tool<'a>(
//!         &'a self,
//!         name: &'a str,
//!         args: Value,
//!         _ctx: &'a RequestContext,
//!     ) -> impl Future<Output = McpResult<ToolResult>> + Send + 'a {
//!         async move {
//!             match name {
//!                 "hello" => {
//!                     let who = args.get("name").and_then(|v| v.as_str()).unwrap_or("World");
//!                     Ok(ToolResult::text(format!("Hello, {who}!")))
//!                 }
//!                 _ => Err(McpError::tool_not_found(name)),
//!             }
//!         }
//!     }
//! }
//! ```

use serde_json::Value;
use std::future::Future;

use crate::context::RequestContext;
use crate::error::McpResult;
use crate::types::{ServerInfo, Tool, ToolResult};

/// Interface every MCP tool server implements.
///
/// Handlers are cloned into each spawned request task, so they should be
/// cheap to clone (typically an `Arc` around shared state).
pub trait McpHandler: Clone + Send + Sync + 'static {
    /// Returns server information for the `initialize` handshake.
    fn server_info(&self) -> ServerInfo;

    /// Returns all available tools, in response to `tools/list`.
    fn list_tools(&self) -> Vec<Tool>;

    /// Calls a tool by name with the given arguments.
    ///
    /// Returning `Err` produces a JSON-RPC error frame; domain failures that
    /// the assistant should see belong in a [`ToolResult`] marked as error.
    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        args: Value,
        ctx: &'a RequestContext,
    ) -> impl Future<Output = McpResult<ToolResult>> + Send + 'a;
}
