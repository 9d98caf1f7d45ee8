//! # ServiceNow MCP Core
//!
//! Protocol foundation for the ServiceNow MCP server: JSON-RPC 2.0 wire
//! types, the unified [`McpError`], tool definition and result types, the
//! [`McpHandler`] trait, the request router and the newline-delimited stdio
//! transport runner.
//!
//! ## Architecture
//!
//! ```text
//! servicenow-mcp-core/
//! ├── jsonrpc     # Incoming/outgoing JSON-RPC frames
//! ├── error       # McpError + ErrorKind -> JSON-RPC code mapping
//! ├── types       # ServerInfo, Tool, ToolInputSchema, ToolResult, Content
//! ├── context     # Per-request context
//! ├── handler     # McpHandler trait (tools only)
//! ├── router      # Method dispatch and protocol negotiation
//! └── transport   # Line-based runner over any AsyncBufRead/AsyncWrite pair
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use servicenow_mcp_core::transport::run_stdio;
//! # use servicenow_mcp_core::handler::McpHandler;
//! # async fn serve<H: McpHandler>(handler: H) -> Result<(), servicenow_mcp_core::McpError> {
//! run_stdio(handler).await
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]

pub mod context;
pub mod error;
pub mod handler;
pub mod jsonrpc;
pub mod router;
pub mod transport;
pub mod types;

pub use context::RequestContext;
pub use error::{ErrorKind, McpError, McpResult};
pub use handler::McpHandler;
pub use types::{Content, ServerInfo, Tool, ToolInputSchema, ToolResult};

/// MCP protocol version advertised when the client does not ask for one
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Protocol versions this server can speak, newest first
pub const SUPPORTED_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Maximum size of a single newline-delimited message (16 MiB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Negotiate the protocol version for an `initialize` request.
///
/// A supported client version is echoed back; a missing one gets the
/// default. An unsupported version falls back to the newest supported
/// version so older and newer clients can still connect.
#[must_use]
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    match requested {
        Some(version) => SUPPORTED_VERSIONS
            .iter()
            .copied()
            .find(|supported| *supported == version)
            .unwrap_or(SUPPORTED_VERSIONS[0]),
        None => PROTOCOL_VERSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_version_is_supported() {
        assert!(SUPPORTED_VERSIONS.contains(&PROTOCOL_VERSION));
        assert_eq!(SUPPORTED_VERSIONS[0], PROTOCOL_VERSION);
    }

    #[test]
    fn test_max_message_size() {
        const _: () = assert!(MAX_MESSAGE_SIZE == 16 * 1024 * 1024);
    }

    #[test]
    fn test_negotiate_known_version() {
        assert_eq!(negotiate_protocol_version(Some("2024-11-05")), "2024-11-05");
    }

    #[test]
    fn test_negotiate_unknown_version_falls_back() {
        assert_eq!(
            negotiate_protocol_version(Some("1999-01-01")),
            PROTOCOL_VERSION
        );
        assert_eq!(negotiate_protocol_version(None), PROTOCOL_VERSION);
    }
}
