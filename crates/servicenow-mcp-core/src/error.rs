//! Protocol-level errors.
//!
//! Tool handlers report domain failures inside a [`ToolResult`]; an
//! [`McpError`] is reserved for problems the client has to see as a JSON-RPC
//! error frame. Its [`ErrorKind`] picks the code.
//!
//! ```rust
//! use servicenow_mcp_core::error::{ErrorKind, McpError, McpResult};
//!
//! fn lookup(name: &str) -> McpResult<String> {
//!     Err(McpError::tool_not_found(name))
//! }
//!
//! let err = lookup("create_incident").unwrap_err();
//! assert_eq!(err.kind, ErrorKind::ToolNotFound);
//! assert_eq!(err.jsonrpc_code(), -32001);
//! ```
//!
//! [`ToolResult`]: crate::types::ToolResult

use std::fmt;

/// Result alias used across the protocol layer
pub type McpResult<T> = Result<T, McpError>;

/// An error answered with a JSON-RPC error frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpError {
    /// Which JSON-RPC code to send
    pub kind: ErrorKind,
    /// Message sent to the client
    pub message: String,
}

/// Error classes the router and tool dispatch produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Line is not JSON (-32700)
    ParseError,
    /// JSON, but not a valid request (-32600)
    InvalidRequest,
    /// Unknown method (-32601)
    MethodNotFound,
    /// Arguments do not decode (-32602)
    InvalidParams,
    /// Server-side failure (-32603)
    Internal,
    /// Unknown tool name (MCP -32001)
    ToolNotFound,
}

impl McpError {
    /// Error of `kind` with `message`.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Arguments or params that do not decode
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    /// Failure on our side (IO, serialization)
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Input line is not JSON
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message)
    }

    /// JSON that is not a JSON-RPC request
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Method the router does not serve
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorKind::MethodNotFound,
            format!("Method not found: {method}"),
        )
    }

    /// Tool name the handler does not know
    #[must_use]
    pub fn tool_not_found(tool: &str) -> Self {
        Self::new(ErrorKind::ToolNotFound, format!("Tool not found: {tool}"))
    }

    /// JSON-RPC error code for this error.
    #[must_use]
    pub fn jsonrpc_code(&self) -> i32 {
        match self.kind {
            ErrorKind::ParseError => -32700,
            ErrorKind::InvalidRequest => -32600,
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::InvalidParams => -32602,
            ErrorKind::Internal => -32603,
            ErrorKind::ToolNotFound => -32001,
        }
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for McpError {}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("Serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonrpc_codes() {
        let cases = [
            (McpError::parse_error("x"), -32700),
            (McpError::invalid_request("x"), -32600),
            (McpError::method_not_found("x"), -32601),
            (McpError::invalid_params("x"), -32602),
            (McpError::internal("x"), -32603),
            (McpError::tool_not_found("x"), -32001),
        ];
        for (err, code) in cases {
            assert_eq!(err.jsonrpc_code(), code, "{err:?}");
        }
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            McpError::method_not_found("resources/list").to_string(),
            "Method not found: resources/list"
        );
        assert_eq!(
            McpError::tool_not_found("create_incident").message,
            "Tool not found: create_incident"
        );
    }

    #[test]
    fn test_serde_failure_is_internal() {
        let err: McpError = serde_json::from_str::<u8>("\"x\"").unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.message.starts_with("Serialization error"));
    }
}
