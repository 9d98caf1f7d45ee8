//! JSON-RPC 2.0 frames.
//!
//! Every input line decodes into a [`JsonRpcIncoming`]; a missing `id` marks
//! a notification. The router answers with a [`JsonRpcOutgoing`], which is
//! dropped instead of written when it acknowledges a notification.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::McpError;

/// Protocol version every frame carries
pub const JSONRPC_VERSION: &str = "2.0";

/// The `error` member of a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        Self {
            code: err.jsonrpc_code(),
            message: err.message,
        }
    }
}

/// A request, or a notification when `id` is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcIncoming {
    /// Must be `"2.0"`
    pub jsonrpc: String,
    /// Request id; `None` for notifications
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Method params
    #[serde(default)]
    pub params: Option<Value>,
}

/// A response frame.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcOutgoing {
    /// Always `"2.0"`
    pub jsonrpc: String,
    /// Id of the request answered; `null` for parse errors
    pub id: Option<Value>,
    /// Success payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcOutgoing {
    /// Successful response to `id`.
    #[must_use]
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response to `id`.
    #[must_use]
    pub fn error(id: Option<Value>, error: impl Into<JsonRpcError>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Placeholder for a handled notification; never written.
    #[must_use]
    pub fn notification_ack() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            result: None,
            error: None,
        }
    }

    /// False only for notification acknowledgements. Parse errors have no
    /// id but are still sent.
    #[must_use]
    pub fn should_send(&self) -> bool {
        self.id.is_some() || self.result.is_some() || self.error.is_some()
    }

    /// Serialize as one line of JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_request_and_notification() {
        let request: JsonRpcIncoming =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": 1, "method": "ping"}"#).unwrap();
        assert_eq!(request.id, Some(serde_json::json!(1)));
        assert_eq!(request.method, "ping");
        assert!(request.params.is_none());

        let notification: JsonRpcIncoming =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#)
                .unwrap();
        assert!(notification.id.is_none());
    }

    #[test]
    fn test_incoming_requires_method() {
        assert!(serde_json::from_str::<JsonRpcIncoming>(r#"{"jsonrpc": "2.0", "id": 1}"#).is_err());
    }

    #[test]
    fn test_outgoing_notification_ack() {
        assert!(!JsonRpcOutgoing::notification_ack().should_send());
    }

    #[test]
    fn test_parse_error_has_null_id() {
        let response = JsonRpcOutgoing::error(None, McpError::parse_error("bad json"));
        let json = response.to_json().unwrap();
        assert!(json.contains("\"id\":null"));
        assert!(json.contains("-32700"));
        assert!(response.should_send());
    }

    #[test]
    fn test_error_frame_shape() {
        let response = JsonRpcOutgoing::error(
            Some(serde_json::json!("req-7")),
            McpError::tool_not_found("create_incident"),
        );
        let value: Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": "req-7",
                "error": {"code": -32001, "message": "Tool not found: create_incident"}
            })
        );
    }
}
