//! Per-request context handed to tool handlers.

use serde_json::Value;

/// Request context for a single JSON-RPC call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// JSON-RPC id rendered as a string, or a generated UUID when the
    /// message carried none
    pub request_id: String,
    /// Name of the transport that received the request
    pub transport: &'static str,
}

impl RequestContext {
    /// Create a new request context.
    pub fn new(request_id: impl Into<String>, transport: &'static str) -> Self {
        Self {
            request_id: request_id.into(),
            transport,
        }
    }

    /// Create a context for a message received over stdio.
    ///
    /// ```rust
    /// use servicenow_mcp_core::RequestContext;
    ///
    /// let ctx = RequestContext::stdio(Some(&serde_json::json!(7)));
    /// assert_eq!(ctx.request_id, "7");
    /// assert_eq!(ctx.transport, "stdio");
    /// ```
    pub fn stdio(id: Option<&Value>) -> Self {
        let request_id = match id {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        Self::new(request_id, "stdio")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_id_is_unquoted() {
        let ctx = RequestContext::stdio(Some(&Value::String("abc".into())));
        assert_eq!(ctx.request_id, "abc");
    }

    #[test]
    fn test_missing_id_generates_uuid() {
        let ctx = RequestContext::stdio(None);
        assert!(uuid::Uuid::parse_str(&ctx.request_id).is_ok());
    }
}
