//! JSON-RPC request routing for [`McpHandler`].
//!
//! Supported methods:
//!
//! - `initialize` - validates `clientInfo`, negotiates the protocol version
//! - `initialized` / `notifications/initialized` - acknowledged silently
//! - `ping` - health check
//! - `tools/list` - lists available tools
//! - `tools/call` - calls a tool by name
//!
//! Anything else is answered with `-32601`. Notifications (messages without
//! an `id`) never produce a frame on the wire.

use serde_json::Value;

use crate::context::RequestContext;
use crate::error::McpError;
use crate::handler::McpHandler;
use crate::jsonrpc::{JSONRPC_VERSION, JsonRpcIncoming, JsonRpcOutgoing};
use crate::negotiate_protocol_version;

/// Parse a single line into a JSON-RPC message.
///
/// # Errors
///
/// Returns a parse error for invalid JSON and an invalid-request error for
/// JSON that is not a JSON-RPC message.
pub fn parse_request(input: &str) -> Result<JsonRpcIncoming, McpError> {
    let value: Value =
        serde_json::from_str(input).map_err(|e| McpError::parse_error(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| McpError::invalid_request(e.to_string()))
}

/// Serialize a response for the wire.
///
/// # Errors
///
/// Returns an internal error if serialization fails.
pub fn serialize_response(response: &JsonRpcOutgoing) -> Result<String, McpError> {
    response
        .to_json()
        .map_err(|e| McpError::internal(format!("Failed to serialize response: {e}")))
}

/// Route a JSON-RPC request to the appropriate handler method.
pub async fn route_request<H: McpHandler>(
    handler: &H,
    request: JsonRpcIncoming,
    ctx: &RequestContext,
) -> JsonRpcOutgoing {
    let id = request.id.clone();

    if request.jsonrpc != JSONRPC_VERSION {
        return reply_error(
            id,
            McpError::invalid_request(format!(
                "Invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{}'",
                request.jsonrpc
            )),
        );
    }

    match request.method.as_str() {
        "initialize" => {
            let params = request.params.unwrap_or_default();

            let Some(client_info) = params.get("clientInfo") else {
                return reply_error(
                    id,
                    McpError::invalid_params("Missing required field: clientInfo"),
                );
            };

            let client_name = client_info.get("name").and_then(|v| v.as_str());
            let client_version = client_info.get("version").and_then(|v| v.as_str());
            let (Some(client_name), Some(client_version)) = (client_name, client_version) else {
                return reply_error(
                    id,
                    McpError::invalid_params("clientInfo must contain 'name' and 'version' fields"),
                );
            };

            let requested = params.get("protocolVersion").and_then(|v| v.as_str());
            let negotiated = negotiate_protocol_version(requested);
            if let Some(requested) = requested
                && requested != negotiated
            {
                tracing::warn!(
                    client_version = requested,
                    negotiated_version = negotiated,
                    "Protocol version fallback: client requested unsupported version"
                );
            }

            tracing::info!(
                client_name,
                client_version,
                protocol_version = negotiated,
                "Client initialized"
            );
            JsonRpcOutgoing::success(id, build_initialize_result(handler, negotiated))
        }

        "initialized" | "notifications/initialized" => {
            if id.is_some() {
                JsonRpcOutgoing::success(id, serde_json::json!({}))
            } else {
                JsonRpcOutgoing::notification_ack()
            }
        }

        "ping" => reply(id, serde_json::json!({})),

        "tools/list" => {
            let tools = handler.list_tools();
            reply(id, serde_json::json!({ "tools": tools }))
        }

        "tools/call" => {
            let params = request.params.unwrap_or_default();
            let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
                return reply_error(id, McpError::invalid_params("Missing required field: name"));
            };
            let args = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));

            tracing::debug!(tool = name, request_id = %ctx.request_id, "Calling tool");
            match handler.call_tool(name, args, ctx).await {
                Ok(result) => match serde_json::to_value(&result) {
                    Ok(value) => reply(id, value),
                    Err(e) => reply_error(id, McpError::from(e)),
                },
                Err(err) => {
                    tracing::debug!(tool = name, error = %err, "Tool call failed");
                    reply_error(id, err)
                }
            }
        }

        method => reply_error(id, McpError::method_not_found(method)),
    }
}

/// Success reply, suppressed for notifications.
fn reply(id: Option<Value>, result: Value) -> JsonRpcOutgoing {
    if id.is_some() {
        JsonRpcOutgoing::success(id, result)
    } else {
        JsonRpcOutgoing::notification_ack()
    }
}

/// Error reply, suppressed for notifications.
fn reply_error(id: Option<Value>, error: McpError) -> JsonRpcOutgoing {
    if id.is_some() {
        JsonRpcOutgoing::error(id, error)
    } else {
        tracing::debug!(error = %error, "Dropping error for notification");
        JsonRpcOutgoing::notification_ack()
    }
}

/// Build the initialize result with server info and capabilities.
fn build_initialize_result<H: McpHandler>(handler: &H, protocol_version: &str) -> Value {
    let info = handler.server_info();

    let mut capabilities = serde_json::Map::new();
    if !handler.list_tools().is_empty() {
        capabilities.insert(
            "tools".to_string(),
            serde_json::json!({ "listChanged": false }),
        );
    }

    serde_json::json!({
        "protocolVersion": protocol_version,
        "capabilities": capabilities,
        "serverInfo": info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::McpResult;
    use crate::types::{ServerInfo, Tool, ToolResult};
    use pretty_assertions::assert_eq;

    #[derive(Clone)]
    struct TestHandler;

    impl McpHandler for TestHandler {
        fn server_info(&self) -> ServerInfo {
            ServerInfo::new("test", "1.0.0")
        }

        fn list_tools(&self) -> Vec<Tool> {
            vec![Tool::new("test_tool", "A test tool")]
        }

        fn call_tool<'a>(
            &'a self,
            name: &'a str,
            _args: Value,
            _ctx: &'a RequestContext,
        ) -> impl std::future::Future<Output = McpResult<ToolResult>> + Send + 'a {
            async move {
                if name == "test_tool" {
                    Ok(ToolResult::text("Tool executed"))
                } else {
                    Err(McpError::tool_not_found(name))
                }
            }
        }
    }

    fn request(id: Option<Value>, method: &str, params: Option<Value>) -> JsonRpcIncoming {
        JsonRpcIncoming {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_parse_request() {
        let request = parse_request(r#"{"jsonrpc": "2.0", "id": 1, "method": "ping"}"#).unwrap();
        assert_eq!(request.method, "ping");
        assert_eq!(request.id, Some(serde_json::json!(1)));
    }

    #[test]
    fn test_parse_request_errors() {
        assert_eq!(parse_request("{not json").unwrap_err().jsonrpc_code(), -32700);
        assert_eq!(
            parse_request(r#"{"jsonrpc": "2.0", "id": 1}"#)
                .unwrap_err()
                .jsonrpc_code(),
            -32600
        );
    }

    #[tokio::test]
    async fn test_route_initialize() {
        let ctx = RequestContext::stdio(None);
        let response = route_request(
            &TestHandler,
            request(
                Some(serde_json::json!(1)),
                "initialize",
                Some(serde_json::json!({
                    "protocolVersion": "2024-11-05",
                    "clientInfo": {"name": "test-client", "version": "1.0.0"},
                    "capabilities": {}
                })),
            ),
            &ctx,
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "test");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_route_initialize_requires_client_info() {
        let ctx = RequestContext::stdio(None);
        let response = route_request(
            &TestHandler,
            request(
                Some(serde_json::json!(1)),
                "initialize",
                Some(serde_json::json!({"clientInfo": {"name": "only-name"}})),
            ),
            &ctx,
        )
        .await;

        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_route_initialized_notification_is_silent() {
        let ctx = RequestContext::stdio(None);
        let response = route_request(
            &TestHandler,
            request(None, "notifications/initialized", None),
            &ctx,
        )
        .await;
        assert!(!response.should_send());
    }

    #[tokio::test]
    async fn test_route_tools_list() {
        let ctx = RequestContext::stdio(None);
        let response = route_request(
            &TestHandler,
            request(Some(serde_json::json!(2)), "tools/list", None),
            &ctx,
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(result["tools"][0]["name"], "test_tool");
    }

    #[tokio::test]
    async fn test_route_tools_call() {
        let ctx = RequestContext::stdio(None);
        let response = route_request(
            &TestHandler,
            request(
                Some(serde_json::json!(3)),
                "tools/call",
                Some(serde_json::json!({"name": "test_tool", "arguments": {}})),
            ),
            &ctx,
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["text"], "Tool executed");
    }

    #[tokio::test]
    async fn test_route_unknown_tool() {
        let ctx = RequestContext::stdio(None);
        let response = route_request(
            &TestHandler,
            request(
                Some(serde_json::json!(4)),
                "tools/call",
                Some(serde_json::json!({"name": "nope"})),
            ),
            &ctx,
        )
        .await;

        assert_eq!(response.error.unwrap().code, -32001);
    }

    #[tokio::test]
    async fn test_route_unknown_method() {
        let ctx = RequestContext::stdio(None);
        let response = route_request(
            &TestHandler,
            request(Some(serde_json::json!(5)), "resources/list", None),
            &ctx,
        )
        .await;

        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found: resources/list");
    }

    #[tokio::test]
    async fn test_route_wrong_jsonrpc_version() {
        let ctx = RequestContext::stdio(None);
        let mut req = request(Some(serde_json::json!(6)), "ping", None);
        req.jsonrpc = "1.0".to_string();
        let response = route_request(&TestHandler, req, &ctx).await;
        assert_eq!(response.error.unwrap().code, -32600);
    }
}
