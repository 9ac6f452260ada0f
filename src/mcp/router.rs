//! MCP method router. Routes by JSON-RPC method, delegates tool calls to the
//! dispatcher.

use serde_json::{json, Value};

use super::protocol::{rpc_error, rpc_success, JsonRpcRequest, PROTOCOL_VERSION};
use crate::tools::Dispatcher;
use crate::types::{Error, Result, ServerConfig, RPC_INVALID_REQUEST, RPC_PARSE_ERROR};

#[derive(Debug)]
pub struct McpRouter {
    dispatcher: Dispatcher,
    server: ServerConfig,
}

impl McpRouter {
    pub fn new(dispatcher: Dispatcher, server: ServerConfig) -> Self {
        Self { dispatcher, server }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one raw message. Returns `None` when no reply is due.
    pub async fn handle_message(&self, raw: &str) -> Option<Value> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "rpc_parse_error");
                return Some(rpc_error(
                    Value::Null,
                    RPC_PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(rpc_error(
                    id,
                    RPC_INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                ))
            }
        };
        self.handle(request).await
    }

    /// Handle a parsed request. Notifications are processed but never answered.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<Value> {
        tracing::debug!(method = %request.method, "rpc_request");
        if request.method.starts_with("notifications/") {
            return None;
        }

        let notification = request.is_notification();
        let id = request.id.clone().unwrap_or(Value::Null);
        let response = match self.route(&request.method, request.params).await {
            Ok(result) => rpc_success(id, result),
            Err(err) => {
                tracing::warn!(method = %request.method, error = %err, "rpc_error");
                rpc_error(id, err.to_rpc_code(), err.to_string())
            }
        };
        (!notification).then_some(response)
    }

    async fn route(&self, method: &str, params: Option<Value>) -> Result<Value> {
        match method {
            "initialize" => Ok(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list()),
            "tools/call" => self.tools_call(params.unwrap_or(Value::Null)).await,
            _ => Err(Error::not_found(format!("Method not found: {}", method))),
        }
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": self.server.name,
                "version": self.server.version,
            },
            "instructions": self.server.instructions,
        })
    }

    fn tools_list(&self) -> Value {
        let tools: Vec<Value> = self
            .dispatcher
            .list_tools()
            .into_iter()
            .map(|def| {
                json!({
                    "name": def.name,
                    "description": def.description,
                    "inputSchema": def.input_schema(),
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn tools_call(&self, params: Value) -> Result<Value> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::validation("Missing required field: name"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let envelope = self.dispatcher.dispatch(name, arguments).await;
        // Images lead, the envelope text closes the content list.
        let mut content: Vec<Value> = envelope.images.iter().map(|i| i.to_content()).collect();
        content.push(json!({ "type": "text", "text": envelope.to_text() }));
        Ok(json!({ "content": content }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PendingAuthStore;
    use crate::client::MockApiClient;
    use crate::envelope::ImageContent;
    use crate::tools::{default_registry, ToolContext};
    use crate::types::{ToolsConfig, RPC_INVALID_PARAMS, RPC_METHOD_NOT_FOUND};
    use std::sync::Arc;
    use std::time::Duration;

    fn router(mock: MockApiClient) -> McpRouter {
        let ctx = ToolContext::new(
            Arc::new(mock),
            Arc::new(PendingAuthStore::new(Duration::from_secs(60))),
            ToolsConfig::default(),
        );
        McpRouter::new(
            Dispatcher::new(default_registry().unwrap(), ctx),
            ServerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_initialize() {
        let resp = router(MockApiClient::new())
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(resp["result"]["serverInfo"]["name"], "minutes-mcp");
        assert!(resp["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notification_has_no_reply() {
        let resp = router(MockApiClient::new())
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn test_tools_list_advertises_schemas() {
        let resp = router(MockApiClient::new())
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap();
        let tools = resp["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 29);
        let search = tools.iter().find(|t| t["name"] == "search_products").unwrap();
        assert_eq!(search["inputSchema"]["required"][0], "query");
    }

    #[tokio::test]
    async fn test_tools_call_wraps_envelope_as_text() {
        let resp = router(MockApiClient::new())
            .handle_message(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"nonexistent_tool","arguments":{}}}"#,
            )
            .await
            .unwrap();
        let content = &resp["result"]["content"][0];
        assert_eq!(content["type"], "text");
        let envelope: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
        assert_eq!(envelope["success"], false);
        assert!(envelope["message"].as_str().unwrap().contains("login_user"));
    }

    #[tokio::test]
    async fn test_tools_call_puts_images_before_text() {
        let mut mock = MockApiClient::new();
        mock.expect_get_product().returning(|_| {
            Ok(serde_json::from_value(json!({
                "_id": "p1", "name": "Amul Milk", "price": 27, "mrp": 30, "image": "/img/p1.png"
            }))
            .unwrap())
        });
        mock.expect_fetch_image()
            .returning(|_| Ok(ImageContent::new("iVBORw0=", "image/png")));

        let resp = router(mock)
            .handle_message(
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"show_product_image","arguments":{"product_id":"p1"}}}"#,
            )
            .await
            .unwrap();
        let content = resp["result"]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(
            content[0],
            json!({"type": "image", "data": "iVBORw0=", "mimeType": "image/png"})
        );
        assert_eq!(content[1]["type"], "text");
        let envelope: Value = serde_json::from_str(content[1]["text"].as_str().unwrap()).unwrap();
        assert_eq!(envelope["success"], true);
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let r = router(MockApiClient::new());

        let resp = r.handle_message("{not json").await.unwrap();
        assert_eq!(resp["error"]["code"], RPC_PARSE_ERROR);

        let resp = r
            .handle_message(r#"{"jsonrpc":"2.0","id":4,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], RPC_METHOD_NOT_FOUND);

        let resp = r
            .handle_message(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], RPC_INVALID_PARAMS);

        let resp = r.handle_message(r#"{"jsonrpc":"2.0","id":6}"#).await.unwrap();
        assert_eq!(resp["error"]["code"], RPC_INVALID_REQUEST);
        assert_eq!(resp["id"], 6);
    }
}
