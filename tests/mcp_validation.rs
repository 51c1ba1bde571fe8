//! MCP server validation tests.
//!
//! Tests JSON-RPC 2.0 protocol compliance, tool execution, and error handling
//! by feeding raw message lines to an in-process server.

use std::sync::Arc;

use serde_json::{json, Value};

use wpmcp_files::server::ServerState;
use wpmcp_files::{CapabilityGate, FileOperationsService, FilesConfig, McpServer};

/// MCP test client driving an in-process server.
struct McpTestClient {
    server: McpServer,
    next_id: u64,
    root: tempfile::TempDir,
}

impl McpTestClient {
    fn spawn() -> Self {
        Self::spawn_with(CapabilityGate::administrator(1))
    }

    fn spawn_with(gate: CapabilityGate) -> Self {
        let root = tempfile::tempdir().unwrap();
        let files = FileOperationsService::new(FilesConfig::new(root.path()), Arc::new(gate));
        Self {
            server: McpServer::new(Arc::new(files)),
            next_id: 1,
            root,
        }
    }

    async fn send_request(&mut self, method: &str, params: Option<Value>) -> Value {
        let id = self.next_id;
        self.next_id += 1;

        let mut request = json!({"jsonrpc": "2.0", "id": id, "method": method});
        if let Some(params) = params {
            request["params"] = params;
        }

        let response = self
            .server
            .handle_message(&request.to_string())
            .await
            .expect("requests always get a response");
        let response = serde_json::to_value(response).unwrap();
        assert_eq!(response["jsonrpc"], "2.0");
        assert_eq!(response["id"], id);
        response
    }

    async fn initialize(&mut self) {
        let response = self
            .send_request(
                "initialize",
                Some(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "0.1.0"}
                })),
            )
            .await;
        assert!(response.get("error").is_none());
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Value {
        self.send_request("tools/call", Some(json!({"name": name, "arguments": arguments})))
            .await
    }
}

/// Parse the JSON text payload of a successful tool call.
fn tool_payload(response: &Value) -> Value {
    assert!(response.get("error").is_none(), "unexpected error: {response}");
    let result = &response["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["content"][0]["type"], "text");
    serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap()
}

// ============================================================================
// Protocol Compliance Tests
// ============================================================================

#[tokio::test]
async fn test_initialize_handshake() {
    let mut client = McpTestClient::spawn();

    let response = client
        .send_request(
            "initialize",
            Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "0.1.0"}
            })),
        )
        .await;

    let result = &response["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "wpmcp-files");
    assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
    assert_eq!(client.server.state().await, ServerState::Ready);
}

#[tokio::test]
async fn test_initialize_requires_params() {
    let mut client = McpTestClient::spawn();
    let response = client.send_request("initialize", None).await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn test_list_tools() {
    let mut client = McpTestClient::spawn();
    client.initialize().await;

    let response = client.send_request("tools/list", None).await;
    let tools = response["result"]["tools"].as_array().unwrap();

    assert_eq!(tools.len(), 7);
    for tool in tools {
        assert!(tool["name"].as_str().unwrap().starts_with("wordpress_"));
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
    let write = tools
        .iter()
        .find(|t| t["name"] == "wordpress_write_file")
        .unwrap();
    assert_eq!(write["inputSchema"]["required"], json!(["path", "content"]));
}

#[tokio::test]
async fn test_tools_require_initialization() {
    let mut client = McpTestClient::spawn();
    let response = client.send_request("tools/list", None).await;
    assert_eq!(response["error"]["code"], -32603);
}

#[tokio::test]
async fn test_ping() {
    let mut client = McpTestClient::spawn();
    let response = client.send_request("ping", None).await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_unknown_method() {
    let mut client = McpTestClient::spawn();
    let response = client.send_request("resources/list", None).await;
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_parse_error() {
    let client = McpTestClient::spawn();
    let response = client.server.handle_message("{not json").await.unwrap();
    let response = serde_json::to_value(response).unwrap();
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let client = McpTestClient::spawn();
    let line = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
    assert!(client.server.handle_message(line).await.is_none());
}

#[tokio::test]
async fn test_shutdown() {
    let mut client = McpTestClient::spawn();
    client.send_request("shutdown", None).await;
    assert_eq!(client.server.state().await, ServerState::ShuttingDown);
}

// ============================================================================
// Tool Execution Tests
// ============================================================================

#[tokio::test]
async fn test_write_read_delete_cycle() {
    let mut client = McpTestClient::spawn();
    client.initialize().await;

    let written = tool_payload(
        &client
            .call_tool(
                "wordpress_write_file",
                json!({"path": "wp-content/themes/x/style.css", "content": "body{}"}),
            )
            .await,
    );
    assert_eq!(written, json!({"success": true, "backup": null, "bytesWritten": 6}));

    let read = tool_payload(
        &client
            .call_tool("wordpress_read_file", json!({"path": "wp-content/themes/x/style.css"}))
            .await,
    );
    assert_eq!(read["content"], "body{}");
    assert_eq!(read["size"], 6);

    let listed = tool_payload(
        &client
            .call_tool("wordpress_list_files", json!({"path": "wp-content/themes/x"}))
            .await,
    );
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["files"][0]["type"], "file");

    let deleted = tool_payload(
        &client
            .call_tool("wordpress_delete_file", json!({"path": "wp-content/themes/x/style.css"}))
            .await,
    );
    assert_eq!(deleted["success"], true);
    assert!(deleted["backup"].as_str().unwrap().starts_with("backup_"));
    assert!(client
        .root
        .path()
        .join("wp-content/wpmcp-backups/.htaccess")
        .exists());
}

#[tokio::test]
async fn test_copy_move_and_info() {
    let mut client = McpTestClient::spawn();
    client.initialize().await;
    std::fs::create_dir_all(client.root.path().join("wp-content/uploads")).unwrap();
    std::fs::write(client.root.path().join("wp-content/uploads/a.txt"), "abc").unwrap();

    let copied = tool_payload(
        &client
            .call_tool(
                "wordpress_copy_file",
                json!({"source": "wp-content/uploads/a.txt", "destination": "wp-content/uploads/b.txt"}),
            )
            .await,
    );
    assert_eq!(copied, json!({"success": true}));

    let moved = tool_payload(
        &client
            .call_tool(
                "wordpress_move_file",
                json!({"source": "wp-content/uploads/b.txt", "destination": "wp-content/uploads/c.txt"}),
            )
            .await,
    );
    assert_eq!(moved, json!({"success": true}));

    let info = tool_payload(
        &client
            .call_tool("wordpress_file_info", json!({"path": "wp-content/uploads/c.txt"}))
            .await,
    );
    assert_eq!(info["size"], 3);
    assert_eq!(info["type"], "file");
    assert_eq!(info["permissions"].as_str().unwrap().len(), 4);
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[tokio::test]
async fn test_traversal_reported_as_invalid_path() {
    let mut client = McpTestClient::spawn();
    client.initialize().await;

    let response = client
        .call_tool(
            "wordpress_write_file",
            json!({"path": "wp-content/themes/../../../etc/passwd", "content": "x"}),
        )
        .await;

    assert_eq!(response["error"]["code"], -32001);
    assert_eq!(response["error"]["data"]["kind"], "invalid_path");
}

#[tokio::test]
async fn test_rejected_content_reported() {
    let mut client = McpTestClient::spawn();
    client.initialize().await;

    let response = client
        .call_tool(
            "wordpress_write_file",
            json!({"path": "wp-content/plugins/p/p.php", "content": "<?php system('id');"}),
        )
        .await;

    assert_eq!(response["error"]["data"]["kind"], "content_rejected");
    assert!(!client.root.path().join("wp-content/plugins/p/p.php").exists());
}

#[tokio::test]
async fn test_unauthorized_caller() {
    let mut client = McpTestClient::spawn_with(CapabilityGate::new(3, ["edit_posts"]));
    client.initialize().await;

    let response = client
        .call_tool("wordpress_read_file", json!({"path": "wp-content/themes/x/style.css"}))
        .await;

    assert_eq!(response["error"]["code"], -32000);
    assert_eq!(response["error"]["data"]["kind"], "unauthorized");
}

#[tokio::test]
async fn test_missing_file_and_bad_arguments() {
    let mut client = McpTestClient::spawn();
    client.initialize().await;

    let missing = client
        .call_tool("wordpress_read_file", json!({"path": "wp-content/themes/none.css"}))
        .await;
    assert_eq!(missing["error"]["data"]["kind"], "file_not_found");

    let bad = client
        .call_tool("wordpress_list_files", json!({"recursive": true}))
        .await;
    assert_eq!(bad["error"]["code"], -32602);

    let unknown = client.call_tool("wordpress_chmod", json!({})).await;
    assert_eq!(unknown["error"]["code"], -32601);
}
