//! MCP server implementation.

use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{codes, Result};
use crate::files::FileOperationsService;
use crate::protocol::{
    InitializeParams, InitializeResult, JsonRpcId, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, McpMessage, PeerInfo, ServerCapabilities, ToolCallParams,
};
use crate::tools::ToolRegistry;

/// MCP protocol version.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name.
pub const SERVER_NAME: &str = "wpmcp-files";

/// Server version.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialization.
    Uninitialized,
    /// Server is initialized and ready.
    Ready,
    /// Server is shutting down.
    ShuttingDown,
}

/// MCP server exposing WordPress file operations.
pub struct McpServer {
    state: Arc<RwLock<ServerState>>,
    tools: Arc<ToolRegistry>,
}

impl McpServer {
    /// Create a server over the given file operations.
    pub fn new(files: Arc<FileOperationsService>) -> Self {
        Self::with_registry(ToolRegistry::new(files))
    }

    /// Create a server over a custom tool registry.
    pub fn with_registry(tools: ToolRegistry) -> Self {
        Self {
            state: Arc::new(RwLock::new(ServerState::Uninitialized)),
            tools: Arc::new(tools),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    /// Run the server on stdio.
    pub async fn run_stdio(&self) -> Result<()> {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        let reader = BufReader::new(stdin.lock());

        tracing::info!("MCP server starting on stdio");

        for line in reader.lines() {
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            tracing::debug!("Received: {}", line);

            if let Some(response) = self.handle_message(&line).await {
                let json = serde_json::to_string(&response)?;
                tracing::debug!("Sending: {}", json);
                writeln!(stdout, "{}", json)?;
                stdout.flush()?;
            }

            if self.state().await == ServerState::ShuttingDown {
                break;
            }
        }

        tracing::info!("MCP server shutting down");
        Ok(())
    }

    /// Handle an incoming message.
    pub async fn handle_message(&self, json: &str) -> Option<JsonRpcResponse> {
        match McpMessage::parse(json) {
            Ok(McpMessage::Request(request)) => Some(self.handle_request(request).await),
            Ok(McpMessage::Notification(notification)) => {
                self.handle_notification(notification).await;
                None
            }
            // Responses are not expected in this direction.
            Ok(McpMessage::Response(_)) => None,
            Err(e) => Some(JsonRpcResponse::error(
                None,
                codes::PARSE_ERROR,
                e.to_string(),
            )),
        }
    }

    /// Handle a JSON-RPC request.
    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params).await,
            "tools/list" => self.handle_tools_list(id).await,
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "shutdown" => {
                *self.state.write().await = ServerState::ShuttingDown;
                JsonRpcResponse::success(id, serde_json::json!({}))
            }
            _ => JsonRpcResponse::error(
                id,
                codes::METHOD_NOT_FOUND,
                format!("method not found: {}", request.method),
            ),
        }
    }

    /// Handle a notification (no response expected).
    async fn handle_notification(&self, notification: JsonRpcRequest) {
        match notification.method.as_str() {
            "notifications/initialized" => tracing::info!("Client initialized"),
            "notifications/cancelled" => tracing::debug!("Request cancelled by client"),
            "exit" => *self.state.write().await = ServerState::ShuttingDown,
            _ => tracing::debug!("Unknown notification: {}", notification.method),
        }
    }

    /// Handle initialize request.
    async fn handle_initialize(
        &self,
        id: Option<JsonRpcId>,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        let params = match params.map(serde_json::from_value::<InitializeParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    format!("invalid initialize params: {}", e),
                );
            }
            None => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    "initialize params required",
                );
            }
        };

        tracing::info!(
            "Initialized by {} {} (protocol {})",
            params.client_info.name,
            params.client_info.version,
            params.protocol_version
        );
        *self.state.write().await = ServerState::Ready;

        JsonRpcResponse::success(
            id,
            InitializeResult {
                protocol_version: PROTOCOL_VERSION.into(),
                capabilities: ServerCapabilities::default(),
                server_info: PeerInfo {
                    name: SERVER_NAME.into(),
                    version: SERVER_VERSION.into(),
                },
            },
        )
    }

    /// Handle tools/list request.
    async fn handle_tools_list(&self, id: Option<JsonRpcId>) -> JsonRpcResponse {
        if self.state().await != ServerState::Ready {
            return JsonRpcResponse::error(id, codes::INTERNAL_ERROR, "server not initialized");
        }

        JsonRpcResponse::success(
            id,
            ListToolsResult {
                tools: self.tools.list_tools(),
            },
        )
    }

    /// Handle tools/call request.
    async fn handle_tools_call(
        &self,
        id: Option<JsonRpcId>,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        if self.state().await != ServerState::Ready {
            return JsonRpcResponse::error(id, codes::INTERNAL_ERROR, "server not initialized");
        }

        let params = match params.map(serde_json::from_value::<ToolCallParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    format!("invalid tool call params: {}", e),
                );
            }
            None => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    "tool call params required",
                );
            }
        };

        match self.tools.execute(&params.name, params.arguments).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                tracing::error!("Tool {} failed: {}", params.name, e);
                JsonRpcResponse::from_error(id, &e)
            }
        }
    }
}
