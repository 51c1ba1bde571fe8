//! Tool definitions and registry for MCP server.
//!
//! Each tool is a thin mapping from JSON arguments onto one
//! [`FileOperationsService`] operation. Validation, scanning, and backups
//! all happen in the service.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::files::FileOperationsService;
use crate::protocol::{ToolCallResult, ToolDefinition};

/// Tool trait for implementing MCP tools.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult>;
}

/// Context passed to tools during execution.
pub struct ToolContext {
    /// File operations for the configured installation.
    pub files: Arc<FileOperationsService>,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(files: Arc<FileOperationsService>) -> Self {
        Self { files }
    }
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    context: Arc<ToolContext>,
}

impl ToolRegistry {
    /// Create a registry holding the seven file tools.
    pub fn new(files: Arc<FileOperationsService>) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
            context: Arc::new(ToolContext::new(files)),
        };

        registry.register(Arc::new(ReadFileTool));
        registry.register(Arc::new(ListFilesTool));
        registry.register(Arc::new(FileInfoTool));
        registry.register(Arc::new(WriteFileTool));
        registry.register(Arc::new(DeleteFileTool));
        registry.register(Arc::new(CopyFileTool));
        registry.register(Arc::new(MoveFileTool));

        registry
    }

    /// Get tool definitions, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools: Vec<_> = self.tools.values().map(|t| t.definition()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;

        tool.execute(arguments, &self.context).await
    }

    /// Register a custom tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        self.tools.insert(name, tool);
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: serde_json::Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| Error::InvalidParams(e.to_string()))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct TransferArgs {
    source: String,
    destination: String,
}

fn path_schema(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": description
            }
        },
        "required": ["path"]
    })
}

fn transfer_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "source": {
                "type": "string",
                "description": "Existing file, relative to the WordPress root"
            },
            "destination": {
                "type": "string",
                "description": "Target path, relative to the WordPress root"
            }
        },
        "required": ["source", "destination"]
    })
}

// ============================================================================
// File Tools
// ============================================================================

/// Tool for reading a file.
pub struct ReadFileTool;

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "wordpress_read_file".into(),
            description: "Read file contents from WordPress (themes, plugins, uploads, mu-plugins).".into(),
            input_schema: path_schema("File path relative to the WordPress root, e.g. wp-content/themes/mytheme/style.css"),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: PathArgs = parse_args(arguments)?;
        let result = context.files.read(&args.path).await?;

        ToolCallResult::json(&json!({
            "path": args.path,
            "content": result.content,
            "size": result.size,
            "modified": result.modified,
        }))
    }
}

/// Tool for listing a directory.
pub struct ListFilesTool;

#[derive(Debug, Deserialize)]
struct ListArgs {
    path: String,
    #[serde(default)]
    recursive: bool,
}

#[async_trait::async_trait]
impl Tool for ListFilesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "wordpress_list_files".into(),
            description: "List files in a WordPress directory.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory relative to the WordPress root, e.g. wp-content/plugins"
                    },
                    "recursive": {
                        "type": "boolean",
                        "description": "Descend into subdirectories",
                        "default": false
                    }
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: ListArgs = parse_args(arguments)?;
        let result = context.files.list(&args.path, args.recursive).await?;

        ToolCallResult::json(&json!({
            "path": args.path,
            "files": result.files,
            "count": result.count,
        }))
    }
}

/// Tool for file metadata.
pub struct FileInfoTool;

#[async_trait::async_trait]
impl Tool for FileInfoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "wordpress_file_info".into(),
            description: "Get file information (size, modified date, permissions, type).".into(),
            input_schema: path_schema("Path relative to the WordPress root"),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: PathArgs = parse_args(arguments)?;
        let info = context.files.info(&args.path).await?;

        ToolCallResult::json(&json!({
            "path": args.path,
            "size": info.size,
            "modified": info.modified,
            "permissions": info.permissions,
            "type": info.kind,
        }))
    }
}

/// Tool for creating or overwriting a file.
pub struct WriteFileTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteArgs {
    path: String,
    content: String,
    #[serde(default = "default_true")]
    create_backup: bool,
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "wordpress_write_file".into(),
            description: "Write or create a file with security validation and an automatic backup of existing content.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "File path relative to the WordPress root"
                    },
                    "content": {
                        "type": "string",
                        "description": "New file content (max 10 MiB)"
                    },
                    "createBackup": {
                        "type": "boolean",
                        "description": "Back up existing content first",
                        "default": true
                    }
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: WriteArgs = parse_args(arguments)?;
        let result = context
            .files
            .write(&args.path, &args.content, args.create_backup)
            .await?;

        ToolCallResult::json(&result)
    }
}

/// Tool for deleting a file.
pub struct DeleteFileTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteArgs {
    path: String,
    #[serde(default = "default_true")]
    create_backup: bool,
}

#[async_trait::async_trait]
impl Tool for DeleteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "wordpress_delete_file".into(),
            description: "Delete a file, backing it up first unless createBackup is false.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "File path relative to the WordPress root"
                    },
                    "createBackup": {
                        "type": "boolean",
                        "description": "Back up the file before deleting",
                        "default": true
                    }
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: DeleteArgs = parse_args(arguments)?;
        let result = context.files.delete(&args.path, args.create_backup).await?;

        ToolCallResult::json(&result)
    }
}

/// Tool for copying a file.
pub struct CopyFileTool;

#[async_trait::async_trait]
impl Tool for CopyFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "wordpress_copy_file".into(),
            description: "Copy a file to another location within WordPress.".into(),
            input_schema: transfer_schema(),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: TransferArgs = parse_args(arguments)?;
        let result = context.files.copy(&args.source, &args.destination).await?;

        ToolCallResult::json(&result)
    }
}

/// Tool for moving or renaming a file.
pub struct MoveFileTool;

#[async_trait::async_trait]
impl Tool for MoveFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "wordpress_move_file".into(),
            description: "Move or rename a file within WordPress.".into(),
            input_schema: transfer_schema(),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: TransferArgs = parse_args(arguments)?;
        let result = context.files.move_file(&args.source, &args.destination).await?;

        ToolCallResult::json(&result)
    }
}
