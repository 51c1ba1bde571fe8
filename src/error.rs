//! Error types for file operations and the MCP server.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// File operation and MCP server errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Tool not found.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Invalid parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Caller lacks the capability to manage files.
    #[error("permission denied: caller may not manage theme and plugin files")]
    Unauthorized,

    /// Path resolves outside every allowed root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Recognized but disallowed file extension.
    #[error("file extension not allowed: {0}")]
    InvalidExtension(String),

    /// Target does not exist.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Target exists but is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(String),

    /// Target exists but cannot be read as a text file.
    #[error("file is not readable: {0}")]
    NotReadable(String),

    /// Write content exceeds the size ceiling.
    #[error("file size ({size} bytes) exceeds limit ({limit} bytes)")]
    FileTooLarge {
        /// Size of the rejected content.
        size: u64,
        /// Configured ceiling.
        limit: u64,
    },

    /// Content scan or syntax check rejected the content.
    #[error("content rejected: {0}")]
    ContentRejected(String),

    /// Underlying filesystem call failed.
    #[error("failed to {op} {path}: {source}")]
    StorageFailure {
        /// Operation that failed (read, write, delete, copy, move).
        op: &'static str,
        /// Root-relative path involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::StorageFailure`].
    pub fn storage(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        Error::StorageFailure {
            op,
            path: path.into(),
            source,
        }
    }

    /// Get the JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::ToolNotFound(_) => -32601,  // Method not found
            Error::InvalidParams(_) => -32602, // Invalid params
            Error::Unauthorized => -32000,     // Server error
            Error::InvalidPath(_) | Error::InvalidExtension(_) => -32001,
            Error::NotFound(_) | Error::NotADirectory(_) | Error::NotReadable(_) => -32002,
            Error::FileTooLarge { .. } | Error::ContentRejected(_) => -32003,
            Error::StorageFailure { .. } | Error::Io(_) => -32004,
            Error::Serialization(_) => -32700, // Parse error
        }
    }

    /// Stable snake_case identifier for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ToolNotFound(_) => "tool_not_found",
            Error::InvalidParams(_) => "invalid_params",
            Error::Unauthorized => "unauthorized",
            Error::InvalidPath(_) => "invalid_path",
            Error::InvalidExtension(_) => "invalid_extension",
            Error::NotFound(_) => "file_not_found",
            Error::NotADirectory(_) => "not_directory",
            Error::NotReadable(_) => "file_not_readable",
            Error::FileTooLarge { .. } => "file_too_large",
            Error::ContentRejected(_) => "content_rejected",
            Error::StorageFailure { .. } => "storage_failure",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }
}

/// Standard JSON-RPC error codes.
pub mod codes {
    /// Parse error.
    pub const PARSE_ERROR: i32 = -32700;
    /// Method not found.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i32 = -32603;
}
