//! # wpmcp-files
//!
//! Secure file-system bridge into a WordPress installation, exposed as MCP
//! (Model Context Protocol) tools.
//!
//! A remote caller can read, list, write, copy, move, and delete files inside
//! a live WordPress installation without leaving a small set of allowed
//! directories, without writing obviously dangerous content, and with a
//! backup taken before every overwrite or delete.
//!
//! ## Available Tools
//!
//! - `wordpress_read_file` / `wordpress_list_files` / `wordpress_file_info`
//! - `wordpress_write_file` / `wordpress_delete_file`
//! - `wordpress_copy_file` / `wordpress_move_file`
//!
//! ## Security Model
//!
//! - The caller must hold both `edit_themes` and `edit_plugins`
//! - Paths must stay under `wp-content/{themes,plugins,uploads,mu-plugins}`
//! - Only a fixed set of file extensions may be touched
//! - Written content is scanned for code execution primitives (heuristic only)
//! - Overwritten and deleted files are copied to `wp-content/wpmcp-backups`
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use wpmcp_files::{CapabilityGate, FileOperationsService, FilesConfig};
//!
//! # async fn demo() -> wpmcp_files::Result<()> {
//! let files = FileOperationsService::new(
//!     FilesConfig::new("/var/www/html"),
//!     Arc::new(CapabilityGate::administrator(1)),
//! );
//! let written = files
//!     .write("wp-content/themes/mytheme/style.css", "body{}", true)
//!     .await?;
//! assert_eq!(written.bytes_written, 6);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod backup;
pub mod config;
pub mod error;
pub mod files;
pub mod path;
pub mod protocol;
pub mod scanner;
pub mod server;
pub mod tools;

pub use auth::{AuthorizationGate, CapabilityGate};
pub use backup::{BackupId, BackupMeta, BackupStore};
pub use config::FilesConfig;
pub use error::{Error, Result};
pub use files::{FileEntry, FileInfo, FileKind, FileOperationsService};
pub use path::{PathValidator, ValidatedPath};
pub use protocol::{JsonRpcRequest, JsonRpcResponse, McpMessage};
pub use scanner::{ContentScanner, ScanReport, SecurityFinding};
pub use server::McpServer;
pub use tools::{Tool, ToolRegistry};
