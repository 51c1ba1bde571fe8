//! File operation configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Directories, relative to the installation root, that file operations may touch.
pub const DEFAULT_ALLOWED_ROOTS: [&str; 4] = [
    "wp-content/themes",
    "wp-content/plugins",
    "wp-content/uploads",
    "wp-content/mu-plugins",
];

/// File extensions that may be read or written.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 18] = [
    "php", "js", "css", "scss", "sass", "less", "json", "html", "htm", "xml", "txt", "md", "svg",
    "jpg", "jpeg", "png", "gif", "webp",
];

/// Largest content accepted by a single write (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10_485_760;

/// Backup directory, relative to the installation root.
pub const DEFAULT_BACKUP_DIR: &str = "wp-content/wpmcp-backups";

/// Immutable policy for file operations.
///
/// Every field has a default, so a JSON file only needs to name what it overrides:
///
/// ```json
/// { "maxFileSize": 1048576, "allowedExtensions": ["css", "js"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilesConfig {
    /// WordPress installation root (the directory holding `wp-content`).
    /// Empty until set.
    pub root: PathBuf,
    /// Allowed root-relative directory prefixes, checked in order.
    pub allowed_roots: Vec<String>,
    /// Allowed lower-case extensions, without the leading dot.
    pub allowed_extensions: Vec<String>,
    /// Largest accepted write, in bytes.
    pub max_file_size: u64,
    /// Backup directory, relative to `root`.
    pub backup_dir: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            allowed_roots: DEFAULT_ALLOWED_ROOTS.iter().map(|s| s.to_string()).collect(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            backup_dir: DEFAULT_BACKUP_DIR.into(),
        }
    }
}

impl FilesConfig {
    /// Default policy rooted at the given installation directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load overrides from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: FilesConfig = serde_json::from_str(&raw)?;
        config.normalize();
        config.check()?;
        Ok(config)
    }

    /// Fail unless an installation root has been set.
    pub fn require_root(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::InvalidParams(
                "no WordPress root: pass --root, set WPMCP_ROOT, or name `root` in the config file"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Absolute location of the backup directory.
    pub fn backup_path(&self) -> PathBuf {
        self.root.join(&self.backup_dir)
    }

    /// Trim separators from roots and dots from extensions, lower-case extensions.
    fn normalize(&mut self) {
        for root in &mut self.allowed_roots {
            *root = root.trim_matches(|c| c == '/' || c == '\\').replace('\\', "/");
        }
        for ext in &mut self.allowed_extensions {
            *ext = ext.trim_start_matches('.').to_ascii_lowercase();
        }
    }

    fn check(&self) -> Result<()> {
        if self.allowed_roots.iter().any(|r| r.is_empty()) {
            return Err(Error::InvalidParams(
                "allowed roots must not be empty strings".into(),
            ));
        }
        if self.allowed_roots.iter().any(|r| r.split('/').any(|s| s == "..")) {
            return Err(Error::InvalidParams(
                "allowed roots must not contain '..'".into(),
            ));
        }
        Ok(())
    }
}
