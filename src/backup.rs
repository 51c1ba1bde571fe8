//! Backups taken before destructive file operations.
//!
//! Layout of the backup directory:
//!
//! ```text
//! wp-content/wpmcp-backups/
//!   .htaccess                 "Deny from all"
//!   backup_<uuid>.bak         copied bytes
//!   backup_<uuid>.bak.meta    {"originalPath", "timestamp", "userId"}
//! ```
//!
//! Backups are write-only from here: nothing lists, restores, or prunes them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::Result;
use crate::path::ValidatedPath;

/// Access marker written into the backup directory.
pub const ACCESS_MARKER: &str = ".htaccess";

const ACCESS_MARKER_CONTENT: &str = "Deny from all\n";

/// Identifier of one backup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(String);

impl BackupId {
    fn generate() -> Self {
        Self(format!("backup_{}", uuid::Uuid::new_v4().simple()))
    }

    /// The id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sidecar metadata stored next to each backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMeta {
    /// Root-relative path of the file that was backed up.
    pub original_path: String,
    /// Local time the backup was taken, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    /// User who triggered the backup.
    pub user_id: u64,
}

/// Owner of the backup directory.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    /// Store rooted at an absolute backup directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Backup directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of a backup's copied bytes.
    pub fn backup_file(&self, id: &BackupId) -> PathBuf {
        self.dir.join(format!("{}.bak", id))
    }

    /// Location of a backup's metadata sidecar.
    pub fn meta_file(&self, id: &BackupId) -> PathBuf {
        self.dir.join(format!("{}.bak.meta", id))
    }

    /// Create the backup directory and its access marker if missing.
    pub async fn ensure_store(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let marker = self.dir.join(ACCESS_MARKER);
        if !fs::try_exists(&marker).await? {
            fs::write(&marker, ACCESS_MARKER_CONTENT).await?;
            tracing::debug!("Wrote access marker {}", marker.display());
        }
        Ok(())
    }

    /// Copy a file into the store before it is overwritten or deleted.
    ///
    /// Returns `None` when there is nothing to back up (missing path or a
    /// directory) and when the copy fails; failures are logged, never raised.
    pub async fn create_backup(&self, path: &ValidatedPath, user_id: u64) -> Option<BackupId> {
        match fs::metadata(path.absolute()).await {
            Ok(meta) if meta.is_file() => {}
            _ => return None,
        }

        if let Err(e) = self.ensure_store().await {
            tracing::warn!("Backup directory unavailable, skipping backup: {}", e);
            return None;
        }

        let id = BackupId::generate();
        let target = self.backup_file(&id);
        if let Err(e) = fs::copy(path.absolute(), &target).await {
            tracing::warn!("Failed to back up {}: {}", path.relative(), e);
            return None;
        }

        let meta = BackupMeta {
            original_path: path.relative().to_string(),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            user_id,
        };
        // The copied bytes are the backup; a missing sidecar only loses provenance.
        match serde_json::to_vec(&meta) {
            Ok(json) => {
                if let Err(e) = fs::write(self.meta_file(&id), json).await {
                    tracing::warn!("Failed to write metadata for backup {}: {}", id, e);
                }
            }
            Err(e) => tracing::warn!("Failed to encode metadata for backup {}: {}", id, e),
        }

        tracing::info!(backup = %id, path = %path.relative(), "Backup created");
        Some(id)
    }
}
