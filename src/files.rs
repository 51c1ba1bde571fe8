//! Path-validated, backup-protected file operations.
//!
//! Every operation runs the same pipeline:
//!
//! 1. ask the [`AuthorizationGate`],
//! 2. validate every path argument,
//! 3. run operation-specific checks (size limit, content scan),
//! 4. take a backup before overwriting or deleting,
//! 5. touch the filesystem.
//!
//! Steps 1 to 3 finish before anything on disk changes, so a rejected call
//! never leaves a partial mutation behind. Backups are best-effort: a failed
//! backup yields a `None` id and the operation continues.
//!
//! Operations on the same absolute path are serialized within one
//! [`FileOperationsService`]. Other processes writing the same files are not
//! coordinated with.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use serde::Serialize;
use tokio::fs;
use tokio::sync::OwnedMutexGuard;
use walkdir::WalkDir;

use crate::auth::AuthorizationGate;
use crate::backup::{BackupId, BackupStore};
use crate::config::FilesConfig;
use crate::error::{Error, Result};
use crate::path::{PathValidator, ValidatedPath};
use crate::scanner::{check_php, ContentScanner};

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Regular file (or anything that is not a directory).
    File,
    /// Directory.
    Directory,
}

impl FileKind {
    fn of(meta: &std::fs::Metadata) -> Self {
        if meta.is_dir() {
            FileKind::Directory
        } else {
            FileKind::File
        }
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Path relative to the installation root.
    pub path: String,
    /// File name.
    pub name: String,
    /// File or directory.
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// Size in bytes, 0 for directories.
    pub size: u64,
    /// Modification time.
    pub modified: String,
}

/// Result of [`FileOperationsService::read`].
#[derive(Debug, Clone, Serialize)]
pub struct ReadResult {
    /// File content.
    pub content: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification time.
    pub modified: String,
}

/// Result of [`FileOperationsService::list`].
#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    /// Entries, sorted by path.
    pub files: Vec<FileEntry>,
    /// Number of entries.
    pub count: usize,
}

/// Result of [`FileOperationsService::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// Size in bytes.
    pub size: u64,
    /// Modification time.
    pub modified: String,
    /// Permission bits as four octal digits, e.g. `0644`.
    pub permissions: String,
    /// File or directory.
    #[serde(rename = "type")]
    pub kind: FileKind,
}

/// Result of [`FileOperationsService::write`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    /// Always true on success.
    pub success: bool,
    /// Backup of the previous content, if one was taken.
    pub backup: Option<BackupId>,
    /// Bytes written.
    pub bytes_written: u64,
}

/// Result of [`FileOperationsService::delete`].
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    /// Always true on success.
    pub success: bool,
    /// Backup of the deleted content, if one was taken.
    pub backup: Option<BackupId>,
}

/// Result of [`FileOperationsService::copy`] and [`FileOperationsService::move_file`].
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    /// Always true on success.
    pub success: bool,
}

/// Per-path async locks.
#[derive(Debug, Default)]
struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl PathLocks {
    async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds any more.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(path.to_path_buf()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Lock two paths in a fixed order.
    async fn lock_pair(&self, a: &Path, b: &Path) -> Vec<OwnedMutexGuard<()>> {
        if a == b {
            return vec![self.lock(a).await];
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first = self.lock(first).await;
        let second = self.lock(second).await;
        vec![first, second]
    }
}

/// File operations confined to the allowed roots of one installation.
pub struct FileOperationsService {
    config: FilesConfig,
    validator: PathValidator,
    scanner: ContentScanner,
    backups: BackupStore,
    gate: Arc<dyn AuthorizationGate>,
    locks: PathLocks,
}

impl FileOperationsService {
    /// Create a service for the given policy and authorization gate.
    pub fn new(config: FilesConfig, gate: Arc<dyn AuthorizationGate>) -> Self {
        Self {
            validator: PathValidator::new(&config),
            scanner: ContentScanner::new(),
            backups: BackupStore::new(config.backup_path()),
            gate,
            locks: PathLocks::default(),
            config,
        }
    }

    /// Active policy.
    pub fn config(&self) -> &FilesConfig {
        &self.config
    }

    /// Backup store used for destructive operations.
    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    fn authorize(&self) -> Result<()> {
        if self.gate.can_manage_files() {
            Ok(())
        } else {
            tracing::warn!(user = self.gate.user_id(), "File operation refused");
            Err(Error::Unauthorized)
        }
    }

    /// Read a text file.
    pub async fn read(&self, path: &str) -> Result<ReadResult> {
        self.authorize()?;
        let path = self.validator.validate(path)?;
        let _guard = self.locks.lock(path.absolute()).await;

        let meta = metadata(&path).await?;
        if meta.is_dir() {
            return Err(Error::NotReadable(path.relative().to_string()));
        }

        let bytes = fs::read(path.absolute()).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => Error::NotReadable(path.relative().to_string()),
            _ => Error::storage("read", path.relative(), e),
        })?;
        let content = String::from_utf8(bytes).map_err(|_| {
            Error::NotReadable(format!("{} (binary content)", path.relative()))
        })?;

        tracing::debug!("Read {} ({} bytes)", path.relative(), content.len());
        Ok(ReadResult {
            size: meta.len(),
            modified: format_time(meta.modified().ok()),
            content,
        })
    }

    /// List a directory, optionally descending into subdirectories.
    ///
    /// A symlink is reported as whatever it points at, but a symlinked
    /// directory is never descended into.
    pub async fn list(&self, path: &str, recursive: bool) -> Result<ListResult> {
        self.authorize()?;
        let path = self.validator.validate_dir(path)?;

        match fs::metadata(path.absolute()).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(Error::NotADirectory(path.relative().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotADirectory(path.relative().to_string()));
            }
            Err(e) => return Err(Error::storage("stat", path.relative(), e)),
        }

        let root = self.config.root.clone();
        let dir = path.absolute().to_path_buf();
        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files = tokio::task::spawn_blocking(move || walk(&root, &dir, max_depth))
            .await
            .map_err(|e| {
                Error::storage(
                    "list",
                    path.relative(),
                    std::io::Error::new(std::io::ErrorKind::Other, e),
                )
            })?
            .map_err(|e| Error::storage("list", path.relative(), e))?;

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!("Listed {} entries in {}", files.len(), path.relative());
        Ok(ListResult {
            count: files.len(),
            files,
        })
    }

    /// Size, modification time, permissions, and kind of a path.
    pub async fn info(&self, path: &str) -> Result<FileInfo> {
        self.authorize()?;
        let path = self.validator.validate(path)?;
        let meta = metadata(&path).await?;

        Ok(FileInfo {
            size: meta.len(),
            modified: format_time(meta.modified().ok()),
            permissions: permission_bits(&meta),
            kind: FileKind::of(&meta),
        })
    }

    /// Create or overwrite a file.
    ///
    /// Existing content is backed up first when `create_backup` is set.
    /// Missing parent directories are created.
    pub async fn write(
        &self,
        path: &str,
        content: &str,
        create_backup: bool,
    ) -> Result<WriteResult> {
        self.authorize()?;
        let path = self.validator.validate(path)?;

        let size = content.len() as u64;
        if size > self.config.max_file_size {
            return Err(Error::FileTooLarge {
                size,
                limit: self.config.max_file_size,
            });
        }

        if path.extension().as_deref() == Some("php") {
            check_php(content)?;
        }

        let report = self.scanner.scan(content);
        if !report.safe {
            tracing::warn!(path = %path.relative(), findings = %report.summary(), "Content rejected");
            return Err(Error::ContentRejected(format!(
                "security scan failed: {}",
                report.summary()
            )));
        }

        let _guard = self.locks.lock(path.absolute()).await;

        let backup = if create_backup {
            self.backups.create_backup(&path, self.gate.user_id()).await
        } else {
            None
        };

        ensure_parent(&path).await?;
        fs::write(path.absolute(), content)
            .await
            .map_err(|e| Error::storage("write", path.relative(), e))?;

        tracing::info!(
            path = %path.relative(),
            requested = %path.raw(),
            bytes = size,
            backup = ?backup,
            "File written"
        );
        Ok(WriteResult {
            success: true,
            backup,
            bytes_written: size,
        })
    }

    /// Delete a file or an empty directory.
    pub async fn delete(&self, path: &str, create_backup: bool) -> Result<DeleteResult> {
        self.authorize()?;
        let path = self.validator.validate(path)?;
        let _guard = self.locks.lock(path.absolute()).await;

        let meta = metadata(&path).await?;

        let backup = if create_backup {
            self.backups.create_backup(&path, self.gate.user_id()).await
        } else {
            None
        };

        let removed = if meta.is_dir() {
            fs::remove_dir(path.absolute()).await
        } else {
            fs::remove_file(path.absolute()).await
        };
        removed.map_err(|e| Error::storage("delete", path.relative(), e))?;

        tracing::info!(path = %path.relative(), backup = ?backup, "File deleted");
        Ok(DeleteResult {
            success: true,
            backup,
        })
    }

    /// Copy a file. An existing destination is overwritten.
    pub async fn copy(&self, source: &str, destination: &str) -> Result<TransferResult> {
        self.authorize()?;
        let source = self.validator.validate(source)?;
        let destination = self.validator.validate(destination)?;
        let _guards = self
            .locks
            .lock_pair(source.absolute(), destination.absolute())
            .await;

        metadata(&source).await?;
        // Copying onto the source would truncate it before reading.
        if same_file(source.absolute(), destination.absolute()).await {
            return Err(Error::InvalidParams(format!(
                "source and destination are the same file: {}",
                source.relative()
            )));
        }
        ensure_parent(&destination).await?;
        fs::copy(source.absolute(), destination.absolute())
            .await
            .map_err(|e| Error::storage("copy", source.relative(), e))?;

        tracing::info!("Copied {} to {}", source.relative(), destination.relative());
        Ok(TransferResult { success: true })
    }

    /// Move or rename a file. An existing destination is replaced.
    pub async fn move_file(&self, source: &str, destination: &str) -> Result<TransferResult> {
        self.authorize()?;
        let source = self.validator.validate(source)?;
        let destination = self.validator.validate(destination)?;
        let _guards = self
            .locks
            .lock_pair(source.absolute(), destination.absolute())
            .await;

        metadata(&source).await?;
        ensure_parent(&destination).await?;
        fs::rename(source.absolute(), destination.absolute())
            .await
            .map_err(|e| Error::storage("move", source.relative(), e))?;

        tracing::info!("Moved {} to {}", source.relative(), destination.relative());
        Ok(TransferResult { success: true })
    }

}

/// Entries below `dir`, down to `max_depth`, without following symlinks.
fn walk(root: &Path, dir: &Path, max_depth: usize) -> std::io::Result<Vec<FileEntry>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth) {
        let entry = entry?;
        // Symlinks report their target; dangling ones fall back to the link.
        let meta = match std::fs::metadata(entry.path())
            .or_else(|_| entry.metadata().map_err(std::io::Error::from))
        {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let kind = FileKind::of(&meta);
        files.push(FileEntry {
            path: relative_to(root, entry.path()),
            name: entry.file_name().to_string_lossy().into_owned(),
            kind,
            size: if kind == FileKind::File { meta.len() } else { 0 },
            modified: format_time(meta.modified().ok()),
        });
    }
    Ok(files)
}

fn relative_to(root: &Path, absolute: &Path) -> String {
    let relative = absolute.strip_prefix(root).unwrap_or(absolute);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// True when both paths name one file, including hard links.
async fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::metadata(a).await, fs::metadata(b).await) {
        (Ok(a), Ok(b)) => same_inode(&a, &b),
        _ => false,
    }
}

#[cfg(unix)]
fn same_inode(a: &std::fs::Metadata, b: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_inode(_a: &std::fs::Metadata, _b: &std::fs::Metadata) -> bool {
    false
}

/// Metadata of an existing path, `NotFound` otherwise.
async fn metadata(path: &ValidatedPath) -> Result<std::fs::Metadata> {
    fs::metadata(path.absolute()).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.relative().to_string()),
        _ => Error::storage("stat", path.relative(), e),
    })
}

async fn ensure_parent(path: &ValidatedPath) -> Result<()> {
    if let Some(parent) = path.absolute().parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::storage("create directory for", path.relative(), e))?;
    }
    Ok(())
}

fn format_time(time: Option<SystemTime>) -> String {
    match time {
        Some(time) => chrono::DateTime::<chrono::Local>::from(time)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => String::new(),
    }
}

#[cfg(unix)]
fn permission_bits(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:04o}", meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn permission_bits(meta: &std::fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "0444".into()
    } else {
        "0644".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CapabilityGate;

    fn service(root: &Path) -> FileOperationsService {
        FileOperationsService::new(
            FilesConfig::new(root),
            Arc::new(CapabilityGate::administrator(1)),
        )
    }

    #[tokio::test]
    async fn test_path_locks_pruned() {
        let locks = PathLocks::default();
        {
            let _a = locks.lock(Path::new("/a")).await;
            let _b = locks.lock_pair(Path::new("/c"), Path::new("/b")).await;
        }
        let _d = locks.lock(Path::new("/d")).await;
        let held = locks.locks.lock().unwrap();
        assert_eq!(held.len(), 1);
        assert!(held.contains_key(Path::new("/d")));
    }

    #[tokio::test]
    async fn test_lock_pair_same_path() {
        let locks = PathLocks::default();
        let guards = locks.lock_pair(Path::new("/a"), Path::new("/a")).await;
        assert_eq!(guards.len(), 1);
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let files = service(dir.path());

        files
            .write("wp-content/themes/new/parts/header.html", "<header></header>", true)
            .await
            .unwrap();
        assert!(dir.path().join("wp-content/themes/new/parts").is_dir());
    }

    #[tokio::test]
    async fn test_read_directory_not_readable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("wp-content/themes/x")).unwrap();
        let files = service(dir.path());

        assert!(matches!(
            files.read("wp-content/themes/x").await,
            Err(Error::NotReadable(_))
        ));
    }

    #[tokio::test]
    async fn test_read_binary_not_readable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("wp-content/uploads")).unwrap();
        std::fs::write(dir.path().join("wp-content/uploads/a.png"), [0x89, 0x50, 0xff, 0xfe]).unwrap();
        let files = service(dir.path());

        assert!(matches!(
            files.read("wp-content/uploads/a.png").await,
            Err(Error::NotReadable(_))
        ));
    }

    #[tokio::test]
    async fn test_php_brace_check_only_for_php_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = service(dir.path());

        assert!(matches!(
            files.write("wp-content/plugins/p/p.php", "<?php if (1) {", true).await,
            Err(Error::ContentRejected(_))
        ));
        assert!(files
            .write("wp-content/plugins/p/notes.txt", "<?php if (1) {", true)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_delete_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("wp-content/uploads/empty")).unwrap();
        let files = service(dir.path());

        let result = files.delete("wp-content/uploads/empty", true).await.unwrap();
        assert!(result.backup.is_none());
        assert!(!dir.path().join("wp-content/uploads/empty").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_info_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wp-content/themes/x/style.css");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "a{}").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o640)).unwrap();

        let info = service(dir.path())
            .info("wp-content/themes/x/style.css")
            .await
            .unwrap();
        assert_eq!(info.permissions, "0640");
        assert_eq!(info.kind, FileKind::File);
        assert_eq!(info.size, 3);
    }
}
