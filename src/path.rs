//! Path validation for file operations.
//!
//! Caller-supplied paths are relative to the WordPress installation root
//! (for example `wp-content/themes/twentytwenty/style.css`). A path is
//! accepted only when it
//!
//! - contains no `../` or `..\` sequence anywhere in the raw input,
//! - normalizes to a path equal to, or beneath, one of the allowed roots,
//! - has no extension, or an extension from the allowed set.
//!
//! Symlinks are not resolved; the allowed roots are trusted to contain
//! only what the site owner put there.

use std::path::{Path, PathBuf};

use crate::config::FilesConfig;
use crate::error::{Error, Result};

/// A caller path that passed validation.
///
/// Only [`PathValidator`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath {
    absolute: PathBuf,
    relative: String,
    raw: String,
}

impl ValidatedPath {
    /// Absolute location inside the installation.
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// Normalized path relative to the installation root, `/`-separated.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Path as the caller supplied it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Lower-cased extension of the final segment, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.relative)
    }
}

/// Validates caller paths against the allowed roots and extensions.
#[derive(Debug, Clone)]
pub struct PathValidator {
    root: PathBuf,
    allowed_roots: Vec<String>,
    allowed_extensions: Vec<String>,
}

impl PathValidator {
    /// Create a validator from a file operation policy.
    pub fn new(config: &FilesConfig) -> Self {
        Self {
            root: config.root.clone(),
            allowed_roots: config.allowed_roots.clone(),
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Validate a path naming a file (or an extensionless target).
    pub fn validate(&self, raw: &str) -> Result<ValidatedPath> {
        self.check(raw, true)
    }

    /// Validate a path naming a directory. The extension check is skipped.
    pub fn validate_dir(&self, raw: &str) -> Result<ValidatedPath> {
        self.check(raw, false)
    }

    fn check(&self, raw: &str, check_extension: bool) -> Result<ValidatedPath> {
        if raw.contains("../") || raw.contains("..\\") {
            return Err(Error::InvalidPath(format!(
                "directory traversal detected in '{}'",
                raw
            )));
        }
        if raw.contains('\0') {
            return Err(Error::InvalidPath("path contains a NUL byte".into()));
        }

        let relative = normalize(raw)?;

        let allowed = self.allowed_roots.iter().any(|root| {
            relative == *root
                || relative
                    .strip_prefix(root.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        if !allowed {
            return Err(Error::InvalidPath(format!(
                "path must be within allowed directories: {}",
                self.allowed_roots.join(", ")
            )));
        }

        if check_extension {
            if let Some(ext) = extension_of(&relative) {
                if !self.allowed_extensions.contains(&ext) {
                    return Err(Error::InvalidExtension(ext));
                }
            }
        }

        Ok(ValidatedPath {
            absolute: self.root.join(&relative),
            relative,
            raw: raw.to_string(),
        })
    }
}

/// Strip leading separators, unify separators, and drop empty and `.` segments.
fn normalize(raw: &str) -> Result<String> {
    let trimmed = raw.trim_start_matches(['/', '\\']);
    let mut segments = Vec::new();
    for segment in trimmed.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(Error::InvalidPath(format!(
                    "directory traversal detected in '{}'",
                    raw
                )))
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// Everything after the last dot of the final segment, so `.htaccess` has
/// the extension `htaccess` and `Makefile` has none.
fn extension_of(relative: &str) -> Option<String> {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> PathValidator {
        PathValidator::new(&FilesConfig::new("/var/www/html"))
    }

    #[test]
    fn test_accepts_theme_file() {
        let path = validator()
            .validate("wp-content/themes/twentytwenty/style.css")
            .unwrap();
        assert_eq!(path.relative(), "wp-content/themes/twentytwenty/style.css");
        assert_eq!(
            path.absolute(),
            Path::new("/var/www/html/wp-content/themes/twentytwenty/style.css")
        );
        assert_eq!(path.extension().as_deref(), Some("css"));
    }

    #[test]
    fn test_traversal_rejected_anywhere() {
        let v = validator();
        for raw in [
            "wp-content/themes/../../../etc/passwd",
            "../wp-content/themes/a.css",
            "wp-content/plugins/x/....//....//wp-config.php",
            "wp-content\\uploads\\..\\..\\wp-config.php",
            "wp-content/uploads/a/../../../../../../tmp",
            "wp-content/themes/..",
        ] {
            assert!(
                matches!(v.validate(raw), Err(Error::InvalidPath(_))),
                "accepted {raw}"
            );
        }
    }

    #[test]
    fn test_outside_roots_rejected() {
        let v = validator();
        for raw in ["", "/", "wp-config.php", "wp-content/wpmcp-backups/x.bak", "wp-includes/version.php"] {
            assert!(matches!(v.validate(raw), Err(Error::InvalidPath(_))), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_root_prefix_requires_segment_boundary() {
        let v = validator();
        assert!(matches!(
            v.validate("wp-content/themes-evil/a.css"),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_bare_root_accepted() {
        let v = validator();
        let path = v.validate("wp-content/plugins").unwrap();
        assert_eq!(path.relative(), "wp-content/plugins");
        assert!(v.validate_dir("/wp-content/mu-plugins/").is_ok());
    }

    #[test]
    fn test_leading_slashes_and_backslashes_normalized() {
        let path = validator()
            .validate("//wp-content\\uploads\\2024\\.\\logo.PNG")
            .unwrap();
        assert_eq!(path.relative(), "wp-content/uploads/2024/logo.PNG");
        assert_eq!(path.raw(), "//wp-content\\uploads\\2024\\.\\logo.PNG");
    }

    #[test]
    fn test_extension_rules() {
        let v = validator();
        assert!(matches!(
            v.validate("wp-content/uploads/shell.phtml"),
            Err(Error::InvalidExtension(ext)) if ext == "phtml"
        ));
        assert!(matches!(
            v.validate("wp-content/uploads/.htaccess"),
            Err(Error::InvalidExtension(ext)) if ext == "htaccess"
        ));
        assert!(v.validate("wp-content/themes/x/Style.CSS").is_ok());
        assert!(v.validate("wp-content/themes/x/LICENSE").is_ok());
        assert!(v.validate("wp-content/themes/x/trailing.").is_ok());
    }

    #[test]
    fn test_validate_dir_skips_extension() {
        let v = validator();
        assert!(v.validate("wp-content/plugins/jquery.ui").is_err());
        assert!(v.validate_dir("wp-content/plugins/jquery.ui").is_ok());
    }

    #[test]
    fn test_injected_policy() {
        let mut config = FilesConfig::new("/srv");
        config.allowed_roots = vec!["wp-content/uploads".into()];
        config.allowed_extensions = vec!["png".into()];
        let v = PathValidator::new(&config);

        assert!(v.validate("wp-content/uploads/a.png").is_ok());
        assert!(v.validate("wp-content/themes/a.png").is_err());
        assert!(v.validate("wp-content/uploads/a.css").is_err());
    }
}
