//! Content scanning for file writes.
//!
//! [`ContentScanner`] is a best-effort heuristic gate, not a sandbox. It
//! matches a short list of patterns for code execution primitives and will
//! not stop a determined author: string concatenation, variable functions,
//! or any equivalent API missing from the list all get through. It also
//! rejects legitimate code that happens to mention a listed function, and
//! there is no allow-list to override that. Its job is to catch accidental
//! or unsophisticated injection.
//!
//! The PHP brace check in [`check_php`] does not parse PHP either; braces
//! inside string literals or comments are counted, so unusual but valid
//! files can be rejected.

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

/// Patterns checked by the scanner, in order: `(description, regex)`.
const PATTERNS: &[(&str, &str)] = &[
    ("directory traversal", r"\.\./"),
    ("eval() execution", r"(?i)eval\s*\("),
    ("base64_decode payload", r"(?i)base64_decode"),
    ("shell_exec command", r"(?i)shell_exec"),
    ("exec() execution", r"(?i)exec\s*\("),
    ("system() call", r"(?i)system\s*\("),
    ("passthru execution", r"(?i)passthru"),
    ("proc_open process", r"(?i)proc_open"),
];

/// A dangerous pattern found in content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityFinding {
    /// What the pattern detects.
    pub description: String,
    /// The pattern that matched.
    pub pattern: String,
}

/// Result of scanning one piece of content.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// True iff no pattern matched.
    pub safe: bool,
    /// Matched patterns, in pattern order.
    pub findings: Vec<SecurityFinding>,
}

impl ScanReport {
    /// Comma-separated finding descriptions, for error messages.
    pub fn summary(&self) -> String {
        self.findings
            .iter()
            .map(|f| f.description.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Scans file content for code execution primitives.
#[derive(Debug, Clone)]
pub struct ContentScanner {
    rules: Vec<(&'static str, Regex)>,
}

impl Default for ContentScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentScanner {
    /// Create a scanner with the built-in pattern list.
    pub fn new() -> Self {
        let rules = PATTERNS
            .iter()
            .filter_map(|(description, pattern)| match Regex::new(pattern) {
                Ok(regex) => Some((*description, regex)),
                Err(e) => {
                    tracing::warn!("Failed to compile scan pattern '{}': {}", pattern, e);
                    None
                }
            })
            .collect();

        Self { rules }
    }

    /// Scan content against every pattern.
    pub fn scan(&self, content: &str) -> ScanReport {
        let findings: Vec<SecurityFinding> = self
            .rules
            .iter()
            .filter(|(_, regex)| regex.is_match(content))
            .map(|(description, regex)| SecurityFinding {
                description: description.to_string(),
                pattern: regex.as_str().to_string(),
            })
            .collect();

        ScanReport {
            safe: findings.is_empty(),
            findings,
        }
    }
}

/// Brace-balance check for PHP content.
///
/// Content without an opening `<?php` tag passes untouched.
pub fn check_php(content: &str) -> Result<()> {
    if !content.contains("<?php") {
        return Ok(());
    }

    let open = content.matches('{').count();
    let close = content.matches('}').count();
    if open != close {
        return Err(Error::ContentRejected(format!(
            "PHP validation failed: unmatched braces ({} opening, {} closing)",
            open, close
        )));
    }

    Ok(())
}
