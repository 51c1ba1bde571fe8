//! Authorization for file operations.

use std::collections::HashSet;

/// Capability required to edit theme files.
pub const EDIT_THEMES: &str = "edit_themes";

/// Capability required to edit plugin files.
pub const EDIT_PLUGINS: &str = "edit_plugins";

/// Decides whether the current caller may manage files.
///
/// Supplied by the host environment. File operations ask once per call,
/// before looking at any path.
pub trait AuthorizationGate: Send + Sync {
    /// Whether the caller may read and modify files under the allowed roots.
    fn can_manage_files(&self) -> bool;

    /// Identifier of the acting user, recorded in backup metadata.
    fn user_id(&self) -> u64;
}

/// Grants access to callers holding both `edit_themes` and `edit_plugins`.
#[derive(Debug, Clone, Default)]
pub struct CapabilityGate {
    user_id: u64,
    capabilities: HashSet<String>,
}

impl CapabilityGate {
    /// Gate for a user holding the given capabilities.
    pub fn new<I, S>(user_id: u64, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id,
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    /// Gate for a user holding both file capabilities.
    pub fn administrator(user_id: u64) -> Self {
        Self::new(user_id, [EDIT_THEMES, EDIT_PLUGINS])
    }

    /// Whether the user holds a capability.
    pub fn has(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

impl AuthorizationGate for CapabilityGate {
    fn can_manage_files(&self) -> bool {
        self.has(EDIT_THEMES) && self.has(EDIT_PLUGINS)
    }

    fn user_id(&self) -> u64 {
        self.user_id
    }
}
