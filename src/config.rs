//! Registry configuration.

use std::path::PathBuf;

/// Default hosts file location for the current platform.
#[cfg(windows)]
pub const DEFAULT_HOSTS_PATH: &str = r"C:\Windows\System32\drivers\etc\hosts";

/// Default hosts file location for the current platform.
#[cfg(not(windows))]
pub const DEFAULT_HOSTS_PATH: &str = "/etc/hosts";

/// Default owner tag written into the marker of managed lines.
pub const DEFAULT_OWNER: &str = "hosts-resolver";

/// What the registry does with its in-memory map when the table fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Undo the call's table changes and leave the map untouched.
    #[default]
    Rollback,

    /// Update the map first and keep it even if the table call fails.
    BestEffort,
}

/// Configuration for a [`HostsRegistry`](crate::HostsRegistry) backed by a
/// hosts file.
///
/// # Example
///
/// ```
/// use hosts_resolver::{Consistency, HostsConfig};
///
/// let config = HostsConfig::new()
///     .with_path("/tmp/hosts")
///     .with_owner("myapp")
///     .with_consistency(Consistency::BestEffort);
///
/// assert_eq!(config.owner, "myapp");
/// assert_eq!(config.path.to_str(), Some("/tmp/hosts"));
/// assert!(!config.cleanup_orphaned);
/// ```
#[derive(Debug, Clone)]
pub struct HostsConfig {
    /// Hosts file to edit.
    pub path: PathBuf,

    /// Tag written into `# managed by <owner> (pid=N)` on every added line.
    /// Only lines carrying this tag are ever removed.
    pub owner: String,

    /// Failure policy for the in-memory map.
    pub consistency: Consistency,

    /// Drop managed lines left by dead processes when opening.
    pub cleanup_orphaned: bool,
}

impl HostsConfig {
    /// Creates a config targeting the platform hosts file.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_HOSTS_PATH),
            owner: DEFAULT_OWNER.to_string(),
            consistency: Consistency::default(),
            cleanup_orphaned: false,
        }
    }

    /// Overrides the hosts file path (useful for testing).
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Overrides the owner tag.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Overrides the failure policy.
    #[must_use]
    pub const fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Enables orphan cleanup on open.
    #[must_use]
    pub const fn with_orphan_cleanup(mut self, enabled: bool) -> Self {
        self.cleanup_orphaned = enabled;
        self
    }
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self::new()
    }
}
