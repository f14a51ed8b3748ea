//! Engine tunables.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Deepest container nesting searched, counted from the expansion of the inbox file.
pub const MAX_NESTING_DEPTH: usize = 3;

/// Longest wait for a disk image to attach before it is treated as unusable.
pub const MOUNT_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of detach attempts before a mount is given up as leaked.
pub const DETACH_ATTEMPTS: u32 = 5;

/// Pause between detach attempts.
pub const DETACH_BACKOFF: Duration = Duration::from_secs(1);

/// Configuration shared by every stage of the canonicalization pipeline.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tap_release_manager::canonical::EngineConfig;
///
/// let config = EngineConfig::default().with_detach_backoff(Duration::ZERO);
/// assert_eq!(config.max_depth, 3);
/// assert_eq!(config.detach_attempts, 5);
/// ```
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Deepest nesting level the locator expands into.
    pub max_depth: usize,

    /// Bounded wait for `attach`.
    pub mount_timeout: Duration,

    /// Detach attempts per mount (at least one is always made).
    pub detach_attempts: u32,

    /// Delay between detach attempts.
    pub detach_backoff: Duration,

    /// Parent directory for scratch workspaces.
    ///
    /// Default: None (system temp directory)
    pub scratch_root: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
            mount_timeout: MOUNT_TIMEOUT,
            detach_attempts: DETACH_ATTEMPTS,
            detach_backoff: DETACH_BACKOFF,
            scratch_root: None,
        }
    }
}

impl EngineConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_mount_timeout(mut self, timeout: Duration) -> Self {
        self.mount_timeout = timeout;
        self
    }

    pub fn with_detach_attempts(mut self, attempts: u32) -> Self {
        self.detach_attempts = attempts;
        self
    }

    pub fn with_detach_backoff(mut self, backoff: Duration) -> Self {
        self.detach_backoff = backoff;
        self
    }

    pub fn with_scratch_root(mut self, root: impl AsRef<Path>) -> Self {
        self.scratch_root = Some(root.as_ref().to_path_buf());
        self
    }
}
