//! External packaging tools used by the canonicalization pipeline.
//!
//! Everything that has to shell out to an OS tool sits behind [`Platform`]:
//! mounting and creating disk images, expanding flat packages, and the
//! command-line property reader used when an `Info.plist` cannot be parsed.
//! [`MacOsPlatform`] is the production implementation.

mod macos;

#[cfg(test)]
pub(crate) mod fake;

pub use macos::{HAS_HDIUTIL, HAS_PKGUTIL, MacOsPlatform, PLIST_BUDDY};

use crate::canonical::error::Result;
use std::path::Path;
use std::time::Duration;

/// Narrow interface to the platform's disk-image, package and property tools.
#[allow(async_fn_in_trait)]
pub trait Platform {
    /// Mounts `image` read-only at `mount_point`, giving up after `timeout`.
    async fn attach(&self, image: &Path, mount_point: &Path, timeout: Duration) -> Result<()>;

    /// Unmounts `mount_point`. Returns false if the volume is still attached.
    async fn detach(&self, mount_point: &Path) -> bool;

    /// Creates a compressed, read-only disk image at `dest` from the contents
    /// of `source_dir`, labelled `volume_label`. An existing `dest` is replaced.
    async fn create_image(&self, source_dir: &Path, volume_label: &str, dest: &Path)
    -> Result<()>;

    /// Expands the flat package `package` into `dest`, which must not exist yet.
    async fn expand_package(&self, package: &Path, dest: &Path) -> Result<()>;

    /// Reads a single string value from a property list with the CLI reader.
    async fn read_property(&self, plist: &Path, key: &str) -> Option<String>;
}
