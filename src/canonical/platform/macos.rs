//! macOS implementation of [`Platform`] using `hdiutil`, `pkgutil` and `PlistBuddy`.

use super::Platform;
use crate::canonical::error::{Error, MountError, Result};
use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;

/// Absolute path of the property reader; it is not on `PATH`.
pub const PLIST_BUDDY: &str = "/usr/libexec/PlistBuddy";

/// Disk image format handed to `hdiutil create`: zlib-compressed, read-only.
const IMAGE_FORMAT: &str = "UDZO";

fn probe_tool(name: &str, purpose: &str) -> bool {
    match which::which(name) {
        Ok(path) => {
            log::debug!("Found {} at: {}", name, path.display());
            true
        }
        Err(e) => {
            log::warn!("{} not found in PATH: {}. {}", name, e, purpose);
            false
        }
    }
}

/// Whether `hdiutil` is available to mount and create disk images.
///
/// Cached result to avoid repeated lookups during a run.
pub static HAS_HDIUTIL: LazyLock<bool> = LazyLock::new(|| {
    probe_tool(
        "hdiutil",
        "Disk images cannot be mounted or created on this host.",
    )
});

/// Whether `pkgutil` is available to expand flat packages.
pub static HAS_PKGUTIL: LazyLock<bool> = LazyLock::new(|| {
    probe_tool(
        "pkgutil",
        "Package versions will be read from filenames only.",
    )
});

/// Production [`Platform`] backed by the macOS command-line tools.
#[derive(Clone, Debug, Default)]
pub struct MacOsPlatform;

impl MacOsPlatform {
    pub fn new() -> Self {
        Self
    }

    /// Logs which tools are missing. Returns false if none of the disk
    /// image operations can work on this host.
    pub fn probe(&self) -> bool {
        let has_pkgutil = *HAS_PKGUTIL;
        if !Path::new(PLIST_BUDDY).exists() {
            log::debug!("{} not present; Info.plist CLI fallback disabled", PLIST_BUDDY);
        }
        log::debug!("pkgutil available: {}", has_pkgutil);
        *HAS_HDIUTIL
    }
}

impl Platform for MacOsPlatform {
    async fn attach(&self, image: &Path, mount_point: &Path, timeout: Duration) -> Result<()> {
        log::debug!(
            "Attaching {} at {}",
            image.display(),
            mount_point.display()
        );

        let mut command = Command::new("hdiutil");
        command
            .arg("attach")
            .args(["-readonly", "-nobrowse", "-noverify", "-noautoopen"])
            .arg("-mountpoint")
            .arg(mount_point)
            .arg(image)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Images with a license agreement wait for input forever; the timeout
        // and kill_on_drop bound that.
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(MountError::Attach {
                    path: image.to_path_buf(),
                    reason: format!("failed to execute hdiutil: {e}"),
                }
                .into());
            }
            Err(_) => {
                return Err(MountError::Timeout {
                    path: image.to_path_buf(),
                    timeout,
                }
                .into());
            }
        };

        if !output.status.success() {
            return Err(MountError::Attach {
                path: image.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(())
    }

    async fn detach(&self, mount_point: &Path) -> bool {
        let output = Command::new("hdiutil")
            .arg("detach")
            .arg(mount_point)
            .arg("-quiet")
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                log::debug!(
                    "hdiutil detach {} failed: {}",
                    mount_point.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                log::debug!("Failed to execute hdiutil detach: {}", e);
                false
            }
        }
    }

    async fn create_image(
        &self,
        source_dir: &Path,
        volume_label: &str,
        dest: &Path,
    ) -> Result<()> {
        log::info!("Creating {} disk image {}", IMAGE_FORMAT, dest.display());

        let output = Command::new("hdiutil")
            .arg("create")
            .arg("-volname")
            .arg(volume_label)
            .arg("-srcfolder")
            .arg(source_dir)
            .arg("-ov") // Overwrite if exists
            .arg("-format")
            .arg(IMAGE_FORMAT)
            .arg(dest)
            .output()
            .await
            .map_err(|e| Error::Repack {
                path: source_dir.to_path_buf(),
                reason: format!("failed to execute hdiutil: {e}"),
            })?;

        if !output.status.success() {
            return Err(Error::Repack {
                path: source_dir.to_path_buf(),
                reason: format!(
                    "hdiutil create failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(())
    }

    async fn expand_package(&self, package: &Path, dest: &Path) -> Result<()> {
        let output = Command::new("pkgutil")
            .arg("--expand")
            .arg(package)
            .arg(dest)
            .output()
            .await
            .map_err(|e| Error::Extract {
                path: package.to_path_buf(),
                reason: format!("failed to execute pkgutil: {e}"),
            })?;

        if !output.status.success() {
            return Err(Error::Extract {
                path: package.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    async fn read_property(&self, plist: &Path, key: &str) -> Option<String> {
        let output = Command::new(PLIST_BUDDY)
            .arg("-c")
            .arg(format!("Print :{key}"))
            .arg(plist)
            .output()
            .await
            .map_err(|e| log::debug!("Failed to execute {}: {}", PLIST_BUDDY, e))
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!value.is_empty()).then_some(value)
    }
}
