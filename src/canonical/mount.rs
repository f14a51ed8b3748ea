//! Disk image mount lifecycle.
//!
//! A mount is acquired with a bounded wait and always released, including
//! when the work done against the mounted view fails. Release is best effort:
//! after the configured number of detach attempts the mount is logged as
//! leaked and the run carries on.

use super::config::EngineConfig;
use super::error::{ErrorExt, MountError, Result};
use super::platform::Platform;
use std::future::Future;
use std::path::{Path, PathBuf};

/// A disk image currently attached at a mount point.
#[derive(Debug)]
#[must_use = "a mounted image must be passed to MountManager::release"]
pub struct MountHandle {
    image: PathBuf,
    mount_point: PathBuf,
    released: bool,
}

impl MountHandle {
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        if !self.released {
            log::warn!(
                "Mount of {} at {} dropped without release; volume may still be attached",
                self.image.display(),
                self.mount_point.display()
            );
        }
    }
}

/// Acquires and releases mounted views of disk images.
pub struct MountManager<'a, P: Platform> {
    platform: &'a P,
    config: &'a EngineConfig,
}

impl<'a, P: Platform> MountManager<'a, P> {
    pub fn new(platform: &'a P, config: &'a EngineConfig) -> Self {
        Self { platform, config }
    }

    /// Attaches `image` at `mount_point`, creating the mount point directory.
    ///
    /// Fails closed with a [`MountError`](super::error::MountError) on
    /// attach failure or timeout.
    pub async fn mount(&self, image: &Path, mount_point: &Path) -> Result<MountHandle> {
        tokio::fs::create_dir_all(mount_point)
            .await
            .fs_context("creating mount point", mount_point)?;

        let timeout = self.config.mount_timeout;
        match tokio::time::timeout(timeout, self.platform.attach(image, mount_point, timeout)).await {
            Ok(attached) => attached?,
            Err(_) => {
                log::warn!(
                    "Attaching {} did not finish within {:?}",
                    image.display(),
                    timeout
                );
                return Err(MountError::Timeout {
                    path: image.to_path_buf(),
                    timeout,
                }
                .into());
            }
        }

        log::debug!("Mounted {} at {}", image.display(), mount_point.display());
        Ok(MountHandle {
            image: image.to_path_buf(),
            mount_point: mount_point.to_path_buf(),
            released: false,
        })
    }

    /// Detaches the mount, retrying with backoff. Never fails.
    pub async fn release(&self, mut handle: MountHandle) {
        let attempts = self.config.detach_attempts.max(1);

        for attempt in 1..=attempts {
            if self.platform.detach(&handle.mount_point).await {
                log::debug!("Detached {}", handle.mount_point.display());
                handle.released = true;
                return;
            }
            if attempt < attempts {
                log::debug!(
                    "Detach of {} failed (attempt {}/{}), retrying",
                    handle.mount_point.display(),
                    attempt,
                    attempts
                );
                tokio::time::sleep(self.config.detach_backoff).await;
            }
        }

        log::warn!(
            "Giving up on detaching {} after {} attempts; mount leaked",
            handle.mount_point.display(),
            attempts
        );
        handle.released = true;
    }

    /// Mounts `image`, runs `work` against the mount point, then releases the
    /// mount whatever `work` returned.
    pub async fn with_mounted<T, F, Fut>(&self, image: &Path, mount_point: &Path, work: F) -> Result<T>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let handle = self.mount(image, mount_point).await?;
        let outcome = work(handle.mount_point().to_path_buf()).await;
        self.release(handle).await;
        outcome
    }
}
