//! In-memory [`Platform`] for tests.
//!
//! "Disk images" and "flat packages" are zip files: attaching one unzips it
//! into the mount point and expanding a package unzips it into the
//! destination. Every call is counted.

use super::Platform;
use crate::canonical::archive::expand_archive_blocking;
use crate::canonical::error::{Error, MountError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub(crate) struct FakePlatform {
    pub attaches: AtomicUsize,
    pub detaches: AtomicUsize,
    pub images_created: AtomicUsize,
    pub packages_expanded: AtomicUsize,
    pub property_reads: AtomicUsize,
    /// Values served by `read_property`, keyed by plist key.
    pub properties: HashMap<String, String>,
    /// Images whose attach fails.
    pub failing_images: Vec<String>,
    /// Detach calls that report failure before one succeeds.
    pub stuck_detaches: AtomicUsize,
    pub fail_create: bool,
    /// Images whose attach never completes.
    pub hanging_images: Vec<String>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl Platform for FakePlatform {
    async fn attach(&self, image: &Path, mount_point: &Path, _timeout: Duration) -> Result<()> {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        let name = image
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if self.hanging_images.iter().any(|f| f == name) {
            std::future::pending::<()>().await;
        }
        if self.failing_images.iter().any(|f| f == name) {
            return Err(MountError::Attach {
                path: image.to_path_buf(),
                reason: "fake attach failure".to_string(),
            }
            .into());
        }
        match expand_archive_blocking(image, mount_point) {
            Ok(_) => Ok(()),
            Err(e) => Err(Error::from(MountError::Attach {
                path: image.to_path_buf(),
                reason: e.to_string(),
            })),
        }
    }

    async fn detach(&self, _mount_point: &Path) -> bool {
        self.detaches.fetch_add(1, Ordering::SeqCst);
        let stuck = self.stuck_detaches.load(Ordering::SeqCst);
        if stuck > 0 {
            self.stuck_detaches.store(stuck - 1, Ordering::SeqCst);
            return false;
        }
        true
    }

    async fn create_image(
        &self,
        source_dir: &Path,
        volume_label: &str,
        dest: &Path,
    ) -> Result<()> {
        self.images_created.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(Error::Repack {
                path: source_dir.to_path_buf(),
                reason: "fake hdiutil failure".to_string(),
            });
        }

        let mut listing: Vec<String> = walkdir::WalkDir::new(source_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        listing.sort();
        std::fs::write(dest, format!("{volume_label}\n{}", listing.join("\n")))?;
        Ok(())
    }

    async fn expand_package(&self, package: &Path, dest: &Path) -> Result<()> {
        self.packages_expanded.fetch_add(1, Ordering::SeqCst);
        expand_archive_blocking(package, dest).map(|_| ())
    }

    async fn read_property(&self, _plist: &Path, key: &str) -> Option<String> {
        self.property_reads.fetch_add(1, Ordering::SeqCst);
        self.properties.get(key).cloned()
    }
}
