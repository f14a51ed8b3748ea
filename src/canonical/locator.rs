//! Recursive discovery of the installable artifact inside a container tree.
//!
//! Each call to [`Locator::locate`] owns one directory level. It scans the
//! level for bundles and flat packages and returns the shallowest one. If
//! the level holds none, it expands nested archives (then nested disk
//! images) into fresh sibling directories and recurses into each in turn,
//! stopping at the first hit or at the nesting ceiling.

use super::archive::expand_archive;
use super::artifact::{Artifact, ContainerKind, is_hidden_or_junk, lies_within_bundle};
use super::config::EngineConfig;
use super::error::{Error, ErrorExt, Result};
use super::mount::MountManager;
use super::platform::Platform;
use super::utils::fs::copy_dir_blocking;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Everything of interest found under one directory level.
#[derive(Debug, Default)]
struct Scan {
    /// Candidate artifacts with their depth below the scanned directory.
    artifacts: Vec<(usize, Artifact)>,
    archives: Vec<PathBuf>,
    images: Vec<PathBuf>,
}

impl Scan {
    /// Fewest path components wins; ties go to the lexically smaller path.
    fn shallowest(self) -> Option<Artifact> {
        self.artifacts
            .into_iter()
            .min_by(|(depth_a, a), (depth_b, b)| {
                depth_a.cmp(depth_b).then_with(|| a.path().cmp(b.path()))
            })
            .map(|(_, artifact)| artifact)
    }
}

/// Walks `directory` without descending into bundles, hidden entries or junk.
///
/// Because bundles are never entered, nothing inside a matched bundle (a
/// helper `.pkg` in `Contents/Resources`, say) becomes a candidate.
fn scan_directory(directory: &Path) -> Scan {
    let mut scan = Scan::default();
    let mut walker = WalkDir::new(directory)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden_or_junk(entry.file_name()));

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Skipping unreadable entry under {}: {}", directory.display(), e);
                continue;
            }
        };
        let file_type = entry.file_type();

        // Nothing inside a bundle is a candidate.
        if entry
            .path()
            .strip_prefix(directory)
            .is_ok_and(lies_within_bundle)
        {
            continue;
        }

        if let Some(artifact) =
            Artifact::from_entry(entry.path(), file_type.is_dir(), file_type.is_file())
        {
            if matches!(artifact, Artifact::Bundle(_)) {
                walker.skip_current_dir();
            }
            scan.artifacts.push((entry.depth(), artifact));
            continue;
        }

        if !file_type.is_file() {
            continue;
        }
        match ContainerKind::from_path(entry.path()) {
            Some(ContainerKind::Archive) => scan.archives.push(entry.into_path()),
            Some(ContainerKind::DiskImage) => scan.images.push(entry.into_path()),
            None => {}
        }
    }

    scan
}

/// True for symlinks that leave the volume or loop back onto it; copying
/// them out would either escape the workspace or recurse forever.
fn is_escaping_symlink(link: &Path, volume_root: &Path) -> bool {
    let Ok(target) = fs::read_link(link) else {
        return true;
    };
    if target.is_absolute() {
        return true;
    }
    match fs::canonicalize(link) {
        Ok(resolved) => volume_root.starts_with(&resolved) || !resolved.starts_with(volume_root),
        // Dangling but relative: harmless to recreate.
        Err(_) => false,
    }
}

/// Copies the top level of a mounted volume into `dest`.
///
/// Dotfiles and escaping symlinks are skipped, as is anything whose
/// destination already exists. Returns the number of entries copied.
fn copy_mounted_contents(mount_point: &Path, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).fs_context("creating extraction directory", dest)?;
    let volume_root = fs::canonicalize(mount_point).fs_context("resolving mount point", mount_point)?;

    let mut entries = fs::read_dir(mount_point)
        .fs_context("reading mounted volume", mount_point)?
        .collect::<std::io::Result<Vec<_>>>()
        .fs_context("reading mounted volume", mount_point)?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut copied = 0;
    for entry in entries {
        let name = entry.file_name();
        if is_hidden_or_junk(&name) {
            continue;
        }

        let source = entry.path();
        let target = dest.join(&name);
        if target.symlink_metadata().is_ok() {
            log::debug!("{} already extracted, skipping", target.display());
            continue;
        }

        let file_type = entry.file_type().fs_context("reading entry type", &source)?;
        if file_type.is_symlink() {
            if is_escaping_symlink(&source, &volume_root) {
                log::debug!("Skipping symlink {}", source.display());
                continue;
            }
            let link_target = fs::read_link(&source).fs_context("reading symlink", &source)?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link_target, &target)
                .fs_context("recreating symlink", &target)?;
            #[cfg(not(unix))]
            log::debug!("Not recreating symlink {} -> {}", target.display(), link_target.display());
        } else if file_type.is_dir() {
            copy_dir_blocking(&source, &target)?;
        } else {
            fs::copy(&source, &target).fs_context("copying file", &target)?;
        }
        copied += 1;
    }

    Ok(copied)
}

/// Finds the primary artifact inside an expanded container tree.
pub struct Locator<'a, P: Platform> {
    config: &'a EngineConfig,
    mounts: MountManager<'a, P>,
}

impl<'a, P: Platform> Locator<'a, P> {
    pub fn new(platform: &'a P, config: &'a EngineConfig) -> Self {
        Self {
            config,
            mounts: MountManager::new(platform, config),
        }
    }

    /// Returns the artifact found under `directory`, expanding nested
    /// containers up to the configured depth. `depth` is the number of
    /// container expansions already performed to reach `directory`.
    ///
    /// Failures on individual nested containers are logged and the
    /// container is skipped; they never abort the scan of its siblings.
    pub async fn locate(&self, directory: &Path, depth: usize) -> Option<Artifact> {
        if depth > self.config.max_depth {
            log::debug!("Depth {} exceeds ceiling at {}", depth, directory.display());
            return None;
        }

        let scan = self.scan(directory).await;
        let (archives, images) = (scan.archives.clone(), scan.images.clone());

        if let Some(artifact) = scan.shallowest() {
            log::info!("Found {} (depth {})", artifact, depth);
            return Some(artifact);
        }

        if archives.is_empty() && images.is_empty() {
            log::debug!("Nothing to expand under {}", directory.display());
            return None;
        }

        if depth >= self.config.max_depth {
            log::warn!(
                "Nesting ceiling ({}) reached in {}; ignoring {} nested container(s)",
                self.config.max_depth,
                directory.display(),
                archives.len() + images.len()
            );
            return None;
        }

        for archive in &archives {
            let Some(expanded) = self.expand_nested_archive(archive).await else {
                continue;
            };
            if let Some(artifact) = Box::pin(self.locate(&expanded, depth + 1)).await {
                return Some(artifact);
            }
        }

        for image in &images {
            let Some(extracted) = self.extract_nested_image(image).await else {
                continue;
            };
            if let Some(artifact) = Box::pin(self.locate(&extracted, depth + 1)).await {
                return Some(artifact);
            }
        }

        log::debug!("Exhausted {}", directory.display());
        None
    }

    async fn scan(&self, directory: &Path) -> Scan {
        let dir = directory.to_path_buf();
        match tokio::task::spawn_blocking(move || scan_directory(&dir)).await {
            Ok(scan) => scan,
            Err(e) => {
                log::warn!("Scan of {} failed: {}", directory.display(), e);
                Scan::default()
            }
        }
    }

    /// Expands `archive` into its sibling directory, returning that directory.
    async fn expand_nested_archive(&self, archive: &Path) -> Option<PathBuf> {
        let dest = expansion_dir(archive, ContainerKind::Archive)?;
        if dest.exists() {
            log::debug!("{} already expanded, skipping", archive.display());
            return None;
        }

        log::info!("Expanding {}", archive.display());
        match expand_archive(archive, &dest).await {
            Ok(count) => {
                log::debug!("Expanded {} entries into {}", count, dest.display());
                Some(dest)
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", archive.display(), e);
                None
            }
        }
    }

    /// Mounts `image`, copies its contents into a sibling directory and
    /// unmounts it, returning the directory.
    async fn extract_nested_image(&self, image: &Path) -> Option<PathBuf> {
        let dest = expansion_dir(image, ContainerKind::DiskImage)?;
        if dest.exists() {
            log::debug!("{} already extracted, skipping", image.display());
            return None;
        }
        let file_name = image.file_name()?.to_str()?;
        let mount_point = image.with_file_name(format!(".{file_name}.mount"));

        log::info!("Mounting {}", image.display());
        let copied = self
            .mounts
            .with_mounted(image, &mount_point, |mounted| {
                let dest = dest.clone();
                async move {
                    tokio::task::spawn_blocking(move || copy_mounted_contents(&mounted, &dest))
                        .await
                        .map_err(|e| Error::GenericError(format!("copy task panicked: {e}")))?
                }
            })
            .await;

        match copied {
            Ok(count) => {
                log::debug!("Copied {} entries out of {}", count, image.display());
                Some(dest)
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", image.display(), e);
                None
            }
        }
    }
}

fn expansion_dir(container: &Path, kind: ContainerKind) -> Option<PathBuf> {
    let name = kind.expansion_dir_name(container)?;
    Some(container.with_file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::archive::tests::write_zip;
    use crate::canonical::platform::fake::FakePlatform;
    use std::time::Duration;

    fn config() -> EngineConfig {
        EngineConfig::default().with_detach_backoff(Duration::ZERO)
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn shallowest_artifact_wins() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a/b/Deep.app/Contents")).unwrap();
        fs::create_dir_all(temp.path().join("a/Shallow.app/Contents")).unwrap();

        let platform = FakePlatform::new();
        let config = config();
        let found = Locator::new(&platform, &config).locate(temp.path(), 1).await;

        assert_eq!(found, Some(Artifact::Bundle(temp.path().join("a/Shallow.app"))));
    }

    #[tokio::test]
    async fn packages_inside_bundles_are_never_returned() {
        let temp = tempfile::tempdir().unwrap();
        touch(&temp.path().join("Tool.app/Contents/Resources/Helper.pkg"));
        touch(&temp.path().join("Other.app/Contents/Resources/Installer.pkg"));

        let platform = FakePlatform::new();
        let config = config();
        let found = Locator::new(&platform, &config)
            .locate(temp.path(), 1)
            .await
            .unwrap();

        assert!(matches!(found, Artifact::Bundle(_)));
        assert_eq!(found.path(), temp.path().join("Other.app"));
    }

    #[tokio::test]
    async fn hidden_and_junk_entries_are_ignored() {
        let temp = tempfile::tempdir().unwrap();
        touch(&temp.path().join("._Tool.pkg"));
        touch(&temp.path().join("__MACOSX/Tool.pkg"));
        touch(&temp.path().join(".hidden/Tool.pkg"));
        touch(&temp.path().join("dist/Real.pkg"));

        let platform = FakePlatform::new();
        let config = config();
        let found = Locator::new(&platform, &config).locate(temp.path(), 1).await;

        assert_eq!(
            found,
            Some(Artifact::FlatPackage(temp.path().join("dist/Real.pkg")))
        );
    }

    #[tokio::test]
    async fn nested_archives_are_expanded_into_siblings() {
        let temp = tempfile::tempdir().unwrap();
        let inner = temp.path().join("Inner.zip");
        write_zip(&inner, &[("Tool.app/Contents/Info.plist", b"<plist/>")]);
        let outer = temp.path().join("work/Outer.zip");
        fs::create_dir_all(outer.parent().unwrap()).unwrap();
        let inner_bytes = fs::read(&inner).unwrap();
        write_zip(&outer, &[("Inner.zip", inner_bytes.as_slice())]);

        let platform = FakePlatform::new();
        let config = config();
        let found = Locator::new(&platform, &config)
            .locate(&temp.path().join("work"), 0)
            .await
            .unwrap();

        assert_eq!(
            found.path(),
            temp.path()
                .join("work/Outer.zip.expanded/Inner.zip.expanded/Tool.app")
        );
    }

    #[tokio::test]
    async fn deep_nesting_stops_at_the_ceiling() {
        let temp = tempfile::tempdir().unwrap();
        // Five archives deep, with a real artifact only at the bottom.
        let mut payload = {
            let path = temp.path().join("level5.zip");
            write_zip(&path, &[("Tool.pkg", b"pkg")]);
            fs::read(&path).unwrap()
        };
        for level in (1..=4).rev() {
            let path = temp.path().join(format!("level{level}.zip"));
            let inner_name = format!("level{}.zip", level + 1);
            write_zip(&path, &[(inner_name.as_str(), payload.as_slice())]);
            payload = fs::read(&path).unwrap();
        }
        let work = temp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(work.join("level1.zip"), &payload).unwrap();

        let platform = FakePlatform::new();
        let config = config();
        let found = Locator::new(&platform, &config).locate(&work, 0).await;

        assert_eq!(found, None);
        // level1..level3 were expanded; level4 was seen at the ceiling and left alone.
        assert!(work.join("level1.zip.expanded/level2.zip.expanded/level3.zip.expanded").is_dir());
        assert!(
            !work
                .join("level1.zip.expanded/level2.zip.expanded/level3.zip.expanded/level4.zip.expanded")
                .exists()
        );
    }

    #[tokio::test]
    async fn ceiling_follows_the_configured_depth() {
        let temp = tempfile::tempdir().unwrap();
        let inner = temp.path().join("inner.zip");
        write_zip(&inner, &[("Tool.pkg", b"pkg")]);
        let inner_bytes = fs::read(&inner).unwrap();

        let shallow = temp.path().join("shallow");
        let deep = temp.path().join("deep");
        for work in [&shallow, &deep] {
            fs::create_dir_all(work).unwrap();
            write_zip(&work.join("outer.zip"), &[("inner.zip", inner_bytes.as_slice())]);
        }

        let platform = FakePlatform::new();
        let limited = config().with_max_depth(1);
        let found = Locator::new(&platform, &limited).locate(&shallow, 0).await;
        assert_eq!(found, None);
        assert!(!shallow.join("outer.zip.expanded/inner.zip.expanded").exists());

        let default = config();
        let found = Locator::new(&platform, &default).locate(&deep, 0).await.unwrap();
        assert_eq!(
            found.path(),
            deep.join("outer.zip.expanded/inner.zip.expanded/Tool.pkg")
        );
    }

    #[tokio::test]
    async fn corrupt_sibling_does_not_abort_the_scan() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a-broken.zip"), b"garbage").unwrap();
        write_zip(&temp.path().join("b-good.zip"), &[("Tool.pkg", b"pkg")]);

        let platform = FakePlatform::new();
        let config = config();
        let found = Locator::new(&platform, &config)
            .locate(temp.path(), 0)
            .await
            .unwrap();

        assert_eq!(found.path(), temp.path().join("b-good.zip.expanded/Tool.pkg"));
    }

    #[tokio::test]
    async fn already_expanded_archives_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        write_zip(&temp.path().join("Tool.zip"), &[("Tool.pkg", b"pkg")]);
        fs::create_dir_all(temp.path().join("Tool.zip.expanded")).unwrap();

        let platform = FakePlatform::new();
        let config = config();
        let found = Locator::new(&platform, &config).locate(temp.path(), 0).await;

        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn disk_images_are_mounted_copied_and_released() {
        let temp = tempfile::tempdir().unwrap();
        write_zip(
            &temp.path().join("Tool.dmg"),
            &[
                ("Tool.app/Contents/Info.plist", b"<plist/>"),
                (".VolumeIcon.icns", b"icon"),
            ],
        );

        let platform = FakePlatform::new();
        let config = config();
        let found = Locator::new(&platform, &config)
            .locate(temp.path(), 0)
            .await
            .unwrap();

        assert_eq!(found.path(), temp.path().join("Tool.dmg.extracted/Tool.app"));
        assert!(!temp.path().join("Tool.dmg.extracted/.VolumeIcon.icns").exists());
        assert_eq!(FakePlatform::count(&platform.attaches), 1);
        assert_eq!(FakePlatform::count(&platform.detaches), 1);
    }

    #[tokio::test]
    async fn failed_mount_skips_only_that_image() {
        let temp = tempfile::tempdir().unwrap();
        write_zip(&temp.path().join("A.dmg"), &[("Wrong.app/", b"")]);
        write_zip(&temp.path().join("B.dmg"), &[("Right.app/", b"")]);

        let mut platform = FakePlatform::new();
        platform.failing_images.push("A.dmg".to_string());
        let config = config();
        let found = Locator::new(&platform, &config)
            .locate(temp.path(), 0)
            .await
            .unwrap();

        assert_eq!(found.path(), temp.path().join("B.dmg.extracted/Right.app"));
        assert_eq!(FakePlatform::count(&platform.attaches), 2);
        assert_eq!(FakePlatform::count(&platform.detaches), 1);
    }

    #[cfg(unix)]
    #[test]
    fn applications_symlink_is_not_copied_out_of_a_volume() {
        let temp = tempfile::tempdir().unwrap();
        let volume = temp.path().join("volume");
        fs::create_dir_all(volume.join("Tool.app/Contents")).unwrap();
        std::os::unix::fs::symlink("/Applications", volume.join("Applications")).unwrap();
        std::os::unix::fs::symlink(".", volume.join("Loop")).unwrap();
        std::os::unix::fs::symlink("Tool.app", volume.join("Alias.app")).unwrap();

        let dest = temp.path().join("out");
        let copied = copy_mounted_contents(&volume, &dest).unwrap();

        assert_eq!(copied, 2);
        assert!(dest.join("Tool.app/Contents").is_dir());
        assert!(dest.join("Alias.app").symlink_metadata().is_ok());
        assert!(dest.join("Applications").symlink_metadata().is_err());
        assert!(dest.join("Loop").symlink_metadata().is_err());
    }
}
