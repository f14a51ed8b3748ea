//! Zip archive expansion.
//!
//! Archives are expanded in-process with the `zip` crate. Entries whose
//! destination already exists are left alone, so expanding twice into the
//! same directory never clobbers earlier output.

use crate::canonical::error::{Error, ErrorExt, Result};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Expands `archive` into `dest_dir` on the blocking thread pool.
///
/// Returns the number of entries written.
pub async fn expand_archive(archive: &Path, dest_dir: &Path) -> Result<usize> {
    let archive = archive.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();

    tokio::task::spawn_blocking(move || expand_archive_blocking(&archive, &dest_dir))
        .await
        .map_err(|e| Error::GenericError(format!("archive expansion task panicked: {e}")))?
}

/// Blocking form of [`expand_archive`].
///
/// Failures are reported as [`Error::Extract`] naming the archive.
pub fn expand_archive_blocking(archive: &Path, dest_dir: &Path) -> Result<usize> {
    expand(archive, dest_dir).map_err(|e| match e {
        Error::Extract { .. } => e,
        other => Error::Extract {
            path: archive.to_path_buf(),
            reason: other.to_string(),
        },
    })
}

fn expand(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
    let file = File::open(archive_path).fs_context("opening archive", archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    fs::create_dir_all(dest_dir).fs_context("creating expansion directory", dest_dir)?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;

        // Entries escaping the destination (absolute or `..`) are dropped.
        let Some(relative) = entry.enclosed_name() else {
            log::warn!(
                "Skipping unsafe entry {:?} in {}",
                entry.name(),
                archive_path.display()
            );
            continue;
        };
        let outpath: PathBuf = dest_dir.join(&relative);

        if has_symlinked_parent(dest_dir, &relative) {
            log::warn!(
                "Skipping entry {:?} in {}: a parent directory is a symlink",
                entry.name(),
                archive_path.display()
            );
            continue;
        }

        if outpath.symlink_metadata().is_ok() {
            log::debug!("Keeping existing {}", outpath.display());
            continue;
        }

        if entry.is_dir() {
            fs::create_dir_all(&outpath).fs_context("creating directory", &outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).fs_context("creating directory", parent)?;
        }

        #[cfg(unix)]
        {
            let is_symlink = entry
                .unix_mode()
                .is_some_and(|mode| (mode & 0o170000) == 0o120000);
            if is_symlink {
                let mut target = String::new();
                entry.read_to_string(&mut target)?;
                if !link_stays_within(&relative, Path::new(&target)) {
                    log::warn!(
                        "Skipping symlink {:?} -> {:?} in {}: target leaves the expansion directory",
                        entry.name(),
                        target,
                        archive_path.display()
                    );
                    continue;
                }
                std::os::unix::fs::symlink(&target, &outpath)
                    .fs_context("creating symlink", &outpath)?;
                written += 1;
                continue;
            }
        }

        let mut outfile = File::create(&outpath).fs_context("creating file", &outpath)?;
        io::copy(&mut entry, &mut outfile).fs_context("writing file", &outpath)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o7777))
                .fs_context("setting permissions", &outpath)?;
        }

        written += 1;
    }

    Ok(written)
}

/// True if any directory between `dest_dir` and `relative` is a symlink.
fn has_symlinked_parent(dest_dir: &Path, relative: &Path) -> bool {
    relative
        .ancestors()
        .skip(1)
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .any(|ancestor| {
            dest_dir
                .join(ancestor)
                .symlink_metadata()
                .is_ok_and(|meta| meta.file_type().is_symlink())
        })
}

/// Lexically resolves a link at `link` (relative to the expansion root)
/// pointing at `target`; absolute targets and any climb above the root fail.
#[cfg(unix)]
fn link_stays_within(link: &Path, target: &Path) -> bool {
    use std::path::Component;

    let mut depth = link
        .parent()
        .map_or(0, |parent| parent.components().count());

    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}
