//! Strict validation of the upload inbox.

use super::{FsContext, Result, TapError};
use crate::canonical::CanonicalFilename;
use std::path::{Path, PathBuf};

/// A validated file waiting to be released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFile {
    pub path: PathBuf,
    /// Sanitized product name, e.g. `MyTool`.
    pub name: String,
    pub version: String,
    pub ext: String,
    pub filename: String,
}

impl ReleaseFile {
    /// Validates `path` against the canonical filename pattern.
    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parsed = CanonicalFilename::parse(&filename).ok_or_else(|| TapError::InvalidFilename {
            file: filename.clone(),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            name: parsed.name().to_string(),
            version: parsed.version().to_string(),
            ext: parsed.extension().to_string(),
            filename,
        })
    }
}

/// Non-hidden regular files directly in `upload_dir`, sorted by name.
///
/// A missing folder is treated as empty.
pub fn list_upload_folder(upload_dir: &Path) -> Result<Vec<PathBuf>> {
    if !upload_dir.exists() {
        log::debug!("{} does not exist", upload_dir.display());
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(upload_dir).fs_context("reading upload folder", upload_dir)? {
        let entry = entry.fs_context("reading upload folder entry", upload_dir)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let is_file = entry
            .file_type()
            .fs_context("reading file type", entry.path())?
            .is_file();
        if is_file && !hidden {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Lists and validates the upload folder. The first invalid name fails the
/// whole scan; an empty folder yields an empty list.
pub fn scan_upload_folder(upload_dir: &Path) -> Result<Vec<ReleaseFile>> {
    let paths = list_upload_folder(upload_dir)?;
    log::info!("Found {} files in {}", paths.len(), upload_dir.display());
    paths.iter().map(|path| ReleaseFile::from_path(path)).collect()
}
