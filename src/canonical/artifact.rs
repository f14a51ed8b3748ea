//! Containers, artifacts and identities.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Compressed-archive extension.
pub const ARCHIVE_EXT: &str = "zip";
/// Disk-image container extension.
pub const DISK_IMAGE_EXT: &str = "dmg";
/// Flat installer package extension.
pub const FLAT_PACKAGE_EXT: &str = "pkg";
/// Application bundle directory extension.
pub const BUNDLE_EXT: &str = "app";

/// Directory names that archivers and Finder leave behind.
const JUNK_NAMES: [&str; 1] = ["__MACOSX"];

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Kind of wrapper file that can hold an artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Zip archive, expanded in-process
    Archive,
    /// Disk image, exposed by mounting it
    DiskImage,
}

impl ContainerKind {
    /// Classifies a path by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        if has_extension(path, ARCHIVE_EXT) {
            Some(Self::Archive)
        } else if has_extension(path, DISK_IMAGE_EXT) {
            Some(Self::DiskImage)
        } else {
            None
        }
    }

    /// Name of the sibling directory a container is expanded into.
    pub(crate) fn expansion_dir_name(self, container: &Path) -> Option<String> {
        let file_name = container.file_name()?.to_str()?;
        Some(match self {
            Self::Archive => format!("{file_name}.expanded"),
            Self::DiskImage => format!("{file_name}.extracted"),
        })
    }
}

/// The installable unit discovered inside a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Artifact {
    /// `.app` directory carrying `Contents/Info.plist`
    Bundle(PathBuf),
    /// Single-file `.pkg` installer
    FlatPackage(PathBuf),
}

impl Artifact {
    /// Classifies a filesystem entry. Bundles must be directories and flat
    /// packages must be regular files.
    pub fn from_entry(path: &Path, is_dir: bool, is_file: bool) -> Option<Self> {
        if is_dir && has_extension(path, BUNDLE_EXT) {
            Some(Self::Bundle(path.to_path_buf()))
        } else if is_file && has_extension(path, FLAT_PACKAGE_EXT) {
            Some(Self::FlatPackage(path.to_path_buf()))
        } else {
            None
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Bundle(path) | Self::FlatPackage(path) => path,
        }
    }

    /// Extension of the canonical file produced from this artifact.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Self::Bundle(_) => DISK_IMAGE_EXT,
            Self::FlatPackage(_) => FLAT_PACKAGE_EXT,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bundle(path) => write!(f, "bundle {}", path.display()),
            Self::FlatPackage(path) => write!(f, "package {}", path.display()),
        }
    }
}

/// Resolved semantic identity of an artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Human-readable product name, unsanitized.
    pub name: String,
    /// Dotted numeric triple.
    pub version: String,
    /// Bundle or package identifier, when one was found.
    pub identifier: Option<String>,
}

/// True for dotfiles (including AppleDouble `._*` shadows) and archiver junk.
pub fn is_hidden_or_junk(name: &OsStr) -> bool {
    let Some(name) = name.to_str() else {
        return false;
    };
    name.starts_with('.') || JUNK_NAMES.contains(&name)
}

/// True when any directory above the final component of `relative` is a bundle.
///
/// Works on parsed path segments, so `Notes.application/x.pkg` or
/// `My.app.backup/x.pkg` are not mistaken for bundle contents.
pub fn lies_within_bundle(relative: &Path) -> bool {
    let mut components: Vec<Component<'_>> = relative.components().collect();
    components.pop();
    components.into_iter().any(|component| match component {
        Component::Normal(segment) => has_extension(Path::new(segment), BUNDLE_EXT),
        _ => false,
    })
}
