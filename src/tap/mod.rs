//! Homebrew tap release management.
//!
//! Everything downstream of canonicalization: validating the inbox, hashing
//! release files, writing casks, bumping the tap's own version, and
//! publishing through git and GitHub releases.

pub mod cask;
pub mod checksum;
pub mod git;
pub mod github;
pub mod state;
pub mod upload;

pub use cask::{CaskChange, CaskPlan, camel_to_kebab};
pub use checksum::calculate_sha256;
pub use state::{BumpKind, ReleaseState};
pub use upload::{ReleaseFile, list_upload_folder, scan_upload_folder};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for tap operations
pub type Result<T> = std::result::Result<T, TapError>;

/// Errors raised while preparing or publishing a release
#[derive(Debug, Error)]
pub enum TapError {
    /// A file in the inbox does not follow `AppName-Version.ext`
    #[error("invalid filename '{file}': must match format 'AppName-Version.ext' (e.g., MyTool-1.0.2.dmg)")]
    InvalidFilename { file: String },

    /// Neither `GITHUB_REPOSITORY` nor the origin remote names a repository
    #[error("could not determine the GitHub repository from GITHUB_REPOSITORY or the git remote")]
    RepositoryUnknown,

    /// Publishing needs `GITHUB_TOKEN`
    #[error("GITHUB_TOKEN not found in the environment")]
    MissingToken,

    /// A git command failed
    #[error("git {command} failed: {reason}")]
    Git { command: String, reason: String },

    /// GitHub answered with a non-success status
    #[error("GitHub API {operation} failed ({status}): {message}")]
    GitHub {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{context} ({}): {source}", path.display())]
    Fs {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("version error: {0}")]
    Semver(#[from] semver::Error),

    #[error("cask template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error(transparent)]
    Engine(#[from] crate::canonical::Error),
}

pub(crate) trait FsContext<T> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> FsContext<T> for std::io::Result<T> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| TapError::Fs {
            context: context.to_string(),
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

/// Directory layout of a tap repository.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Inbox of files waiting to be released.
    pub fn upload_dir(&self) -> PathBuf {
        self.root.join("upload")
    }

    /// Where released files are moved after publishing.
    pub fn uploaded_dir(&self) -> PathBuf {
        self.root.join("uploaded")
    }

    pub fn casks_dir(&self) -> PathBuf {
        self.root.join("Casks")
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.json")
    }

    /// `Casks/<token>.rb`
    pub fn cask_path(&self, token: &str) -> PathBuf {
        self.casks_dir().join(format!("{token}.rb"))
    }
}

/// Moves each released file into `uploaded/`.
pub async fn archive_released(workspace: &Workspace, files: &[ReleaseFile]) -> Result<Vec<PathBuf>> {
    let uploaded = workspace.uploaded_dir();
    tokio::fs::create_dir_all(&uploaded)
        .await
        .fs_context("creating uploaded directory", &uploaded)?;

    let mut moved = Vec::with_capacity(files.len());
    for file in files {
        let dest = uploaded.join(&file.filename);
        log::info!("Moving {} to uploaded/", file.filename);
        crate::canonical::utils::fs::move_file(&file.path, &dest).await?;
        moved.push(dest);
    }
    Ok(moved)
}
