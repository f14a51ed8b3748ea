//! Top-level error types for the release manager.
//!
//! Engine and tap errors are wrapped here so the CLI has a single type to
//! report and turn into an exit code.

use thiserror::Error;

/// Result type alias for release manager operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release manager operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Canonicalization engine errors
    #[error("Canonicalization error: {0}")]
    Canonical(#[from] crate::canonical::Error),

    /// Tap release errors
    #[error("{0}")]
    Tap(#[from] crate::tap::TapError),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Actionable hints printed after the error itself
    pub fn recovery_suggestions(&self) -> Vec<String> {
        use crate::tap::TapError;
        match self {
            Self::Tap(TapError::MissingToken) => vec![
                "Export GITHUB_TOKEN or add it to the environment of the release job".to_string(),
            ],
            Self::Tap(TapError::RepositoryUnknown) => vec![
                "Set GITHUB_REPOSITORY=owner/repo or configure a GitHub origin remote".to_string(),
            ],
            Self::Tap(TapError::InvalidFilename { .. }) => vec![
                "Run `tap_release_manager preprocess` to canonicalize the upload folder".to_string(),
                "Rename the file by hand to AppName-X.Y.Z.ext".to_string(),
            ],
            Self::Tap(TapError::Git { .. }) => vec![
                "SSH: eval \"$(ssh-agent -s)\" && ssh-add ~/.ssh/id_rsa".to_string(),
                "HTTPS: git config --global credential.helper store".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
