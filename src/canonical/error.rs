//! Error types for the canonicalization engine.
//!
//! Every failure below the preprocessing orchestrator is one of these variants.
//! The orchestrator logs them per inbox file; none of them ends a run.

use std::{
    fmt::Display,
    io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Result type alias for canonicalization operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to acquire a mounted view of a disk image.
#[derive(Debug, Error)]
pub enum MountError {
    /// `attach` did not finish inside the mount timeout
    #[error("mounting {} timed out after {}s", path.display(), timeout.as_secs())]
    Timeout { path: PathBuf, timeout: Duration },

    /// The attach tool ran and reported failure
    #[error("failed to attach {}: {reason}", path.display())]
    Attach { path: PathBuf, reason: String },
}

/// Failure to resolve a usable name/version pair for an artifact.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No strategy produced a dotted-triple version
    #[error("no version could be resolved for {}", path.display())]
    VersionUnresolved { path: PathBuf },

    /// The resolved name contains no ASCII letters or digits
    #[error("name {name:?} for {} has no characters usable in a filename", path.display())]
    NameUnresolved { path: PathBuf, name: String },
}

/// Main error type for the canonicalization engine
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Mount(#[from] MountError),

    /// Archive was corrupt, unsupported, or could not be written out
    #[error("failed to expand {}: {reason}", path.display())]
    Extract { path: PathBuf, reason: String },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The packaging tool failed to produce the canonical artifact
    #[error("failed to repack {}: {reason}", path.display())]
    Repack { path: PathBuf, reason: String },

    /// IO error annotated with the operation and path involved
    #[error("{context} ({}): {source}", path.display())]
    Fs {
        context: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("plist error: {0}")]
    Plist(#[from] plist::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("path error: {0}")]
    StripPrefix(#[from] std::path::StripPrefixError),

    /// Error wrapped with a higher-level description
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    GenericError(String),
}

/// Attach a human-readable description to a failure.
pub trait Context<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|source| Error::Context {
            context: context.to_string(),
            source: Box::new(source),
        })
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|source| Error::Context {
            context: f().to_string(),
            source: Box::new(source),
        })
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Annotate IO failures with the filesystem path they concern.
pub trait ErrorExt<T> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| Error::Fs {
            context: context.to_string(),
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

/// Return early with a [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::canonical::Error::GenericError(format!($msg)))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::canonical::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
