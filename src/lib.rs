//! Homebrew tap release manager library
//!
//! Normalizes arbitrary macOS installer downloads into canonical
//! `Name-Version.ext` files and publishes them to a Homebrew tap:
//! - [`canonical`]: locate, identify and repack installers from nested
//!   zip archives and disk images
//! - [`tap`]: validate the upload folder, write casks, bump the tap version,
//!   and publish a GitHub release
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod canonical;
pub mod cli;
pub mod error;
pub mod tap;

// Re-export commonly used types
pub use error::{CliError, ReleaseError, Result};
