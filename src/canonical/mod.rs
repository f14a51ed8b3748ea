//! Artifact canonicalization engine.
//!
//! Turns arbitrary installer downloads (zip archives and disk images, possibly
//! nested) into canonical `Name-Version.ext` files:
//!
//! - [`Locator`] finds the shallowest application bundle or flat package,
//!   expanding nested containers up to a depth ceiling
//! - [`MountManager`] pairs every disk image mount with a release
//! - [`IdentityResolver`] resolves name and version through a fallback chain
//! - [`Canonicalizer`] copies or repacks the artifact under its canonical name
//! - [`Preprocessor`] runs the pipeline over an inbox directory
//!
//! External tools are reached only through the [`Platform`] trait.

pub mod archive;
pub mod artifact;
pub mod config;
pub mod error;
pub mod filename;
pub mod identity;
pub mod locator;
pub mod mount;
pub mod orchestrator;
pub mod platform;
pub mod repack;
pub mod utils;

pub use artifact::{Artifact, ContainerKind, Identity};
pub use config::EngineConfig;
pub use error::{Context, Error, ErrorExt, IdentityError, MountError, Result};
pub use filename::{CanonicalFilename, is_canonical, sanitize_name};
pub use identity::{IdentityResolver, PartialIdentity, ResolveContext};
pub use locator::Locator;
pub use mount::{MountHandle, MountManager};
pub use orchestrator::{Outcome, PreprocessSummary, Preprocessor};
pub use platform::{MacOsPlatform, Platform};
pub use repack::Canonicalizer;
