//! Inbox preprocessing.
//!
//! This module provides the [`Preprocessor`] that turns every non-canonical
//! container in an inbox directory into a canonical `Name-Version.ext` file,
//! or leaves it untouched when that is not possible.

use super::config::EngineConfig;
use super::error::{Context, ErrorExt, Result};
use super::filename::is_canonical;
use super::identity::{IdentityResolver, ResolveContext};
use super::locator::Locator;
use super::platform::Platform;
use super::repack::Canonicalizer;
use super::utils::fs;
use crate::bail;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Extensions the inbox accepts as input containers.
const INPUT_EXTENSIONS: [&str; 3] = ["zip", "dmg", "pkg"];

/// What happened to a single inbox file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Replaced by the canonical file at the given path.
    Canonicalized(PathBuf),
    /// Already canonical, hidden, or not a recognized container.
    Skipped,
    /// Left in place; the reason is logged.
    Failed(String),
}

/// Per-run tally returned by [`Preprocessor::preprocess_all`].
#[derive(Debug, Default, Clone)]
pub struct PreprocessSummary {
    /// Original inbox path and the canonical file that replaced it.
    pub canonicalized: Vec<(PathBuf, PathBuf)>,
    pub skipped: Vec<PathBuf>,
    /// Files left untouched, with the failure reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl PreprocessSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, path: PathBuf, outcome: Outcome) {
        match outcome {
            Outcome::Canonicalized(output) => self.canonicalized.push((path, output)),
            Outcome::Skipped => self.skipped.push(path),
            Outcome::Failed(reason) => self.failed.push((path, reason)),
        }
    }
}

/// Inbox preprocessing orchestrator.
///
/// The error boundary of the canonicalization engine: each file runs the
/// full locate, resolve and repack pipeline inside its own scratch
/// workspace, and a failure on one file never stops the next.
///
/// # Examples
///
/// ```no_run
/// use tap_release_manager::canonical::{EngineConfig, MacOsPlatform, Preprocessor};
///
/// # async fn example() {
/// let preprocessor = Preprocessor::new(MacOsPlatform::new(), EngineConfig::default());
/// let summary = preprocessor.preprocess_all("upload".as_ref()).await;
/// println!("{} file(s) canonicalized", summary.canonicalized.len());
/// # }
/// ```
pub struct Preprocessor<P: Platform> {
    platform: P,
    config: EngineConfig,
}

impl<P: Platform> Preprocessor<P> {
    pub fn new(platform: P, config: EngineConfig) -> Self {
        Self { platform, config }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Processes every file directly inside `inbox`, in file name order.
    ///
    /// Never fails: an unreadable inbox is logged and yields an empty summary.
    pub async fn preprocess_all(&self, inbox: &Path) -> PreprocessSummary {
        let mut summary = PreprocessSummary::default();

        let files = match list_inbox(inbox).await {
            Ok(files) => files,
            Err(e) => {
                log::error!("Cannot read inbox {}: {}", inbox.display(), e);
                return summary;
            }
        };

        for file in files {
            let outcome = self.preprocess_file(&file).await;
            summary.record(file, outcome);
        }

        log::info!(
            "Preprocessing done: {} canonicalized, {} skipped, {} failed",
            summary.canonicalized.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        summary
    }

    /// Runs the pipeline for one inbox file.
    pub async fn preprocess_file(&self, file: &Path) -> Outcome {
        let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
            log::debug!("Skipping non-UTF-8 name {}", file.display());
            return Outcome::Skipped;
        };

        if file_name.starts_with('.') {
            return Outcome::Skipped;
        }
        if is_canonical(file_name) {
            log::debug!("{} is already canonical", file_name);
            return Outcome::Skipped;
        }
        if !is_input_container(file) {
            log::debug!("{} is not a recognized container, skipping", file_name);
            return Outcome::Skipped;
        }

        log::info!("Preprocessing {}", file_name);
        match self.canonicalize_into_inbox(file, file_name).await {
            Ok(output) => {
                log::info!("✓ {} -> {}", file_name, output.display());
                Outcome::Canonicalized(output)
            }
            Err(e) => {
                log::warn!("⚠ Leaving {} untouched: {}", file_name, e);
                Outcome::Failed(e.to_string())
            }
        }
    }

    async fn canonicalize_into_inbox(&self, file: &Path, file_name: &str) -> Result<PathBuf> {
        let inbox = file.parent().context("inbox file has no parent directory")?;

        // Deleted with all contents when dropped, on every exit path.
        let workspace = self.scratch_workspace()?;
        let input_dir = workspace.path().join("input");
        let output_dir = workspace.path().join("output");

        fs::copy_file(file, &input_dir.join(file_name)).await?;

        let locator = Locator::new(&self.platform, &self.config);
        let Some(artifact) = locator.locate(&input_dir, 0).await else {
            bail!("no application bundle or installer package found in {}", file_name);
        };

        let ctx = ResolveContext {
            original_file_name: file_name,
            scratch: workspace.path(),
        };
        let identity = IdentityResolver::new(&self.platform)
            .resolve(&artifact, &ctx)
            .await?;

        let produced = Canonicalizer::new(&self.platform)
            .canonicalize(&artifact, &identity, &output_dir)
            .await?;
        let produced_name = produced
            .file_name()
            .context("canonical output has no file name")?;

        let target = inbox.join(produced_name);
        if !target.exists() {
            fs::move_file(&produced, &target).await?;
            tokio::fs::remove_file(file)
                .await
                .fs_context("removing original inbox file", file)?;
            return Ok(target);
        }
        if !is_same_file(file, &target) {
            bail!("{} already exists in the inbox", target.display());
        }

        // The target names the original itself (case-insensitive volume), so
        // the original goes only once the canonical file sits beside it.
        let staged = inbox.join(format!(".{}.partial", produced_name.to_string_lossy()));
        fs::move_file(&produced, &staged).await?;
        tokio::fs::remove_file(file)
            .await
            .fs_context("removing original inbox file", file)?;
        fs::move_file(&staged, &target).await?;

        Ok(target)
    }

    fn scratch_workspace(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tap-preprocess-");
        match &self.config.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root).fs_context("creating scratch root", root)?;
                builder
                    .tempdir_in(root)
                    .fs_context("creating scratch workspace", root)
            }
            None => builder
                .tempdir()
                .fs_context("creating scratch workspace", std::env::temp_dir()),
        }
    }
}

#[cfg(unix)]
fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.file_name().and_then(|n| n.to_str()), b.file_name().and_then(|n| n.to_str())) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

fn is_input_container(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            INPUT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Regular files directly inside `inbox`, sorted by name.
async fn list_inbox(inbox: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(inbox)
        .await
        .fs_context("reading inbox", inbox)?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .fs_context("reading inbox entry", inbox)?
    {
        let file_type = entry
            .file_type()
            .await
            .fs_context("reading file type", entry.path())?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
