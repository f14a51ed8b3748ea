//! Command line argument parsing and validation.
//!
//! This module provides CLI argument parsing using clap, with the runtime
//! configuration derived from it.

use clap::{Parser, Subcommand};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Homebrew tap release manager
#[derive(Parser, Debug)]
#[command(
    name = "tap_release_manager",
    version,
    about = "Canonicalizes macOS installers and publishes them to a Homebrew tap",
    long_about = "Normalizes downloaded installers (zip archives, disk images, flat packages, possibly nested) in upload/ into canonical AppName-X.Y.Z.ext files, then writes casks, bumps the tap version and publishes a GitHub release.

Usage:
  tap_release_manager preprocess
  tap_release_manager check
  tap_release_manager release --dry-run
  tap_release_manager --root ~/homebrew-tap release --major"
)]
pub struct Args {
    /// Tap repository root containing upload/, Casks/ and state.json
    #[arg(short, long, global = true, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Print detailed progress
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Parent directory for scratch workspaces (default: system temp)
    #[arg(long, global = true, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Canonicalize every non-canonical container in the upload folder
    Preprocess {
        /// Inbox to process instead of <root>/upload
        #[arg(long, value_name = "DIR")]
        inbox: Option<PathBuf>,
    },

    /// Validate upload folder filenames; exits non-zero on any invalid name
    Check {
        /// Inbox to validate instead of <root>/upload
        #[arg(long, value_name = "DIR")]
        inbox: Option<PathBuf>,
    },

    /// Update casks, bump the tap version, commit, push and publish a release
    Release {
        /// Force a major version bump for the tap release
        #[arg(long)]
        major: bool,

        /// Print the planned version and cask changes without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip canonicalizing the upload folder first
        #[arg(long)]
        no_preprocess: bool,

        /// GitHub token used to create the release
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// owner/repo of the tap (default: parsed from the origin remote)
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: Option<String>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.root.as_os_str().is_empty() {
            return Err("Root cannot be empty".to_string());
        }
        if let Command::Release {
            repository: Some(repo),
            ..
        } = &self.command
        {
            let parts = repo.split('/').filter(|part| !part.is_empty()).count();
            if !repo.trim().is_empty() && parts != 2 {
                return Err(format!("Invalid repository: {repo}. Expected owner/repo"));
            }
        }
        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Absolute tap repository root
    root: PathBuf,
    scratch_dir: Option<PathBuf>,
    /// Output manager for terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        let root = absolute(&args.root);
        let scratch_dir = args.scratch_dir.as_deref().map(absolute);
        let output = super::OutputManager::new(args.verbose, args.quiet);

        Self {
            root,
            scratch_dir,
            output,
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.absolutize()
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_path_buf())
}

impl RuntimeConfig {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    /// Resolves a user-supplied path against the process working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        absolute(path)
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) -> std::io::Result<()> {
        self.output.verbose(message)
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print warning message if not in quiet mode
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.output.warn(message)
    }

    /// Print error message (always shown)
    pub fn error(&self, message: &str) -> std::io::Result<()> {
        self.output.error(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.output.indent(message)
    }
}
