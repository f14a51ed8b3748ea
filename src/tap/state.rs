//! Tap release state (`state.json`) and repository version bumps.

use super::{FsContext, Result};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One published tap release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub version: String,
    /// `"Name version"` for every file in the release.
    pub updates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
}

/// Persistent release counter of the tap repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseState {
    #[serde(default = "initial_version")]
    pub version: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

fn initial_version() -> String {
    "0.0.0".to_string()
}

impl Default for ReleaseState {
    fn default() -> Self {
        Self {
            version: initial_version(),
            history: Vec::new(),
        }
    }
}

impl ReleaseState {
    /// Loads `state.json`, or the initial `0.0.0` state if it does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .fs_context("checking state file", path)?
        {
            log::debug!("No state file at {}, starting from 0.0.0", path.display());
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .fs_context("reading state file", path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the state with 4-space indentation.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;

        tokio::fs::write(path, buffer)
            .await
            .fs_context("writing state file", path)
    }

    pub fn current_version(&self) -> Result<Version> {
        Ok(Version::parse(&self.version)?)
    }

    /// Sets the new version and appends its history entry.
    pub fn record_release(&mut self, version: &Version, updates: Vec<String>) {
        self.version = version.to_string();
        self.history.push(HistoryEntry {
            version: version.to_string(),
            updates,
            released_at: Some(Utc::now()),
        });
    }
}

/// Which component of the tap version a release increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpKind {
    Major,
    Minor,
    Patch,
}

impl BumpKind {
    /// Major when forced, minor when any app is new to the tap, otherwise patch.
    pub fn determine(force_major: bool, any_new_cask: bool) -> Self {
        if force_major {
            Self::Major
        } else if any_new_cask {
            Self::Minor
        } else {
            Self::Patch
        }
    }

    /// Next version; lower components reset and pre-release/build are dropped.
    pub fn apply(self, current: &Version) -> Version {
        match self {
            Self::Major => Version::new(current.major + 1, 0, 0),
            Self::Minor => Version::new(current.major, current.minor + 1, 0),
            Self::Patch => Version::new(current.major, current.minor, current.patch + 1),
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}
