//! Canonical `Name-Version.ext` filenames.
//!
//! The acceptance pattern here is the same one the cask generator validates
//! uploads against, so anything this module produces is publishable as-is.

use super::error::IdentityError;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

static CANONICAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[a-zA-Z0-9]+)-(?P<version>\d+\.\d+\.\d+)\.(?P<ext>dmg|pkg|zip)$")
        .expect("canonical filename pattern is valid")
});

static VERSION_TRIPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("version pattern is valid"));

static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d+\.\d+\.\d+)").expect("version suffix pattern is valid"));

/// A validated `SanitizedName-Version.ext` filename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalFilename {
    name: String,
    version: String,
    extension: String,
}

impl CanonicalFilename {
    /// Parses a filename that already follows the canonical form.
    pub fn parse(file_name: &str) -> Option<Self> {
        let captures = CANONICAL_PATTERN.captures(file_name)?;
        Some(Self {
            name: captures["name"].to_string(),
            version: captures["version"].to_string(),
            extension: captures["ext"].to_string(),
        })
    }

    /// Builds a canonical filename from a raw product name.
    ///
    /// The name is sanitized first; a name with nothing left after
    /// sanitizing is rejected rather than producing `-1.2.3.dmg`.
    pub fn build(
        artifact: &Path,
        raw_name: &str,
        version: &str,
        extension: &str,
    ) -> Result<Self, IdentityError> {
        let name = sanitize_name(raw_name);
        if name.is_empty() {
            return Err(IdentityError::NameUnresolved {
                path: artifact.to_path_buf(),
                name: raw_name.to_string(),
            });
        }
        let candidate = format!("{name}-{version}.{extension}");
        Self::parse(&candidate).ok_or_else(|| IdentityError::VersionUnresolved {
            path: artifact.to_path_buf(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl fmt::Display for CanonicalFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.name, self.version, self.extension)
    }
}

/// True if `file_name` already matches the acceptance pattern.
pub fn is_canonical(file_name: &str) -> bool {
    CANONICAL_PATTERN.is_match(file_name)
}

/// Deletes every character outside `[A-Za-z0-9]`.
pub fn sanitize_name(name: &str) -> String {
    name.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// First strict `X.Y.Z` triple inside `text`.
///
/// Pre-release and build suffixes are never part of the result, and
/// two-component versions such as `2.0` are not accepted.
pub fn extract_version(text: &str) -> Option<String> {
    VERSION_TRIPLE.find(text).map(|m| m.as_str().to_string())
}

/// Splits `App-3.4.5` (or `App-3.4.5-beta`) into `("App", "3.4.5")`.
pub fn split_version_suffix(stem: &str) -> Option<(&str, &str)> {
    let captures = VERSION_SUFFIX.captures(stem)?;
    let whole = captures.get(0)?;
    let version = captures.get(1)?;
    Some((&stem[..whole.start()], version.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_only_the_canonical_form() {
        let parsed = CanonicalFilename::parse("MyTool-1.0.2.dmg").unwrap();
        assert_eq!(parsed.name(), "MyTool");
        assert_eq!(parsed.version(), "1.0.2");
        assert_eq!(parsed.extension(), "dmg");

        for rejected in [
            "My_Tool-1.0.2.dmg",
            "MyTool-1.0.dmg",
            "MyTool-1.0.2-beta.dmg",
            "MyTool-1.0.2.tar.gz",
            "-1.0.2.pkg",
            "Tool_2.0.1.zip",
        ] {
            assert!(!is_canonical(rejected), "{rejected} should be rejected");
        }
    }

    #[test]
    fn sanitize_strips_everything_but_ascii_alphanumerics() {
        assert_eq!(sanitize_name("Visual Studio Code"), "VisualStudioCode");
        assert_eq!(sanitize_name("Café-Tool 2"), "CafTool2");
        assert_eq!(sanitize_name("123"), "123");
        assert_eq!(sanitize_name("***"), "");
    }

    #[test]
    fn build_rejects_names_that_sanitize_to_nothing() {
        let err = CanonicalFilename::build(Path::new("x.app"), "★★★", "1.0.0", "dmg").unwrap_err();
        assert!(matches!(err, IdentityError::NameUnresolved { .. }));
    }

    #[test]
    fn build_output_always_matches_acceptance_pattern() {
        for (name, version, ext) in [
            ("Tool", "2.0.1", "dmg"),
            ("My Fancy App!", "10.20.30", "pkg"),
            ("123", "0.0.1", "zip"),
        ] {
            let built = CanonicalFilename::build(Path::new("a"), name, version, ext).unwrap();
            assert!(is_canonical(&built.to_string()), "{built}");
        }
    }

    #[test]
    fn build_rejects_non_triple_versions() {
        let err = CanonicalFilename::build(Path::new("a"), "Tool", "2.0", "dmg").unwrap_err();
        assert!(matches!(err, IdentityError::VersionUnresolved { .. }));
    }

    #[test]
    fn version_extraction_is_strict() {
        assert_eq!(extract_version("2.0.1 (build 77)").as_deref(), Some("2.0.1"));
        assert_eq!(extract_version("1.2.3-rc.1").as_deref(), Some("1.2.3"));
        assert_eq!(extract_version("2.0"), None);
        assert_eq!(extract_version("1.0"), None);
    }

    #[test]
    fn version_suffix_splits_name_prefix() {
        assert_eq!(split_version_suffix("App-3.4.5"), Some(("App", "3.4.5")));
        assert_eq!(
            split_version_suffix("Big-App-1.2.3-universal"),
            Some(("Big-App", "1.2.3"))
        );
        assert_eq!(split_version_suffix("Tool_2.0.1"), None);
    }
}
