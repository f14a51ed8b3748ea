//! Name and version resolution for located artifacts.
//!
//! Each inspection strategy yields a [`PartialIdentity`]; strategies are
//! tried in priority order and merged field by field, the first non-empty
//! value winning. A later strategy only runs while a field is still missing.
//!
//! Bundle chain: `Contents/Info.plist` parsed in-process, then the CLI
//! property reader for whatever is missing, then the bundle's file stem for
//! the name. Flat package chain: the expanded package's `Distribution` or
//! `PackageInfo` descriptor, then a `-X.Y.Z` suffix in the artifact's
//! filename, then in the original inbox filename, then the file stem.

use super::artifact::{Artifact, Identity};
use super::error::{IdentityError, Result};
use super::filename::{extract_version, sanitize_name, split_version_suffix};
use super::platform::Platform;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Name keys in priority order.
const NAME_KEYS: [&str; 2] = ["CFBundleName", "CFBundleDisplayName"];
/// Version keys in priority order: user-facing first, then build number.
const VERSION_KEYS: [&str; 2] = ["CFBundleShortVersionString", "CFBundleVersion"];
const IDENTIFIER_KEY: &str = "CFBundleIdentifier";

/// Descriptor locations inside a bundle; the first existing one is used.
const INFO_PLIST_LOCATIONS: [&str; 2] = ["Contents/Info.plist", "Info.plist"];

static DESCRIPTOR_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bversion="([^"]*)""#).expect("version attribute pattern is valid"));

static DESCRIPTOR_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b(?:pkg)?id="([^"]+)""#).expect("id attribute pattern is valid"));

/// Possibly incomplete identity produced by one strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartialIdentity {
    pub name: Option<String>,
    pub version: Option<String>,
    pub identifier: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Keeps a name only if it survives sanitizing.
fn usable_name(value: Option<String>) -> Option<String> {
    non_empty(value).filter(|v| !sanitize_name(v).is_empty())
}

impl PartialIdentity {
    pub fn new(name: Option<String>, version: Option<String>) -> Self {
        Self {
            name: usable_name(name),
            version: non_empty(version).and_then(|v| extract_version(&v)),
            identifier: None,
        }
    }

    pub fn with_identifier(mut self, identifier: Option<String>) -> Self {
        self.identifier = non_empty(identifier);
        self
    }

    /// Fills each missing field from `fallback`.
    pub fn merge(self, fallback: PartialIdentity) -> Self {
        Self {
            name: self.name.or(fallback.name),
            version: self.version.or(fallback.version),
            identifier: self.identifier.or(fallback.identifier),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.version.is_some()
    }

    /// Converts into an [`Identity`], failing if the version is still missing.
    pub fn finish(self, artifact: &Path) -> std::result::Result<Identity, IdentityError> {
        let version = self.version.ok_or_else(|| IdentityError::VersionUnresolved {
            path: artifact.to_path_buf(),
        })?;
        let name = self.name.ok_or_else(|| IdentityError::NameUnresolved {
            path: artifact.to_path_buf(),
            name: String::new(),
        })?;
        Ok(Identity {
            name,
            version,
            identifier: self.identifier,
        })
    }
}

/// Picks the first key in `keys` whose value is a usable name.
fn first_name<F>(keys: &[&str], mut lookup: F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    keys.iter().find_map(|key| usable_name(lookup(key)))
}

/// Locates the bundle's identity descriptor.
pub fn info_plist_path(bundle: &Path) -> Option<PathBuf> {
    INFO_PLIST_LOCATIONS
        .iter()
        .map(|relative| bundle.join(relative))
        .find(|path| path.is_file())
}

/// Reads name, version and identifier from a parsed `Info.plist`.
pub fn read_info_plist(plist_path: &Path) -> PartialIdentity {
    let value = match plist::Value::from_file(plist_path) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("Could not parse {}: {}", plist_path.display(), e);
            return PartialIdentity::default();
        }
    };
    let Some(dict) = value.as_dictionary() else {
        log::debug!("{} is not a dictionary", plist_path.display());
        return PartialIdentity::default();
    };

    let lookup = |key: &str| {
        dict.get(key)
            .and_then(|v| v.as_string())
            .map(str::to_string)
    };
    // Each version key must hold a strict triple to count.
    let version = VERSION_KEYS
        .iter()
        .find_map(|key| lookup(key).and_then(|v| extract_version(&v)));

    PartialIdentity::new(first_name(&NAME_KEYS, lookup), version)
        .with_identifier(lookup(IDENTIFIER_KEY))
}

/// Extracts version and identifier attributes from a package descriptor.
///
/// The `<?xml version="1.0"?>` declaration never matches because only strict
/// triples are accepted; among `id`/`pkgid` values, reverse-DNS ones win.
pub fn parse_package_descriptor(text: &str) -> PartialIdentity {
    let version = DESCRIPTOR_VERSION
        .captures_iter(text)
        .find_map(|caps| extract_version(&caps[1]));

    let ids: Vec<&str> = DESCRIPTOR_ID
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    let identifier = ids
        .iter()
        .find(|id| id.contains('.'))
        .or_else(|| ids.first())
        .map(|id| id.to_string());

    PartialIdentity::new(None, version).with_identifier(identifier)
}

/// Reads the `Distribution` (product archive) or first `PackageInfo`
/// (component package) under an expanded flat package.
pub fn read_package_descriptor(expanded: &Path) -> Option<String> {
    let distribution = expanded.join("Distribution");
    if let Ok(text) = std::fs::read_to_string(&distribution) {
        return Some(text);
    }

    walkdir::WalkDir::new(expanded)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == "PackageInfo")
        .find_map(|entry| std::fs::read_to_string(entry.path()).ok())
}

/// Name and version from a filename carrying a `-X.Y.Z` suffix.
pub fn identity_from_filename(file_name: &str) -> PartialIdentity {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    match split_version_suffix(stem) {
        Some((prefix, version)) => {
            PartialIdentity::new(Some(prefix.to_string()), Some(version.to_string()))
        }
        None => PartialIdentity::default(),
    }
}

/// Per-file facts the resolver needs beyond the artifact itself.
#[derive(Clone, Debug)]
pub struct ResolveContext<'a> {
    /// Filename of the inbox file the artifact was found in.
    pub original_file_name: &'a str,
    /// Writable scratch directory owned by the current attempt.
    pub scratch: &'a Path,
}

/// Resolves artifact identities through the strategy chain.
pub struct IdentityResolver<'a, P: Platform> {
    platform: &'a P,
}

impl<'a, P: Platform> IdentityResolver<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        Self { platform }
    }

    pub async fn resolve(&self, artifact: &Artifact, ctx: &ResolveContext<'_>) -> Result<Identity> {
        let partial = match artifact {
            Artifact::Bundle(path) => self.resolve_bundle(path).await,
            Artifact::FlatPackage(path) => self.resolve_flat_package(path, ctx).await,
        };
        let identity = partial.finish(artifact.path())?;
        log::info!(
            "Resolved {} as {} {}",
            artifact.path().display(),
            identity.name,
            identity.version
        );
        Ok(identity)
    }

    async fn resolve_bundle(&self, bundle: &Path) -> PartialIdentity {
        let plist_path = info_plist_path(bundle);

        let mut partial = match &plist_path {
            Some(path) => read_info_plist(path),
            None => {
                log::debug!("{} has no Info.plist", bundle.display());
                PartialIdentity::default()
            }
        };

        if let Some(path) = plist_path.as_deref().filter(|_| !partial.is_complete()) {
            log::debug!("Falling back to property reader for {}", path.display());
            let fallback = self.read_missing_properties(path, &partial).await;
            partial = partial.merge(fallback);
        }

        let stem = bundle.file_stem().and_then(|s| s.to_str()).map(str::to_string);
        partial.merge(PartialIdentity::new(stem, None))
    }

    /// Queries the CLI reader only for the fields `known` lacks.
    async fn read_missing_properties(
        &self,
        plist_path: &Path,
        known: &PartialIdentity,
    ) -> PartialIdentity {
        let mut name = None;
        if known.name.is_none() {
            for key in NAME_KEYS {
                name = usable_name(self.platform.read_property(plist_path, key).await);
                if name.is_some() {
                    break;
                }
            }
        }

        let mut version = None;
        if known.version.is_none() {
            for key in VERSION_KEYS {
                version = self
                    .platform
                    .read_property(plist_path, key)
                    .await
                    .and_then(|v| extract_version(&v));
                if version.is_some() {
                    break;
                }
            }
        }

        PartialIdentity::new(name, version)
    }

    async fn resolve_flat_package(&self, package: &Path, ctx: &ResolveContext<'_>) -> PartialIdentity {
        let file_name = package
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let mut partial = self.inspect_package(package, ctx.scratch).await;
        partial = partial.merge(identity_from_filename(file_name));
        partial = partial.merge(identity_from_filename(ctx.original_file_name));

        let stem = package.file_stem().and_then(|s| s.to_str()).map(str::to_string);
        partial = partial.merge(PartialIdentity::new(stem, None));

        // Reverse-DNS identifier as a last resort for the name.
        let id_tail = partial
            .identifier
            .as_deref()
            .and_then(|id| id.rsplit('.').next())
            .map(str::to_string);
        partial.merge(PartialIdentity::new(id_tail, None))
    }

    /// Expands the package and parses its descriptor. Any failure leaves
    /// both fields unresolved for the filename strategies to fill.
    async fn inspect_package(&self, package: &Path, scratch: &Path) -> PartialIdentity {
        let holder = match tempfile::Builder::new()
            .prefix("pkg-")
            .tempdir_in(scratch)
        {
            Ok(dir) => dir,
            Err(e) => {
                log::warn!("Cannot create package scratch in {}: {}", scratch.display(), e);
                return PartialIdentity::default();
            }
        };
        let dest = holder.path().join("expanded");

        if let Err(e) = self.platform.expand_package(package, &dest).await {
            log::warn!("Could not expand {}: {}", package.display(), e);
            return PartialIdentity::default();
        }

        match read_package_descriptor(&dest) {
            Some(text) => parse_package_descriptor(&text),
            None => {
                log::debug!("{} has no Distribution or PackageInfo", package.display());
                PartialIdentity::default()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::canonical::archive::tests::write_zip;
    use crate::canonical::error::Error;
    use crate::canonical::platform::fake::FakePlatform;
    use std::fs;

    pub(crate) fn info_plist(entries: &[(&str, &str)]) -> String {
        let body: String = entries
            .iter()
            .map(|(k, v)| format!("    <key>{k}</key>\n    <string>{v}</string>\n"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
{body}</dict>
</plist>"#
        )
    }

    fn make_bundle(root: &Path, name: &str, plist: Option<&str>) -> PathBuf {
        let bundle = root.join(name);
        fs::create_dir_all(bundle.join("Contents")).unwrap();
        if let Some(plist) = plist {
            fs::write(bundle.join("Contents/Info.plist"), plist).unwrap();
        }
        bundle
    }

    #[test]
    fn merge_takes_first_non_empty_value_per_field() {
        let first = PartialIdentity::new(Some("Tool".into()), None);
        let second = PartialIdentity::new(Some("Other".into()), Some("1.2.3".into()));
        let merged = first.merge(second);
        assert_eq!(merged.name.as_deref(), Some("Tool"));
        assert_eq!(merged.version.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn descriptor_parsing_skips_xml_declaration() {
        let text = r#"<?xml version="1.0" encoding="utf-8"?>
<installer-gui-script minSpecVersion="1">
    <choice id="default"/>
    <pkg-ref id="com.acme.tool" version="4.5.6" onConclusion="none">tool.pkg</pkg-ref>
</installer-gui-script>"#;
        let partial = parse_package_descriptor(text);
        assert_eq!(partial.version.as_deref(), Some("4.5.6"));
        assert_eq!(partial.identifier.as_deref(), Some("com.acme.tool"));
    }

    #[test]
    fn package_info_pkgid_is_recognized() {
        let text = r#"<pkg-info format-version="2" identifier="com.acme.cli" version="0.9.1" pkgid="com.acme.cli"/>"#;
        let partial = parse_package_descriptor(text);
        assert_eq!(partial.version.as_deref(), Some("0.9.1"));
        assert_eq!(partial.identifier.as_deref(), Some("com.acme.cli"));
    }

    #[tokio::test]
    async fn complete_info_plist_needs_no_cli_fallback() {
        let temp = tempfile::tempdir().unwrap();
        let bundle = make_bundle(
            temp.path(),
            "Whatever.app",
            Some(&info_plist(&[
                ("CFBundleName", "Tool"),
                ("CFBundleDisplayName", "Tool Display"),
                ("CFBundleShortVersionString", "2.0.1"),
                ("CFBundleVersion", "2001"),
                ("CFBundleIdentifier", "com.acme.tool"),
            ])),
        );

        let platform = FakePlatform::new().with_property("CFBundleName", "Wrong");
        let ctx = ResolveContext {
            original_file_name: "Tool_2.0.1.zip",
            scratch: temp.path(),
        };
        let identity = IdentityResolver::new(&platform)
            .resolve(&Artifact::Bundle(bundle), &ctx)
            .await
            .unwrap();

        assert_eq!(identity.name, "Tool");
        assert_eq!(identity.version, "2.0.1");
        assert_eq!(identity.identifier.as_deref(), Some("com.acme.tool"));
        assert_eq!(FakePlatform::count(&platform.property_reads), 0);
    }

    #[tokio::test]
    async fn display_name_and_build_version_are_secondary_keys() {
        let temp = tempfile::tempdir().unwrap();
        let bundle = make_bundle(
            temp.path(),
            "x.app",
            Some(&info_plist(&[
                ("CFBundleDisplayName", "Shown Name"),
                ("CFBundleShortVersionString", "7"),
                ("CFBundleVersion", "7.0.3"),
            ])),
        );

        let partial = read_info_plist(&bundle.join("Contents/Info.plist"));
        assert_eq!(partial.name.as_deref(), Some("Shown Name"));
        assert_eq!(partial.version.as_deref(), Some("7.0.3"));
    }

    #[test]
    fn unusable_primary_name_falls_through_to_display_name() {
        let temp = tempfile::tempdir().unwrap();
        let bundle = make_bundle(
            temp.path(),
            "x.app",
            Some(&info_plist(&[
                ("CFBundleName", "+++"),
                ("CFBundleDisplayName", "Shown Name"),
                ("CFBundleShortVersionString", "1.0.0"),
            ])),
        );

        let partial = read_info_plist(&bundle.join("Contents/Info.plist"));
        assert_eq!(partial.name.as_deref(), Some("Shown Name"));
    }

    #[tokio::test]
    async fn cli_fallback_fills_only_the_missing_field() {
        let temp = tempfile::tempdir().unwrap();
        let bundle = make_bundle(
            temp.path(),
            "Tool.app",
            Some(&info_plist(&[("CFBundleName", "Tool")])),
        );

        let platform = FakePlatform::new()
            .with_property("CFBundleName", "Wrong")
            .with_property("CFBundleShortVersionString", "3.1.4");
        let ctx = ResolveContext {
            original_file_name: "Tool.zip",
            scratch: temp.path(),
        };
        let identity = IdentityResolver::new(&platform)
            .resolve(&Artifact::Bundle(bundle), &ctx)
            .await
            .unwrap();

        assert_eq!(identity.name, "Tool");
        assert_eq!(identity.version, "3.1.4");
        assert_eq!(FakePlatform::count(&platform.property_reads), 1);
    }

    #[tokio::test]
    async fn unparseable_plist_falls_back_to_cli_and_stem() {
        let temp = tempfile::tempdir().unwrap();
        let bundle = make_bundle(temp.path(), "Stem Name.app", Some("not a plist"));

        let platform = FakePlatform::new().with_property("CFBundleVersion", "5.0.0");
        let ctx = ResolveContext {
            original_file_name: "x.zip",
            scratch: temp.path(),
        };
        let identity = IdentityResolver::new(&platform)
            .resolve(&Artifact::Bundle(bundle), &ctx)
            .await
            .unwrap();

        assert_eq!(identity.name, "Stem Name");
        assert_eq!(identity.version, "5.0.0");
    }

    #[tokio::test]
    async fn bundle_without_version_is_unresolved() {
        let temp = tempfile::tempdir().unwrap();
        let bundle = make_bundle(
            temp.path(),
            "Tool.app",
            Some(&info_plist(&[("CFBundleName", "Tool")])),
        );

        let platform = FakePlatform::new();
        let ctx = ResolveContext {
            original_file_name: "Tool-9.9.9.zip",
            scratch: temp.path(),
        };
        let err = IdentityResolver::new(&platform)
            .resolve(&Artifact::Bundle(bundle), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Identity(IdentityError::VersionUnresolved { .. })
        ));
    }

    #[tokio::test]
    async fn package_descriptor_version_is_preferred() {
        let temp = tempfile::tempdir().unwrap();
        let pkg = temp.path().join("Tool-1.0.0.pkg");
        write_zip(
            &pkg,
            &[(
                "Distribution",
                br#"<installer-gui-script><pkg-ref id="com.acme.tool" version="1.2.0"/></installer-gui-script>"#,
            )],
        );

        let platform = FakePlatform::new();
        let ctx = ResolveContext {
            original_file_name: "download.zip",
            scratch: temp.path(),
        };
        let identity = IdentityResolver::new(&platform)
            .resolve(&Artifact::FlatPackage(pkg), &ctx)
            .await
            .unwrap();

        assert_eq!(identity.name, "Tool");
        assert_eq!(identity.version, "1.2.0");
        assert_eq!(FakePlatform::count(&platform.packages_expanded), 1);
    }

    #[tokio::test]
    async fn package_version_recovered_from_own_filename() {
        let temp = tempfile::tempdir().unwrap();
        let pkg = temp.path().join("App-3.4.5.pkg");
        write_zip(
            &pkg,
            &[(
                "Distribution",
                br#"<installer-gui-script minSpecVersion="1"><title>App</title></installer-gui-script>"#,
            )],
        );

        let platform = FakePlatform::new();
        let ctx = ResolveContext {
            original_file_name: "whatever.zip",
            scratch: temp.path(),
        };
        let identity = IdentityResolver::new(&platform)
            .resolve(&Artifact::FlatPackage(pkg), &ctx)
            .await
            .unwrap();

        assert_eq!(identity.version, "3.4.5");
        assert_eq!(identity.name, "App");
    }

    #[tokio::test]
    async fn package_version_recovered_from_original_filename() {
        let temp = tempfile::tempdir().unwrap();
        // Not a zip: expansion fails and only filenames are left.
        let pkg = temp.path().join("installer.pkg");
        fs::write(&pkg, b"xar!").unwrap();

        let platform = FakePlatform::new();
        let ctx = ResolveContext {
            original_file_name: "Widget-2.2.2.zip",
            scratch: temp.path(),
        };
        let identity = IdentityResolver::new(&platform)
            .resolve(&Artifact::FlatPackage(pkg), &ctx)
            .await
            .unwrap();

        assert_eq!(identity.version, "2.2.2");
        assert_eq!(identity.name, "Widget");
    }

    #[tokio::test]
    async fn package_without_any_version_is_unresolved() {
        let temp = tempfile::tempdir().unwrap();
        let pkg = temp.path().join("installer.pkg");
        fs::write(&pkg, b"xar!").unwrap();

        let platform = FakePlatform::new();
        let ctx = ResolveContext {
            original_file_name: "installer.pkg",
            scratch: temp.path(),
        };
        let err = IdentityResolver::new(&platform)
            .resolve(&Artifact::FlatPackage(pkg), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Identity(IdentityError::VersionUnresolved { .. })
        ));
    }
}
