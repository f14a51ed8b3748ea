//! Homebrew cask generation and update.
//!
//! New apps get a cask rendered from [`CASK_TEMPLATE`]; existing casks have
//! their `version`, `sha256` and `url` stanzas rewritten in place so any
//! hand edits elsewhere in the file survive.

use super::checksum::calculate_sha256;
use super::upload::ReleaseFile;
use super::{FsContext, Result, Workspace};
use handlebars::Handlebars;
use regex::{NoExpand, Regex};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Cask for an app released through the tap for the first time.
pub const CASK_TEMPLATE: &str = r#"cask "{{token}}" do
  version "{{version}}"
  sha256 "{{sha256}}"

  url "{{url}}"
  name "{{name}}"
  desc "{{name}} App"
  homepage "{{homepage}}"

  app "{{name}}.app"

  # Zap stanza is optional
  # zap trash: "~/Library/Application Support/{{name}}"
end
"#;

static WORD_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("word boundary pattern is valid"));
static LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("case boundary pattern is valid"));

static VERSION_STANZA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"version\s+"[^"]+""#).expect("version stanza pattern is valid"));
static SHA256_STANZA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sha256\s+"[^"]+""#).expect("sha256 stanza pattern is valid"));
static URL_STANZA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\s+"[^"]+""#).expect("url stanza pattern is valid"));

/// Converts a CamelCase app name into a cask token (`MyTool` -> `my-tool`).
pub fn camel_to_kebab(name: &str) -> String {
    let first = WORD_BOUNDARY.replace_all(name, "$1-$2");
    LOWER_UPPER.replace_all(&first, "$1-$2").to_lowercase()
}

/// Release asset URL for `filename` in tap release `v<tap_version>`.
pub fn download_url(repository: &str, tap_version: &str, filename: &str) -> String {
    format!("https://github.com/{repository}/releases/download/v{tap_version}/{filename}")
}

/// Whether any file introduces an app the tap has no cask for yet.
pub fn any_new_cask(workspace: &Workspace, files: &[ReleaseFile]) -> bool {
    files
        .iter()
        .any(|file| !workspace.cask_path(&camel_to_kebab(&file.name)).exists())
}

/// Renders a cask for a new app.
pub fn render_new_cask(
    token: &str,
    file: &ReleaseFile,
    sha256: &str,
    url: &str,
    repository: &str,
) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    let mut data = BTreeMap::new();
    data.insert("token", token.to_string());
    data.insert("version", file.version.clone());
    data.insert("sha256", sha256.to_string());
    data.insert("url", url.to_string());
    data.insert("name", file.name.clone());
    data.insert("homepage", format!("https://github.com/{repository}"));

    Ok(handlebars.render_template(CASK_TEMPLATE, &data)?)
}

/// Rewrites the `version`, `sha256` and `url` stanzas of an existing cask.
pub fn update_existing_cask(content: &str, version: &str, sha256: &str, url: &str) -> String {
    let content = VERSION_STANZA.replace_all(content, NoExpand(&format!(r#"version "{version}""#)));
    let content = SHA256_STANZA.replace_all(&content, NoExpand(&format!(r#"sha256 "{sha256}""#)));
    URL_STANZA
        .replace_all(&content, NoExpand(&format!(r#"url "{url}""#)))
        .into_owned()
}

/// Whether a cask is being created or rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaskChange {
    Created,
    Updated,
}

/// Planned content of one cask file.
#[derive(Debug, Clone)]
pub struct CaskPlan {
    pub token: String,
    pub path: PathBuf,
    pub file: ReleaseFile,
    pub sha256: String,
    pub url: String,
    pub change: CaskChange,
    pub content: String,
}

impl CaskPlan {
    /// Release-notes line: `**Name**: Updated to vX` or `**Name**: Initial Release (vX)`.
    pub fn log_line(&self) -> String {
        match self.change {
            CaskChange::Updated => format!("**{}**: Updated to v{}", self.file.name, self.file.version),
            CaskChange::Created => {
                format!("**{}**: Initial Release (v{})", self.file.name, self.file.version)
            }
        }
    }
}

/// Computes the cask change for every release file without writing anything.
pub async fn plan_casks(
    workspace: &Workspace,
    files: &[ReleaseFile],
    repository: &str,
    tap_version: &str,
) -> Result<Vec<CaskPlan>> {
    let mut plans = Vec::with_capacity(files.len());

    for file in files {
        let sha256 = calculate_sha256(&file.path).await?;
        let token = camel_to_kebab(&file.name);
        let path = workspace.cask_path(&token);
        let url = download_url(repository, tap_version, &file.filename);

        let (change, content) = if path.exists() {
            let existing = tokio::fs::read_to_string(&path)
                .await
                .fs_context("reading cask", &path)?;
            (
                CaskChange::Updated,
                update_existing_cask(&existing, &file.version, &sha256, &url),
            )
        } else {
            (
                CaskChange::Created,
                render_new_cask(&token, file, &sha256, &url, repository)?,
            )
        };

        plans.push(CaskPlan {
            token,
            path,
            file: file.clone(),
            sha256,
            url,
            change,
            content,
        });
    }

    Ok(plans)
}

/// Writes planned casks and returns their release-notes lines.
pub async fn apply_casks(workspace: &Workspace, plans: &[CaskPlan]) -> Result<Vec<String>> {
    let casks_dir = workspace.casks_dir();
    tokio::fs::create_dir_all(&casks_dir)
        .await
        .fs_context("creating Casks directory", &casks_dir)?;

    let mut updates = Vec::with_capacity(plans.len());
    for plan in plans {
        match plan.change {
            CaskChange::Created => log::info!("Creating Cask: {}.rb", plan.token),
            CaskChange::Updated => log::info!("Updating Cask: {}.rb", plan.token),
        }
        tokio::fs::write(&plan.path, &plan.content)
            .await
            .fs_context("writing cask", &plan.path)?;
        updates.push(plan.log_line());
    }
    Ok(updates)
}
