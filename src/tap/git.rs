//! Git operations on the tap repository.
//!
//! Shells out to the `git` binary so the user's credential helpers and SSH
//! agent apply to the push.

use super::{Result, TapError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::process::Command;

static GITHUB_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com[:/](.+?)/(.+?)(\.git)?$").expect("GitHub remote pattern is valid")
});

/// Remote and branch every release is pushed to.
pub const REMOTE: &str = "origin";
pub const BRANCH: &str = "main";

async fn run_git(repo: &Path, args: &[&str]) -> Result<String> {
    let command = args.first().copied().unwrap_or_default().to_string();
    log::debug!("git {}", args.join(" "));

    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .await
        .map_err(|e| TapError::Git {
            command: command.clone(),
            reason: format!("failed to execute git: {e}"),
        })?;

    if !output.status.success() {
        return Err(TapError::Git {
            command,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extracts `owner/repo` from an SSH or HTTPS GitHub remote URL.
pub fn parse_github_repository(remote_url: &str) -> Option<String> {
    let captures = GITHUB_REMOTE.captures(remote_url.trim())?;
    Some(format!("{}/{}", &captures[1], &captures[2]))
}

/// `remote.origin.url`, if configured.
pub async fn remote_url(repo: &Path) -> Option<String> {
    run_git(repo, &["config", "--get", "remote.origin.url"])
        .await
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

/// Repository name from `GITHUB_REPOSITORY`, else from the origin remote.
pub async fn resolve_repository(from_env: Option<&str>, repo: &Path) -> Result<String> {
    if let Some(name) = from_env.map(str::trim).filter(|name| !name.is_empty()) {
        return Ok(name.to_string());
    }
    remote_url(repo)
        .await
        .as_deref()
        .and_then(parse_github_repository)
        .ok_or(TapError::RepositoryUnknown)
}

/// `Update apps: A, B (Bump to vX)`
pub fn commit_message(app_names: &[&str], tap_version: &str) -> String {
    format!(
        "Update apps: {} (Bump to v{})",
        app_names.join(", "),
        tap_version
    )
}

/// Stages `paths`, commits when anything changed, and pushes to origin/main.
///
/// Returns whether a commit was created.
pub async fn commit_and_push(repo: &Path, paths: &[PathBuf], message: &str) -> Result<bool> {
    let mut add_args = vec!["add".to_string()];
    add_args.extend(paths.iter().map(|p| p.display().to_string()));
    let add_args: Vec<&str> = add_args.iter().map(String::as_str).collect();
    run_git(repo, &add_args).await?;

    let status = run_git(repo, &["status", "--porcelain"]).await?;
    let committed = if status.trim().is_empty() {
        log::info!("No changes to commit. Skipping git commit.");
        false
    } else {
        run_git(repo, &["commit", "-m", message]).await?;
        true
    };

    log::info!("Pushing to {}/{}", REMOTE, BRANCH);
    run_git(repo, &["push", REMOTE, BRANCH]).await?;
    Ok(committed)
}
