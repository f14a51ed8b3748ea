//! `release`: publish everything in the upload folder.
//!
//! Phases: validate the inbox, compute the tap version bump, write casks and
//! state, commit and push, create the GitHub release with its assets, then
//! move the released files to `uploaded/`.

use super::preprocess::preprocess_inbox;
use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::tap::cask::{any_new_cask, apply_casks, plan_casks};
use crate::tap::git::{commit_and_push, commit_message, resolve_repository};
use crate::tap::github::{GitHubClient, release_notes};
use crate::tap::{BumpKind, CaskChange, ReleaseState, TapError, Workspace, archive_released, scan_upload_folder};

/// Options of the `release` subcommand.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    pub major: bool,
    pub dry_run: bool,
    pub no_preprocess: bool,
    pub token: Option<String>,
    pub repository: Option<String>,
}

pub async fn run_release(options: &ReleaseOptions, config: &RuntimeConfig) -> Result<i32> {
    let workspace = Workspace::new(config.root());

    // Token and repository are checked before anything is written.
    let token = options
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if token.is_none() && !options.dry_run {
        return Err(TapError::MissingToken.into());
    }
    let repository = resolve_repository(options.repository.as_deref(), workspace.root()).await?;
    config.verbose_println(&format!("Repository: {repository}"))?;

    if options.dry_run {
        config.verbose_println("Dry run: skipping preprocessing")?;
    } else if !options.no_preprocess {
        preprocess_inbox(&workspace.upload_dir(), config).await?;
    }

    config.section("Validating upload folder")?;
    let files = scan_upload_folder(&workspace.upload_dir())?;
    if files.is_empty() {
        config.progress("No files found in upload/ folder.")?;
        return Ok(0);
    }
    config.progress(&format!("Found {} files in upload/...", files.len()))?;

    let mut state = ReleaseState::load(&workspace.state_file()).await?;
    let current = state.current_version()?;
    let bump = BumpKind::determine(options.major, any_new_cask(&workspace, &files));
    let next = bump.apply(&current);
    config.indent(&format!("Current Repo Version: {current}"))?;
    config.indent(&format!("New Repo Version:     {next} ({bump})"))?;

    let plans = plan_casks(&workspace, &files, &repository, &next.to_string()).await?;

    if options.dry_run {
        config.section("Planned cask changes")?;
        for plan in &plans {
            let verb = match plan.change {
                CaskChange::Created => "create",
                CaskChange::Updated => "update",
            };
            config.indent(&format!("{verb} Casks/{}.rb -> {} ({})", plan.token, plan.file.version, plan.sha256))?;
            config.verbose_println(&plan.content)?;
        }
        config.success("Dry run complete; nothing was written")?;
        return Ok(0);
    }

    let Some(token) = token else {
        return Err(TapError::MissingToken.into());
    };
    let github = GitHubClient::new(token, &repository)?;

    config.section("Updating casks")?;
    let updates = apply_casks(&workspace, &plans).await?;
    for line in &updates {
        config.indent(line)?;
    }

    state.record_release(
        &next,
        files
            .iter()
            .map(|f| format!("{} {}", f.name, f.version))
            .collect(),
    );
    state.save(&workspace.state_file()).await?;

    config.section("Publishing")?;
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    let message = commit_message(&names, &next.to_string());
    let committed = commit_and_push(
        workspace.root(),
        &[workspace.casks_dir(), workspace.state_file()],
        &message,
    )
    .await?;
    if committed {
        config.success(&format!("Committed and pushed: {message}"))?;
    } else {
        config.progress("No changes to commit; pushed existing history")?;
    }

    let tag = format!("v{next}");
    let release = github
        .create_release(&tag, &format!("Release {tag}"), &release_notes(&updates))
        .await?;
    for file in &files {
        github.upload_asset(&release, &file.path).await?;
        config.indent(&format!("Uploaded {}", file.filename))?;
    }
    config.success(&format!("Created release {} ({})", tag, release.html_url))?;

    archive_released(&workspace, &files).await?;
    config.success("Release automation complete!")?;
    Ok(0)
}
