//! Command line interface for the tap release manager.
//!
//! Parses arguments, builds the runtime configuration and dispatches to the
//! subcommand implementations in [`commands`].

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, RuntimeConfig};
pub use output::OutputManager;

use crate::error::{CliError, Result};
use commands::ReleaseOptions;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;
    let config = RuntimeConfig::from(&args);

    log::debug!("Tap root: {}", config.root().display());

    match &args.command {
        Command::Preprocess { inbox } => {
            let inbox = inbox_or_default(inbox.as_deref(), &config);
            commands::run_preprocess(&inbox, &config).await
        }
        Command::Check { inbox } => {
            let inbox = inbox_or_default(inbox.as_deref(), &config);
            commands::run_check(&inbox, &config).await
        }
        Command::Release {
            major,
            dry_run,
            no_preprocess,
            token,
            repository,
        } => {
            let options = ReleaseOptions {
                major: *major,
                dry_run: *dry_run,
                no_preprocess: *no_preprocess,
                token: token.clone(),
                repository: repository.clone(),
            };
            commands::run_release(&options, &config).await
        }
    }
}

fn inbox_or_default(inbox: Option<&std::path::Path>, config: &RuntimeConfig) -> std::path::PathBuf {
    match inbox {
        Some(path) => config.resolve(path),
        None => crate::tap::Workspace::new(config.root()).upload_dir(),
    }
}
