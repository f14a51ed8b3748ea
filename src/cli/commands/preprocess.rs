//! `preprocess`: canonicalize the upload folder in place.

use crate::canonical::{EngineConfig, MacOsPlatform, PreprocessSummary, Preprocessor};
use crate::cli::RuntimeConfig;
use crate::error::Result;
use std::path::Path;

/// Runs the canonicalization engine over `inbox` with the macOS tools.
pub async fn preprocess_inbox(inbox: &Path, config: &RuntimeConfig) -> Result<PreprocessSummary> {
    let platform = MacOsPlatform::new();
    if !platform.probe() {
        config.warn("hdiutil not found: disk images cannot be mounted or created on this host")?;
    }

    let mut engine = EngineConfig::default();
    if let Some(scratch) = config.scratch_dir() {
        engine = engine.with_scratch_root(scratch);
    }

    config.section(&format!("Preprocessing {}", inbox.display()))?;
    let summary = Preprocessor::new(platform, engine)
        .preprocess_all(inbox)
        .await;

    for (original, output) in &summary.canonicalized {
        config.success(&format!(
            "{} -> {}",
            file_name(original),
            file_name(output)
        ))?;
    }
    for (original, reason) in &summary.failed {
        config.warn(&format!("{} left unchanged: {}", file_name(original), reason))?;
    }
    config.verbose_println(&format!(
        "{} canonicalized, {} skipped, {} failed",
        summary.canonicalized.len(),
        summary.skipped.len(),
        summary.failed.len()
    ))?;

    Ok(summary)
}

/// `preprocess` subcommand. Failed files stay in the inbox for `check` to
/// report, so the command itself always succeeds.
pub async fn run_preprocess(inbox: &Path, config: &RuntimeConfig) -> Result<i32> {
    preprocess_inbox(inbox, config).await?;
    Ok(0)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
