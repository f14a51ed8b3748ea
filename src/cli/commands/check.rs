//! `check`: strict filename validation of the upload folder.

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::tap::{ReleaseFile, list_upload_folder};
use std::path::Path;

/// Reports every file that does not match `AppName-X.Y.Z.(dmg|pkg|zip)`.
///
/// Returns exit code 1 if any file is invalid.
pub async fn run_check(inbox: &Path, config: &RuntimeConfig) -> Result<i32> {
    let paths = list_upload_folder(inbox)?;
    if paths.is_empty() {
        config.progress(&format!("No files found in {}", inbox.display()))?;
        return Ok(0);
    }

    config.progress(&format!("Found {} files in {}...", paths.len(), inbox.display()))?;

    let mut invalid = 0;
    for path in &paths {
        match ReleaseFile::from_path(path) {
            Ok(file) => config.success(&format!("{} ({} {})", file.filename, file.name, file.version))?,
            Err(e) => {
                config.error(&e.to_string())?;
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        config.error(&format!("{invalid} of {} files have invalid names", paths.len()))?;
        return Ok(1);
    }
    Ok(0)
}
