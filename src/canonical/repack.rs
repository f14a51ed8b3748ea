//! Produces the canonical artifact from a located one.
//!
//! Flat packages are copied byte for byte. Bundles are staged next to an
//! `Applications` symlink and packed into a compressed read-only disk image
//! whose volume label is the unsanitized product name.

use super::artifact::{Artifact, Identity};
use super::error::{Context, ErrorExt, Result};
use super::filename::CanonicalFilename;
use super::platform::Platform;
use super::utils::fs;
use std::path::{Path, PathBuf};

/// Turns a located artifact and its identity into `Name-Version.ext`.
pub struct Canonicalizer<'a, P: Platform> {
    platform: &'a P,
}

impl<'a, P: Platform> Canonicalizer<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        Self { platform }
    }

    /// Writes the canonical file into `output_dir` and returns its path.
    ///
    /// `output_dir` is also used as the parent of the bundle staging area, so
    /// it must be writable scratch space.
    pub async fn canonicalize(
        &self,
        artifact: &Artifact,
        identity: &Identity,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let filename = CanonicalFilename::build(
            artifact.path(),
            &identity.name,
            &identity.version,
            artifact.output_extension(),
        )?;

        fs::create_dir_all(output_dir).await?;
        let dest = output_dir.join(filename.to_string());
        if dest.exists() {
            tokio::fs::remove_file(&dest)
                .await
                .fs_context("removing stale output", &dest)?;
        }

        match artifact {
            Artifact::FlatPackage(package) => {
                log::debug!("Copying {} to {}", package.display(), dest.display());
                fs::copy_file(package, &dest).await?;
            }
            Artifact::Bundle(bundle) => {
                self.pack_bundle(bundle, &identity.name, output_dir, &dest)
                    .await?;
            }
        }

        log::info!("✓ Canonicalized {} as {}", artifact, filename);
        Ok(dest)
    }

    async fn pack_bundle(
        &self,
        bundle: &Path,
        volume_label: &str,
        scratch: &Path,
        dest: &Path,
    ) -> Result<()> {
        let staging = tempfile::Builder::new()
            .prefix("stage-")
            .tempdir_in(scratch)
            .fs_context("creating image staging directory", scratch)?;

        let bundle_name = bundle
            .file_name()
            .context("bundle path has no file name")?;
        let staged_app = staging.path().join(bundle_name);

        log::debug!("Staging {} at {}", bundle.display(), staged_app.display());
        fs::copy_dir(bundle, &staged_app)
            .await
            .with_context(|| format!("staging bundle {}", bundle.display()))?;

        // Drag-to-install target
        #[cfg(unix)]
        {
            let applications_link = staging.path().join("Applications");
            std::os::unix::fs::symlink("/Applications", &applications_link)
                .fs_context("creating Applications symlink", &applications_link)?;
        }

        self.platform
            .create_image(staging.path(), volume_label, dest)
            .await
    }
}
