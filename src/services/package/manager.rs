//! Orchestrates package import, conversion, export and close.
//!
//! The manager itself holds no package; every operation works on a
//! [`PackageSession`] passed in by the caller.

use super::convert::{convert_to_tree, convert_to_vdf, ProgressBand};
use super::model::{write_manifest, Package, PackageInfo, PackageInfoUpdate};
use super::roles::{MANIFEST_JSON, MANIFEST_VDF};
use super::session::{PackageSession, PackageState};
use crate::services::archive::{analyze_archive, archive_name, engine_for, ArchiveEngine};
use crate::services::config::models::PipelineConfig;
use crate::services::core::operation_lock::OperationLock;
use crate::services::fs_utils::file_utils::copy_dir_contents;
use crate::services::reconciler::{sweep_stale_markers, DirectoryReconciler};
use crate::services::vdf::{ArrayShape, TreeValue};
use crate::types::errors::{ErrorKind, PipelineError, PipelineResult};
use crate::types::progress::ProgressSink;
use futures_util::future::{BoxFuture, FutureExt};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CONVERT_BAND: ProgressBand = ProgressBand { from: 40, to: 85 };
const ENCODE_BAND: ProgressBand = ProgressBand { from: 20, to: 60 };

/// Whoever keeps files open under a working directory (previews, model
/// viewers) and must let go before it is removed or overwritten.
pub trait HandleReleaser: Send + Sync {
    fn release_all(&self) -> BoxFuture<'_, Result<(), String>>;
}

/// Releaser for hosts with no file-backed viewers.
#[derive(Debug, Default)]
pub struct NoopReleaser;

impl HandleReleaser for NoopReleaser {
    fn release_all(&self) -> BoxFuture<'_, Result<(), String>> {
        async { Ok(()) }.boxed()
    }
}

pub struct PackageManager {
    config: PipelineConfig,
    engine: Arc<dyn ArchiveEngine>,
    reconciler: DirectoryReconciler,
    releaser: Arc<dyn HandleReleaser>,
    lock: OperationLock,
}

impl PackageManager {
    /// Build a manager and clear leftovers of earlier sessions.
    pub fn new(config: PipelineConfig) -> Self {
        let swept = sweep_stale_markers(&config.packages_dir);
        if swept > 0 {
            log::info!("Removed {swept} stale package directories");
        }
        Self {
            engine: engine_for(&config),
            reconciler: DirectoryReconciler::from_config(&config),
            releaser: Arc::new(NoopReleaser),
            lock: OperationLock::new(),
            config,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn ArchiveEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_releaser(mut self, releaser: Arc<dyn HandleReleaser>) -> Self {
        self.releaser = releaser;
        self
    }

    pub fn with_reconciler(mut self, reconciler: DirectoryReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Working directory an archive extracts into.
    pub fn working_dir_for(&self, archive: &Path) -> PathBuf {
        let stem = archive
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = sanitize_filename::sanitize(stem.trim());
        let name = if name.is_empty() { "package".to_string() } else { name };
        self.config.packages_dir.join(name)
    }

    /// Open a package archive, or an already-extracted directory through
    /// its `info.json` / `info.txt`, and make it the session's package.
    pub async fn load_package<'s>(
        &self,
        session: &'s mut PackageSession,
        location: &Path,
        progress: &ProgressSink,
    ) -> PipelineResult<&'s Package> {
        let _guard = self.lock.acquire().await?;
        self.load_locked(session, location, progress).await
    }

    /// Body of [`PackageManager::load_package`]; the caller holds the lock.
    async fn load_locked<'s>(
        &self,
        session: &'s mut PackageSession,
        location: &Path,
        progress: &ProgressSink,
    ) -> PipelineResult<&'s Package> {
        if let Some(previous) = session.clear() {
            log::info!("Replacing package {}", previous.display_name);
        }

        let result = self.run_load(session, location, progress).await;
        match result {
            Ok(package) => {
                log::info!(
                    "Loaded package {} with {} items",
                    package.display_name,
                    package.items.len()
                );
                progress.progress(100, "Package loaded");
                Ok(session.install(package))
            }
            Err(e) => {
                log::error!("Failed to load package {}: {e}", location.display());
                progress.failed(e.kind(), "Failed to load package", e.to_string());
                session.transition(PackageState::Failed);
                Err(e)
            }
        }
    }

    async fn run_load(
        &self,
        session: &mut PackageSession,
        location: &Path,
        progress: &ProgressSink,
    ) -> PipelineResult<Package> {
        let working_dir = match manifest_dir(location) {
            Some(dir) => dir,
            None => {
                let dir = self.working_dir_for(location);
                self.prepare(session, location, &dir, progress).await?;
                self.extract(session, location, &dir, progress).await?;
                dir
            }
        };

        if working_dir.join(MANIFEST_VDF).is_file() || !working_dir.join(MANIFEST_JSON).is_file() {
            session.transition(PackageState::Converting);
            progress.progress(CONVERT_BAND.from, "Converting documents");
            let dir = working_dir.clone();
            let sink = progress.clone();
            let converted = tokio::task::spawn_blocking(move || convert_to_tree(&dir, &sink, CONVERT_BAND))
                .await
                .map_err(|e| PipelineError::io(&working_dir, std::io::Error::other(e)))
                .and_then(|r| r);
            if let Err(e) = converted {
                self.discard_working_dir(&working_dir, location).await;
                return Err(e);
            }
        }

        session.transition(PackageState::Loading);
        progress.progress(90, "Loading items");
        Package::load(location, &working_dir)
    }

    async fn prepare(
        &self,
        session: &mut PackageSession,
        archive: &Path,
        dir: &Path,
        progress: &ProgressSink,
    ) -> PipelineResult<()> {
        session.transition(PackageState::Preparing);
        progress.progress(5, "Preparing package directory");

        // Checked before the working directory is touched.
        let source = archive.to_path_buf();
        let analysis = tokio::task::spawn_blocking(move || analyze_archive(&source))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r)
            .map_err(|message| PipelineError::Extraction {
                archive: archive_name(archive),
                message,
            })?;
        if !analysis.has_manifest {
            return Err(PipelineError::ManifestMissing {
                path: archive.join(MANIFEST_VDF),
            });
        }
        log::info!(
            "Archive {} holds {} files ({} bytes)",
            archive.display(),
            analysis.file_count,
            analysis.uncompressed_size
        );

        if let Err(e) = self.releaser.release_all().await {
            log::warn!("Failed to release file handles under {}: {e}", dir.display());
        }
        // A partial failure is tolerated: extraction overwrites in place.
        if let Err(e) = self.reconciler.ensure_empty(dir).await {
            log::warn!("{e}; extracting over existing files");
        }
        Ok(())
    }

    async fn extract(
        &self,
        session: &mut PackageSession,
        archive: &Path,
        dir: &Path,
        progress: &ProgressSink,
    ) -> PipelineResult<()> {
        session.transition(PackageState::Extracting);
        progress.progress(10, "Extracting package");

        if let Err(e) = fs::create_dir_all(dir) {
            return Err(PipelineError::io(dir, e));
        }
        match self.engine.extract(archive, dir, progress).await {
            Ok(result) => {
                log::info!(
                    "Extracted {} files from {}",
                    result.files_extracted,
                    result.archive_name
                );
                Ok(())
            }
            Err(e) => {
                self.discard_working_dir(dir, archive).await;
                Err(e)
            }
        }
    }

    /// Best-effort removal of a half-populated working directory.
    async fn discard_working_dir(&self, dir: &Path, location: &Path) {
        if manifest_dir(location).is_some() {
            // Never delete a directory the user pointed at directly.
            return;
        }
        let target = dir.to_path_buf();
        match tokio::task::spawn_blocking(move || fs::remove_dir_all(&target)).await {
            Ok(Ok(())) => log::info!("Cleaned up failed package directory {}", dir.display()),
            Ok(Err(e)) => log::warn!("Failed to cleanup package directory {}: {e}", dir.display()),
            Err(e) => log::warn!("Cleanup task for {} failed: {e}", dir.display()),
        }
    }

    /// Create an empty package under `packages_dir` and load it.
    pub async fn create_package<'s>(
        &self,
        session: &'s mut PackageSession,
        name: &str,
        description: &str,
        author: &str,
        progress: &ProgressSink,
    ) -> PipelineResult<&'s Package> {
        let _guard = self.lock.acquire().await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(PipelineError::ManifestInvalid(
                "Package name is required".to_string(),
            ));
        }

        let id = package_id(name);
        let dir = self.config.packages_dir.join(&id);
        if dir.exists() {
            return Err(PipelineError::ManifestInvalid(format!(
                "A package with ID {id} already exists. Please try again."
            )));
        }
        for sub in ["items", "resources"] {
            fs::create_dir_all(dir.join(sub)).map_err(|e| PipelineError::io(dir.join(sub), e))?;
        }

        let author = match author.trim() {
            "" => "Unknown",
            a => a,
        };
        let manifest = TreeValue::Object(vec![
            ("ID".to_string(), TreeValue::Scalar(id.clone())),
            ("Name".to_string(), TreeValue::Scalar(name.to_string())),
            ("Desc".to_string(), TreeValue::Scalar(description.to_string())),
            ("Author".to_string(), TreeValue::Scalar(author.to_string())),
            ("Item".to_string(), TreeValue::Array(Vec::new(), ArrayShape::Repeated)),
        ]);
        write_manifest(&dir, &manifest)?;
        log::info!("Created package {id} at {}", dir.display());

        self.load_locked(session, &dir.join(MANIFEST_JSON), progress)
            .await
    }

    /// Encode a copy of the working directory and archive it to `output`.
    pub async fn export_to(
        &self,
        session: &mut PackageSession,
        output: &Path,
        progress: &ProgressSink,
    ) -> PipelineResult<PathBuf> {
        let _guard = self.lock.acquire().await?;
        let package = session.current().ok_or(PipelineError::NoPackage)?;
        let working_dir = package.working_dir.clone();

        match self.run_export(&working_dir, output, progress).await {
            Ok(()) => {
                session.set_last_export_path(output.to_path_buf());
                progress.progress(100, "Package exported");
                log::info!("Exported package to {}", output.display());
                Ok(output.to_path_buf())
            }
            Err(e) => {
                log::error!("Failed to export package to {}: {e}", output.display());
                progress.failed(
                    e.kind_in(ErrorKind::Export),
                    "Failed to export package",
                    e.to_string(),
                );
                Err(e)
            }
        }
    }

    async fn run_export(
        &self,
        working_dir: &Path,
        output: &Path,
        progress: &ProgressSink,
    ) -> PipelineResult<()> {
        progress.progress(5, "Copying package");
        let staging = tempfile::TempDir::new()
            .map_err(|e| PipelineError::ArchiveWrite {
                path: output.to_path_buf(),
                message: format!("Failed to create staging directory: {e}"),
            })?;

        let source = working_dir.to_path_buf();
        let stage = staging.path().to_path_buf();
        let provenance = self.config.provenance_comment.clone();
        let sink = progress.clone();
        tokio::task::spawn_blocking(move || -> PipelineResult<()> {
            copy_dir_contents(&source, &stage).map_err(|message| PipelineError::ArchiveWrite {
                path: stage.clone(),
                message,
            })?;
            convert_to_vdf(&stage, &provenance, &sink, ENCODE_BAND)?;
            Ok(())
        })
        .await
        .map_err(|e| PipelineError::ArchiveWrite {
            path: output.to_path_buf(),
            message: format!("export task failed: {e}"),
        })??;

        progress.progress(ENCODE_BAND.to, "Writing archive");
        self.engine.archive(staging.path(), output, progress).await
    }

    /// Export again to the last path used by [`PackageManager::export_to`].
    pub async fn save(
        &self,
        session: &mut PackageSession,
        progress: &ProgressSink,
    ) -> PipelineResult<PathBuf> {
        let package = session.current().ok_or(PipelineError::NoPackage)?;
        let Some(path) = session.last_export_path().map(Path::to_path_buf) else {
            return Err(PipelineError::ArchiveWrite {
                path: package.location.clone(),
                message: "package has not been exported yet; choose a location first".to_string(),
            });
        };
        self.export_to(session, &path, progress).await
    }

    pub fn package_info(&self, session: &PackageSession) -> PipelineResult<PackageInfo> {
        session.current().ok_or(PipelineError::NoPackage)?.info()
    }

    pub async fn update_package_info(
        &self,
        session: &mut PackageSession,
        update: PackageInfoUpdate,
    ) -> PipelineResult<PackageInfo> {
        let _guard = self.lock.acquire().await?;
        session
            .current_mut()
            .ok_or(PipelineError::NoPackage)?
            .update_info(update)
    }

    /// Unload the current package, optionally deleting its working directory.
    pub async fn close(&self, session: &mut PackageSession, remove: bool) -> PipelineResult<()> {
        let _guard = self.lock.acquire().await?;
        if session.current().is_none() && session.state() == PackageState::Idle {
            return Err(PipelineError::NoPackage);
        }

        session.transition(PackageState::Closing);
        let closed = session.clear();
        if let (true, Some(package)) = (remove, &closed) {
            if let Err(e) = self.releaser.release_all().await {
                log::warn!("Failed to release file handles before removal: {e}");
            }
            match self.reconciler.ensure_empty(&package.working_dir).await {
                Ok(_) => {
                    if let Err(e) = fs::remove_dir(&package.working_dir) {
                        log::warn!("Failed to remove {}: {e}", package.working_dir.display());
                    }
                }
                Err(e) => log::warn!("{e}"),
            }
        }
        if let Some(package) = closed {
            log::info!("Closed package {}", package.display_name);
        }
        session.transition(PackageState::Idle);
        Ok(())
    }
}

/// Directory of an already-extracted package when `location` names its manifest.
fn manifest_dir(location: &Path) -> Option<PathBuf> {
    let name = location.file_name()?.to_string_lossy().to_lowercase();
    if name == MANIFEST_JSON || name == MANIFEST_VDF {
        location.parent().map(Path::to_path_buf)
    } else {
        None
    }
}

/// `<ALPHANUMERIC NAME>_<4 hex digits>`
pub fn package_id(name: &str) -> String {
    let base: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase();
    let suffix: u16 = rand::random();
    format!("{base}_{suffix:04X}")
}
