use super::seven_zip::SevenZipEngine;
use super::types::ExtractionResult;
use super::zip_engine::ZipEngine;
use crate::services::config::models::{ArchiveEngineKind, PipelineConfig};
use crate::types::errors::{PipelineError, PipelineResult};
use crate::types::progress::ProgressSink;
use futures_util::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;

/// Unpacks package archives and writes them back.
pub trait ArchiveEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extract `archive` into the existing directory `dest`, overwriting
    /// whatever is already there.
    fn extract<'a>(
        &'a self,
        archive: &'a Path,
        dest: &'a Path,
        progress: &'a ProgressSink,
    ) -> BoxFuture<'a, PipelineResult<ExtractionResult>>;

    /// Write the contents of `source_dir` to a ZIP container at `output`.
    fn archive<'a>(
        &'a self,
        source_dir: &'a Path,
        output: &'a Path,
        progress: &'a ProgressSink,
    ) -> BoxFuture<'a, PipelineResult<()>>;
}

/// Engine selected by the settings.
pub fn engine_for(config: &PipelineConfig) -> Arc<dyn ArchiveEngine> {
    match config.archive_engine {
        ArchiveEngineKind::Builtin => Arc::new(ZipEngine::new(config.free_space_margin_bytes)),
        ArchiveEngineKind::SevenZip => Arc::new(SevenZipEngine::new(
            config.seven_zip_path.clone(),
            config.free_space_margin_bytes,
        )),
    }
}

/// Base name used to attribute extraction failures.
pub fn archive_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn extraction_error(archive: &Path, message: impl Into<String>) -> PipelineError {
    PipelineError::Extraction {
        archive: archive_name(archive),
        message: message.into(),
    }
}

pub(crate) fn archive_write_error(output: &Path, message: impl Into<String>) -> PipelineError {
    PipelineError::ArchiveWrite {
        path: output.to_path_buf(),
        message: message.into(),
    }
}

/// Shared preconditions for every engine's `extract`.
pub(crate) fn check_extract_paths(archive: &Path, dest: &Path) -> PipelineResult<()> {
    if !archive.is_file() {
        return Err(extraction_error(archive, "archive not found"));
    }
    if !dest.is_dir() {
        return Err(extraction_error(
            archive,
            format!("destination {} does not exist", dest.display()),
        ));
    }
    Ok(())
}
