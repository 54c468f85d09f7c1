//! In-process engine built on the `zip` crate.

use super::analyze::{analyze_archive, ensure_free_space};
use super::engine::{
    archive_name, archive_write_error, check_extract_paths, extraction_error, ArchiveEngine,
};
use super::types::ExtractionResult;
use crate::services::fs_utils::file_utils::clear_readonly_recursive;
use crate::services::fs_utils::path_utils::relative_display;
use crate::types::errors::PipelineResult;
use crate::types::progress::{scaled_percent, ProgressSink};
use futures_util::future::{BoxFuture, FutureExt};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

pub struct ZipEngine {
    free_space_margin: u64,
}

impl ZipEngine {
    pub fn new(free_space_margin: u64) -> Self {
        Self { free_space_margin }
    }
}

impl ArchiveEngine for ZipEngine {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn extract<'a>(
        &'a self,
        archive: &'a Path,
        dest: &'a Path,
        progress: &'a ProgressSink,
    ) -> BoxFuture<'a, PipelineResult<ExtractionResult>> {
        async move {
            check_extract_paths(archive, dest)?;

            let archive_path = archive.to_path_buf();
            let dest_path = dest.to_path_buf();
            let sink = progress.clone();
            let margin = self.free_space_margin;
            let files_extracted = tokio::task::spawn_blocking(move || {
                extract_zip_inner(&archive_path, &dest_path, margin, &sink)
            })
            .await
            .map_err(|e| extraction_error(archive, format!("extraction task failed: {e}")))?
            .map_err(|message| extraction_error(archive, message))?;

            log::info!(
                "Extracted {files_extracted} files from {} into {}",
                archive.display(),
                dest.display()
            );
            Ok(ExtractionResult {
                archive_name: archive_name(archive),
                dest_path: dest.to_string_lossy().to_string(),
                files_extracted,
            })
        }
        .boxed()
    }

    fn archive<'a>(
        &'a self,
        source_dir: &'a Path,
        output: &'a Path,
        progress: &'a ProgressSink,
    ) -> BoxFuture<'a, PipelineResult<()>> {
        async move {
            let source = source_dir.to_path_buf();
            let target = output.to_path_buf();
            let sink = progress.clone();
            let written = tokio::task::spawn_blocking(move || write_zip(&source, &target, &sink))
                .await
                .map_err(|e| archive_write_error(output, format!("archive task failed: {e}")))?
                .map_err(|message| archive_write_error(output, message))?;

            log::info!("Wrote {written} files to {}", output.display());
            Ok(())
        }
        .boxed()
    }
}

fn extract_zip_inner(
    archive_path: &Path,
    dest_path: &Path,
    margin: u64,
    progress: &ProgressSink,
) -> Result<usize, String> {
    let analysis = analyze_archive(archive_path)?;
    ensure_free_space(dest_path, analysis.uncompressed_size, margin)?;

    let file = fs::File::open(archive_path).map_err(|e| format!("Failed to open archive: {e}"))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| format!("Invalid or corrupt ZIP: {e}"))?;

    let total = archive.len();
    let mut count: usize = 0;
    for i in 0..total {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("Failed to read entry {i}: {e}"))?;

        let Some(entry_path) = entry.enclosed_name() else {
            log::warn!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let output_path = dest_path.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&output_path).map_err(|e| format!("Failed to create dir: {e}"))?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("Failed to create parent: {e}"))?;
        }
        if output_path.exists() {
            clear_readonly_recursive(&output_path);
        }
        let mut outfile = fs::File::create(&output_path)
            .map_err(|e| format!("Failed to create {}: {e}", output_path.display()))?;
        io::copy(&mut entry, &mut outfile).map_err(|e| format!("Failed to write file: {e}"))?;
        count += 1;

        progress.file(
            scaled_percent(i + 1, total, 0, 100),
            entry_path.to_string_lossy().replace('\\', "/"),
        );
    }
    Ok(count)
}

/// Zip `source` into a temp file beside `output`, then move it into place.
fn write_zip(source: &Path, output: &Path, progress: &ProgressSink) -> Result<usize, String> {
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent).map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;

    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).display().to_string();
            format!("Failed to read {path}: {e}")
        })?;
        entries.push(entry.into_path());
    }

    let tmp = tempfile::NamedTempFile::new_in(&parent)
        .map_err(|e| format!("Failed to create temp archive: {e}"))?;
    let mut writer = zip::ZipWriter::new(tmp.reopen().map_err(|e| e.to_string())?);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let total = entries.len();
    let mut written = 0usize;
    for (idx, path) in entries.iter().enumerate() {
        let name = relative_display(path, source);
        if path.is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(|e| format!("Failed to add {name}: {e}"))?;
            continue;
        }
        writer
            .start_file(name.clone(), options)
            .map_err(|e| format!("Failed to add {name}: {e}"))?;
        let mut input =
            fs::File::open(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        io::copy(&mut input, &mut writer).map_err(|e| format!("Failed to write {name}: {e}"))?;
        written += 1;
        progress.file(scaled_percent(idx + 1, total, 0, 100), name);
    }
    writer
        .finish()
        .map_err(|e| format!("Failed to finalize archive: {e}"))?;

    tmp.persist(output)
        .map_err(|e| format!("Failed to move archive into place: {e}"))?;
    Ok(written)
}
