//! Working-directory sweeps between VDF files and tree documents.
//!
//! Both directions are all-or-nothing from the caller's point of view: the
//! first file that fails aborts the sweep with that file's path attached.

use super::roles::FileRole;
use crate::services::fs_utils::file_utils::write_atomic;
use crate::services::fs_utils::path_utils::relative_display;
use crate::services::vdf::{decode_bytes, encode_json, DecodeContext};
use crate::types::errors::{CodecError, PipelineError, PipelineResult};
use crate::types::progress::{scaled_percent, ProgressSink};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub converted: usize,
    pub removed: usize,
}

/// Progress band a sweep reports into.
#[derive(Debug, Clone, Copy)]
pub struct ProgressBand {
    pub from: u8,
    pub to: u8,
}

/// Every file under `root`. An unreadable entry fails the whole walk, so a
/// sweep never reports success over files it could not see.
fn files_under(root: &Path) -> PipelineResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PipelineError::io(path, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Decode every convertible VDF file under `root` into a sibling tree
/// document and delete the original. Obsolete files are deleted outright.
pub fn convert_to_tree(
    root: &Path,
    progress: &ProgressSink,
    band: ProgressBand,
) -> PipelineResult<ConversionReport> {
    let files = files_under(root)?;
    let total = files.len();
    let mut report = ConversionReport::default();

    for (idx, path) in files.iter().enumerate() {
        let role = FileRole::of_vdf_file(path);
        match role {
            FileRole::Passthrough => continue,
            FileRole::Obsolete => {
                fs::remove_file(path).map_err(|e| PipelineError::io(path, e))?;
                log::debug!("Removed obsolete file {}", path.display());
                report.removed += 1;
                continue;
            }
            _ => {}
        }
        let Some(tree_name) = role.tree_name() else {
            continue;
        };

        let ctx = DecodeContext::for_path(path, Some(root));
        let bytes = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        let tree = decode_bytes(&bytes, &ctx).map_err(|e| PipelineError::codec(path, e))?;

        let json = serde_json::to_string_pretty(&tree.to_json())
            .map_err(|e| PipelineError::codec(path, CodecError::Structural(e.to_string())))?;
        let target = path.with_file_name(tree_name);
        write_atomic(&target, json.as_bytes()).map_err(|e| PipelineError::io(&target, std::io::Error::other(e)))?;
        fs::remove_file(path).map_err(|e| PipelineError::io(path, e))?;

        report.converted += 1;
        progress.progress(
            scaled_percent(idx + 1, total, band.from, band.to),
            format!("Converted {}", ctx.name),
        );
    }

    log::info!(
        "Converted {} documents under {} ({} obsolete files removed)",
        report.converted,
        root.display(),
        report.removed
    );
    Ok(report)
}

/// Encode every tree document under `root` back to VDF and delete the JSON.
pub fn convert_to_vdf(
    root: &Path,
    provenance: &str,
    progress: &ProgressSink,
    band: ProgressBand,
) -> PipelineResult<ConversionReport> {
    let files = files_under(root)?;
    let total = files.len();
    let mut report = ConversionReport::default();

    for (idx, path) in files.iter().enumerate() {
        let role = FileRole::of_tree_file(path);
        let Some(vdf_name) = role.vdf_name() else {
            continue;
        };
        let name = relative_display(path, root);

        let raw = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::codec(
                path,
                CodecError::Parse {
                    file: name.clone(),
                    line: e.line(),
                    message: e.to_string(),
                },
            )
        })?;
        let text = encode_json(&value, provenance).map_err(|e| PipelineError::codec(path, e))?;

        let target = path.with_file_name(vdf_name);
        write_atomic(&target, text.as_bytes()).map_err(|e| PipelineError::io(&target, std::io::Error::other(e)))?;
        fs::remove_file(path).map_err(|e| PipelineError::io(path, e))?;

        report.converted += 1;
        progress.progress(
            scaled_percent(idx + 1, total, band.from, band.to),
            format!("Encoded {name}"),
        );
    }

    log::info!("Encoded {} documents under {}", report.converted, root.display());
    Ok(report)
}
