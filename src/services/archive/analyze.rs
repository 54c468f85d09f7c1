use super::types::{ArchiveAnalysis, ArchiveFormat};
use crate::services::package::roles::{MANIFEST_JSON, MANIFEST_VDF};
use std::fs;
use std::path::Path;

/// Analyze a package archive without extracting.
pub fn analyze_archive(archive_path: &Path) -> Result<ArchiveAnalysis, String> {
    let format = ArchiveFormat::from_path(archive_path)
        .ok_or_else(|| format!("Unsupported archive format: {}", archive_path.display()))?;

    let file = fs::File::open(archive_path).map_err(|e| format!("Failed to open archive: {e}"))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| format!("Failed to read ZIP: {e}"))?;

    let mut file_count = 0usize;
    let mut has_manifest = false;
    let mut uncompressed_size: u64 = 0;

    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| format!("Failed to read entry: {e}"))?;
        let name = entry.name().replace('\\', "/");
        // Declared sizes are untrusted.
        uncompressed_size = uncompressed_size.saturating_add(entry.size());
        if !entry.is_dir() {
            file_count += 1;
        }

        if name.eq_ignore_ascii_case(MANIFEST_VDF) || name.eq_ignore_ascii_case(MANIFEST_JSON) {
            has_manifest = true;
        }
    }

    Ok(ArchiveAnalysis {
        format,
        file_count,
        uncompressed_size,
        has_manifest,
    })
}

/// Free bytes on the volume holding `path`, if it can be determined.
pub fn available_space(path: &Path) -> Option<u64> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let search_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    let mut available = None;
    let mut matched_len = 0;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if search_path.starts_with(mount) {
            let mount_len = mount.as_os_str().len();
            if mount_len >= matched_len {
                matched_len = mount_len;
                available = Some(disk.available_space());
            }
        }
    }
    available
}

/// Refuse when the destination volume cannot hold `needed + margin` bytes.
///
/// An undeterminable volume is not an error.
pub fn ensure_free_space(dest: &Path, needed: u64, margin: u64) -> Result<(), String> {
    let required = needed.saturating_add(margin);
    match available_space(dest) {
        Some(available) if available < required => Err(format!(
            "Insufficient disk space. Requires {required} bytes, but only {available} bytes available."
        )),
        Some(_) => Ok(()),
        None => {
            log::warn!("Could not determine free space for {}", dest.display());
            Ok(())
        }
    }
}
