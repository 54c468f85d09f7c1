use std::fs;
use std::io::Write;
use std::path::Path;

/// Clear the read-only flag on `root` and everything below it.
///
/// Returns how many entries were changed. Entries that cannot be read or
/// updated are skipped.
pub fn clear_readonly_recursive(root: &Path) -> usize {
    let mut cleared = 0;
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let mut perms = meta.permissions();
        if !perms.readonly() {
            continue;
        }
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        match fs::set_permissions(entry.path(), perms) {
            Ok(()) => cleared += 1,
            Err(e) => log::debug!("Could not clear read-only on {}: {e}", entry.path().display()),
        }
    }
    cleared
}

/// Write `contents` next to `path` first, then move it into place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), String> {
    let parent = path
        .parent()
        .ok_or_else(|| format!("No parent directory for {}", path.display()))?;
    fs::create_dir_all(parent).map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| format!("Failed to create temp file in {}: {e}", parent.display()))?;
    tmp.write_all(contents)
        .map_err(|e| format!("Failed to write temp file: {e}"))?;
    tmp.persist(path)
        .map_err(|e| format!("Failed to replace {}: {e}", path.display()))?;
    Ok(())
}

/// Copy the contents of `from` into the existing directory `to`.
pub fn copy_dir_contents(from: &Path, to: &Path) -> Result<u64, String> {
    let mut options = fs_extra::dir::CopyOptions::new();
    options.content_only = true;
    options.overwrite = true;
    fs_extra::dir::copy(from, to, &options)
        .map_err(|e| format!("Failed to copy {} to {}: {e}", from.display(), to.display()))
}

/// True when `path` is a directory with no entries.
pub fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut d| d.next().is_none())
        .unwrap_or(false)
}
