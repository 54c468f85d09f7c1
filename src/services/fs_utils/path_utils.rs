use std::path::{Component, Path, PathBuf};

/// Validates that a relative `target_path` stays inside whatever base it is joined to.
/// Rejects `..` escapes and absolute paths.
pub fn is_path_safe(target_path: &Path) -> bool {
    let mut depth = 0i32;
    for component in target_path.components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// Join a manifest-supplied relative path onto `base_path`, refusing traversal.
pub fn resolve_safe_path(base_path: &Path, user_path: &str) -> Result<PathBuf, String> {
    let normalized = user_path.replace('\\', "/");
    let target = Path::new(&normalized);
    if !is_path_safe(target) {
        return Err(format!("Path escapes the package directory: {user_path}"));
    }
    Ok(base_path.join(target))
}

/// Forward-slash path of `path` relative to `root`, for messages and archive entries.
pub fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
