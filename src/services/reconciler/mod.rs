//! Makes a working directory safe to extract into.
//!
//! Strategies run in order until one succeeds: direct removal with backoff,
//! the OS shell's recursive delete (Windows only), and finally renaming the
//! directory aside and deleting it in the background. Leftovers from that
//! last step are picked up by [`sweep_stale_markers`].

use crate::services::config::models::PipelineConfig;
use crate::services::fs_utils::file_utils::{clear_readonly_recursive, is_empty_dir};
use crate::types::errors::PipelineError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Infix of directories renamed aside for background deletion.
pub const DELETION_MARKER: &str = ".beepee-deleting-";

/// Result of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Success,
    /// Worth trying again, or falling through to the next strategy.
    Retryable(String),
    /// This strategy cannot work for this path.
    Fatal(String),
}

/// How the directory was made empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// Nothing to remove.
    AlreadyEmpty,
    Removed { attempts: u32 },
    RemovedByShell { attempts: u32 },
    /// Old contents moved to this sibling; deletion continues in the background.
    RenamedAside { attempts: u32, moved_to: PathBuf },
}

/// Recursive delete primitive. Swappable so lock conditions can be simulated.
pub trait DirRemover: Send + Sync {
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct FsRemover;

impl DirRemover for FsRemover {
    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }
}

pub struct DirectoryReconciler {
    attempts: u32,
    base_delay: Duration,
    remover: Arc<dyn DirRemover>,
}

impl DirectoryReconciler {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
            remover: Arc::new(FsRemover),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.removal_attempts,
            Duration::from_millis(config.removal_base_delay_ms),
        )
    }

    pub fn with_remover(mut self, remover: Arc<dyn DirRemover>) -> Self {
        self.remover = remover;
        self
    }

    /// Leave `path` present and empty.
    ///
    /// An `Err` is a partial failure: the directory may still hold old files
    /// and callers are expected to extract over them.
    pub async fn ensure_empty(&self, path: &Path) -> Result<Reconciled, PipelineError> {
        if !path.exists() {
            create_dir(path)?;
            return Ok(Reconciled::AlreadyEmpty);
        }
        if !path.is_dir() {
            return Err(reconciliation_error(path, "path exists but is not a directory"));
        }
        if is_empty_dir(path) {
            return Ok(Reconciled::AlreadyEmpty);
        }

        let (outcome, attempts) = self.remove_with_backoff(path).await;
        let reconciled = match outcome {
            StrategyOutcome::Success => Reconciled::Removed { attempts },
            StrategyOutcome::Retryable(reason) | StrategyOutcome::Fatal(reason) => {
                log::warn!(
                    "Direct removal of {} failed after {attempts} attempt(s): {reason}",
                    path.display()
                );
                match native_remove(path).await {
                    StrategyOutcome::Success => Reconciled::RemovedByShell { attempts },
                    StrategyOutcome::Retryable(reason) | StrategyOutcome::Fatal(reason) => {
                        log::debug!("Shell removal of {} skipped: {reason}", path.display());
                        let moved_to = self.rename_aside(path)?;
                        Reconciled::RenamedAside { attempts, moved_to }
                    }
                }
            }
        };

        create_dir(path)?;
        log::info!("Cleared {} ({:?})", path.display(), reconciled);
        Ok(reconciled)
    }

    async fn remove_with_backoff(&self, path: &Path) -> (StrategyOutcome, u32) {
        let mut outcome = StrategyOutcome::Retryable("not attempted".to_string());
        for attempt in 0..self.attempts {
            if attempt > 0 {
                let factor = 2u32.saturating_pow(attempt - 1);
                tokio::time::sleep(self.base_delay.saturating_mul(factor)).await;

                let target = path.to_path_buf();
                let cleared = tokio::task::spawn_blocking(move || clear_readonly_recursive(&target))
                    .await
                    .unwrap_or(0);
                if cleared > 0 {
                    log::debug!("Cleared read-only flag on {cleared} entries under {}", path.display());
                }
            }

            outcome = self.remove_once(path).await;
            match &outcome {
                StrategyOutcome::Success => return (outcome, attempt + 1),
                StrategyOutcome::Fatal(_) => return (outcome, attempt + 1),
                StrategyOutcome::Retryable(reason) => {
                    log::debug!(
                        "Removal attempt {} for {} failed: {reason}",
                        attempt + 1,
                        path.display()
                    );
                }
            }
        }
        (outcome, self.attempts)
    }

    async fn remove_once(&self, path: &Path) -> StrategyOutcome {
        let remover = Arc::clone(&self.remover);
        let target = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || remover.remove_dir_all(&target)).await;
        match result {
            Ok(Ok(())) => StrategyOutcome::Success,
            Ok(Err(e)) => classify(&e),
            Err(e) => StrategyOutcome::Retryable(format!("removal task failed: {e}")),
        }
    }

    fn rename_aside(&self, path: &Path) -> Result<PathBuf, PipelineError> {
        let moved_to = marker_path(path)
            .ok_or_else(|| reconciliation_error(path, "directory has no name to rename"))?;
        fs::rename(path, &moved_to)
            .map_err(|e| reconciliation_error(path, format!("rename fallback failed: {e}")))?;

        log::warn!(
            "{} is locked; moved to {} for background deletion",
            path.display(),
            moved_to.display()
        );
        spawn_background_delete(Arc::clone(&self.remover), moved_to.clone());
        Ok(moved_to)
    }
}

impl Default for DirectoryReconciler {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Delete leftovers of earlier rename-aside removals under `parent`.
///
/// Returns how many were removed. Failures are logged and left for the next sweep.
pub fn sweep_stale_markers(parent: &Path) -> usize {
    let Ok(entries) = fs::read_dir(parent) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_marked = entry
            .file_name()
            .to_string_lossy()
            .contains(DELETION_MARKER);
        if !is_marked || !path.is_dir() {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                log::info!("Removed stale directory {}", path.display());
                removed += 1;
            }
            Err(e) => log::warn!("Stale directory {} still locked: {e}", path.display()),
        }
    }
    removed
}

fn spawn_background_delete(remover: Arc<dyn DirRemover>, path: PathBuf) {
    // Detached: the caller never waits on this.
    tokio::spawn(async move {
        let target = path.clone();
        match tokio::task::spawn_blocking(move || remover.remove_dir_all(&target)).await {
            Ok(Ok(())) => log::info!("Background delete of {} finished", path.display()),
            Ok(Err(e)) => log::warn!(
                "Background delete of {} failed, leaving it for the next sweep: {e}",
                path.display()
            ),
            Err(e) => log::warn!("Background delete task for {} panicked: {e}", path.display()),
        }
    });
}

fn marker_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy().to_string();
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%3f");
    let suffix: u16 = rand::random();
    Some(path.with_file_name(format!("{name}{DELETION_MARKER}{stamp}-{suffix:04x}")))
}

fn classify(error: &io::Error) -> StrategyOutcome {
    match error.kind() {
        io::ErrorKind::NotFound => StrategyOutcome::Success,
        io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported => {
            StrategyOutcome::Fatal(error.to_string())
        }
        _ => StrategyOutcome::Retryable(error.to_string()),
    }
}

#[cfg(windows)]
async fn native_remove(path: &Path) -> StrategyOutcome {
    let output = tokio::process::Command::new("cmd")
        .args(["/C", "rd", "/s", "/q"])
        .arg(path)
        .output()
        .await;
    match output {
        Ok(out) if out.status.success() && !path.exists() => StrategyOutcome::Success,
        Ok(out) => StrategyOutcome::Retryable(String::from_utf8_lossy(&out.stderr).trim().to_string()),
        Err(e) => StrategyOutcome::Fatal(format!("Failed to run rd: {e}")),
    }
}

#[cfg(not(windows))]
async fn native_remove(_path: &Path) -> StrategyOutcome {
    StrategyOutcome::Fatal("no shell fallback on this platform".to_string())
}

fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path)
        .map_err(|e| reconciliation_error(path, format!("Failed to create directory: {e}")))
}

fn reconciliation_error(path: &Path, message: impl Into<String>) -> PipelineError {
    PipelineError::Reconciliation {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
