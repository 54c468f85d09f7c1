//! Engine that shells out to a `7z` executable.
//!
//! Extraction only counts as done once 7-Zip prints its completion line;
//! a zero exit code alone is not enough.

use super::analyze::{analyze_archive, ensure_free_space};
use super::engine::{
    archive_name, archive_write_error, check_extract_paths, extraction_error, ArchiveEngine,
};
use super::types::ExtractionResult;
use crate::types::errors::PipelineResult;
use crate::types::progress::ProgressSink;
use futures_util::future::{BoxFuture, FutureExt};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Final line 7-Zip prints after a clean run.
pub const COMPLETION_LINE: &str = "Everything is Ok";

// " 42% 7 - items/door/editoritems.txt" or " 42%"
static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,3})%(?:\s+\d+)?(?:\s+[-+U]\s+(.+))?$").expect("valid 7z progress regex")
});

/// One parsed line of 7-Zip's console output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Progress { percent: u8, file: Option<String> },
    Completed,
    Other,
}

pub fn parse_output_line(line: &str) -> OutputLine {
    let line = line.trim_matches(|c: char| c == '\u{8}' || c.is_whitespace());
    if line == COMPLETION_LINE {
        return OutputLine::Completed;
    }
    match PROGRESS_RE.captures(line) {
        Some(caps) => OutputLine::Progress {
            percent: caps[1].parse::<u8>().unwrap_or(0).min(100),
            file: caps.get(2).map(|m| m.as_str().trim().to_string()),
        },
        None => OutputLine::Other,
    }
}

pub struct SevenZipEngine {
    program: PathBuf,
    free_space_margin: u64,
}

/// What a finished 7-Zip run reported.
struct RunReport {
    success: bool,
    completed: bool,
    files: usize,
    detail: String,
}

impl SevenZipEngine {
    pub fn new(program: PathBuf, free_space_margin: u64) -> Self {
        Self {
            program,
            free_space_margin,
        }
    }

    async fn run(&self, mut command: Command, progress: &ProgressSink) -> Result<RunReport, String> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| format!("Failed to start {}: {e}", self.program.display()))?;

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut text).await;
            }
            text
        });

        let mut completed = false;
        let mut files = 0usize;
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                let read = reader
                    .read_until(b'\n', &mut buf)
                    .await
                    .map_err(|e| format!("Failed to read 7-Zip output: {e}"))?;
                if read == 0 {
                    break;
                }
                // Progress updates are separated by carriage returns.
                for segment in String::from_utf8_lossy(&buf).split('\r') {
                    match parse_output_line(segment) {
                        OutputLine::Completed => completed = true,
                        OutputLine::Progress { percent, file } => match file {
                            Some(name) => {
                                files += 1;
                                progress.file(percent, name);
                            }
                            None => progress.progress(percent, "Working..."),
                        },
                        OutputLine::Other => {}
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| format!("Failed to wait for 7-Zip: {e}"))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        Ok(RunReport {
            success: status.success(),
            completed,
            files,
            detail: match stderr_text.trim() {
                "" => format!("7-Zip exited with {status}"),
                text => text.to_string(),
            },
        })
    }
}

impl ArchiveEngine for SevenZipEngine {
    fn name(&self) -> &'static str {
        "7z"
    }

    fn extract<'a>(
        &'a self,
        archive: &'a Path,
        dest: &'a Path,
        progress: &'a ProgressSink,
    ) -> BoxFuture<'a, PipelineResult<ExtractionResult>> {
        async move {
            check_extract_paths(archive, dest)?;

            match analyze_archive(archive) {
                Ok(analysis) => {
                    ensure_free_space(dest, analysis.uncompressed_size, self.free_space_margin)
                        .map_err(|message| extraction_error(archive, message))?;
                }
                Err(e) => log::warn!("Skipping size check for {}: {e}", archive.display()),
            }

            let mut command = Command::new(&self.program);
            command
                .arg("x")
                .arg("-y")
                .arg("-bsp1")
                .arg("-bb1")
                .arg(format!("-o{}", dest.display()))
                .arg(archive);

            let report = self
                .run(command, progress)
                .await
                .map_err(|message| extraction_error(archive, message))?;
            if !report.success {
                return Err(extraction_error(archive, report.detail));
            }
            if !report.completed {
                return Err(extraction_error(
                    archive,
                    "7-Zip finished without reporting completion",
                ));
            }

            Ok(ExtractionResult {
                archive_name: archive_name(archive),
                dest_path: dest.to_string_lossy().to_string(),
                files_extracted: report.files,
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
            let staging = output.with_extension("partial");
            if staging.exists() {
                std::fs::remove_file(&staging)
                    .map_err(|e| archive_write_error(output, format!("Failed to clear {}: {e}", staging.display())))?;
            }
            let staging_abs = std::path::absolute(&staging)
                .map_err(|e| archive_write_error(output, e.to_string()))?;

            let mut command = Command::new(&self.program);
            command
                .current_dir(source_dir)
                .arg("a")
                .arg("-tzip")
                .arg("-y")
                .arg("-bsp1")
                .arg(&staging_abs)
                .arg("*");

            let report = self
                .run(command, progress)
                .await
                .map_err(|message| archive_write_error(output, message))?;
            if !report.success || !report.completed {
                let _ = std::fs::remove_file(&staging);
                return Err(archive_write_error(output, report.detail));
            }

            std::fs::rename(&staging, output)
                .map_err(|e| archive_write_error(output, format!("Failed to move archive into place: {e}")))?;
            Ok(())
        }
        .boxed()
    }
}
