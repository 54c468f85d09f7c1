use crate::services::vdf::DEFAULT_PROVENANCE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which engine unpacks and writes package archives.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ArchiveEngineKind {
    /// In-process `zip` implementation.
    #[default]
    Builtin,
    /// External `7z` executable.
    SevenZip,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Parent of every package working directory.
    pub packages_dir: PathBuf,
    pub removal_attempts: u32,
    /// First backoff delay; doubles after each failed attempt.
    pub removal_base_delay_ms: u64,
    pub archive_engine: ArchiveEngineKind,
    pub seven_zip_path: PathBuf,
    /// Headroom required on top of an archive's uncompressed size.
    pub free_space_margin_bytes: u64,
    pub provenance_comment: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            packages_dir: std::env::temp_dir().join("beepee").join("packages"),
            removal_attempts: 5,
            removal_base_delay_ms: 200,
            archive_engine: ArchiveEngineKind::Builtin,
            seven_zip_path: PathBuf::from("7z"),
            free_space_margin_bytes: 50 * 1024 * 1024,
            provenance_comment: DEFAULT_PROVENANCE.to_string(),
        }
    }
}
