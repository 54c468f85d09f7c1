use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported package container. All of them are ZIP files underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArchiveFormat {
    Zip,
    BeePack,
    Bpee,
}

impl ArchiveFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "zip" => Some(Self::Zip),
            "bee_pack" => Some(Self::BeePack),
            "bpee" => Some(Self::Bpee),
            _ => None,
        }
    }
}

/// Result of analyzing an archive before extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveAnalysis {
    pub format: ArchiveFormat,
    pub file_count: usize,
    pub uncompressed_size: u64,
    /// `info.txt` or `info.json` at the archive root.
    pub has_manifest: bool,
}

/// Result of an extraction operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub archive_name: String,
    pub dest_path: String,
    pub files_extracted: usize,
}
