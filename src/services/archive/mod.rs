//! Package archive extraction and re-archiving.

mod analyze;
mod engine;
mod seven_zip;
mod types;
mod zip_engine;

// Re-export public API
pub use analyze::{analyze_archive, available_space, ensure_free_space};
pub use engine::{archive_name, engine_for, ArchiveEngine};
pub use seven_zip::{parse_output_line, OutputLine, SevenZipEngine, COMPLETION_LINE};
pub use types::{ArchiveAnalysis, ArchiveFormat, ExtractionResult};
pub use zip_engine::ZipEngine;

#[cfg(test)]
#[path = "tests/archive_tests.rs"]
mod tests;
